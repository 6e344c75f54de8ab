//! Compiled, content-addressed terminology definitions.
//!
//! Definitions are what the validators consume. They are produced by the
//! [`DefinitionCompiler`] from resolved relationships and written to disk by
//! [`DefinitionSet::write`] together with a [`Manifest`].

pub mod compiler;
pub mod factory;
pub mod writer;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::Result;
use crate::types::{CodeSystemFilter, CodeSystemProperty, IncludeFilter, ValueSetCompose};
use crate::utils::fingerprint;

pub use compiler::DefinitionCompiler;
pub use factory::DefinitionFactory;
pub use writer::{
    CODESYSTEMS_DIR, DefinitionSet, MANIFEST_FILE, Manifest, ManifestIndex, VALUESETS_DIR,
};

/// Where an allowed value came from.
///
/// Variants are declared alphabetically so the sorted `type` list is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Concept,
    Contains,
    Include,
}

/// One permitted code of a compiled definition. Unique by `(code, system)`
/// unless a conflicting duplicate had to be kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedValue {
    pub code: String,
    #[serde(rename = "type")]
    pub value_type: BTreeSet<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Vec<IncludeFilter>>,
}

impl AllowedValue {
    pub fn new(code: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            code: code.into(),
            value_type: BTreeSet::from([value_type]),
            system: None,
            display: None,
            description: None,
            filter: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn has_type(&self, value_type: ValueType) -> bool {
        self.value_type.contains(&value_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedCodeSystem {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSetDefinition {
    pub name: String,
    pub resource_id: String,
    pub resource_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose: Option<ValueSetCompose>,
    #[serde(default)]
    pub related_codesystems: Vec<RelatedCodeSystem>,
    #[serde(default)]
    pub allowed_values: Vec<AllowedValue>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSystemDefinition {
    pub name: String,
    pub resource_id: String,
    pub resource_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Vec<CodeSystemFilter>>,
    #[serde(default)]
    pub allowed_values: Vec<AllowedValue>,
    #[serde(default)]
    pub properties: Vec<CodeSystemProperty>,
    #[serde(default)]
    pub related_codesystems: Vec<RelatedCodeSystem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valueset: Option<ValueSetDefinition>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_hash: String,
}

/// A compiled ValueSet or CodeSystem.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    ValueSet(ValueSetDefinition),
    CodeSystem(CodeSystemDefinition),
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Definition::ValueSet(d) => &d.name,
            Definition::CodeSystem(d) => &d.name,
        }
    }

    pub fn content_hash(&self) -> &str {
        match self {
            Definition::ValueSet(d) => &d.content_hash,
            Definition::CodeSystem(d) => &d.content_hash,
        }
    }
}

impl ValueSetDefinition {
    /// Recompute `content_hash` over the serialization without it.
    pub fn seal(mut self) -> Result<Self> {
        self.content_hash.clear();
        self.content_hash = fingerprint(&self)?;
        Ok(self)
    }
}

impl CodeSystemDefinition {
    /// Recompute `content_hash` over the serialization without it.
    pub fn seal(mut self) -> Result<Self> {
        self.content_hash.clear();
        self.content_hash = fingerprint(&self)?;
        Ok(self)
    }
}
