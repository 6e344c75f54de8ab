//! Terminology validation of record values against compiled definitions.
//!
//! Validators turn per-record problems into [`Issue`]s and only return errors
//! for problems with the validation setup itself: an invalid [`Binding`], a
//! definition that does not exist, or a definition that is internally
//! inconsistent.

pub mod code;
pub mod coding;
pub mod language;
pub mod strategy;

use serde_json::Value;
use std::sync::Arc;

use crate::definition::{AllowedValue, CodeSystemDefinition, ValueSetDefinition};
use crate::error::{FhirGuardError, Result};
use crate::relationship::BCP47_SYSTEM;
use crate::storage::MetadataStore;
use crate::types::Issue;

pub use code::CodeValidator;
pub use coding::CodingValidator;
pub use language::{Iso639Languages, Language, LanguageLookup};
pub use strategy::{FhirGuard, OperationOutcome, ValidatorStrategy};

/// Common contract of the value validators.
pub trait Validator {
    /// Validate `value` found at `path` against exactly one of `valueset` or
    /// `codesystem`. Returns `true` when no error-level issue was raised.
    fn validate(
        &mut self,
        path: &str,
        value: &Value,
        valueset: Option<&str>,
        codesystem: Option<&str>,
    ) -> Result<bool>;

    /// Issues raised so far, in the order they were raised.
    fn issues(&self) -> &[Issue];

    fn take_issues(&mut self) -> Vec<Issue>;

    /// No fatal or error issue has been raised.
    fn is_valid(&self) -> bool {
        !self
            .issues()
            .iter()
            .any(|issue| issue.severity.is_blocking())
    }
}

/// Which definition a path is bound to, and whether the path must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    pub valueset: Option<String>,
    pub codesystem: Option<String>,
    pub required: bool,
}

impl Binding {
    pub fn valueset(name: impl Into<String>) -> Self {
        Self {
            valueset: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn codesystem(name: impl Into<String>) -> Self {
        Self {
            codesystem: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn check(&self) -> Result<()> {
        check_binding(self.valueset.as_deref(), self.codesystem.as_deref())
    }
}

fn check_binding(valueset: Option<&str>, codesystem: Option<&str>) -> Result<()> {
    match (valueset, codesystem) {
        (Some(_), Some(_)) => Err(FhirGuardError::configuration(
            "Cannot specify both valueset and codesystem",
        )),
        (None, None) => Err(FhirGuardError::configuration(
            "One of valueset or codesystem must be specified",
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone)]
enum TargetDefinition {
    ValueSet(Arc<ValueSetDefinition>),
    CodeSystem(Arc<CodeSystemDefinition>),
}

/// The definition a value is checked against, with the key it was requested by.
#[derive(Debug, Clone)]
pub(crate) struct Target<'k> {
    pub key: &'k str,
    definition: TargetDefinition,
}

impl<'k> Target<'k> {
    pub fn resolve(
        store: &MetadataStore,
        valueset: Option<&'k str>,
        codesystem: Option<&'k str>,
    ) -> Result<Self> {
        check_binding(valueset, codesystem)?;

        if let Some(key) = valueset {
            let definition = store
                .get_valueset(key)?
                .ok_or_else(|| FhirGuardError::not_found("ValueSet", key))?;
            return Ok(Self {
                key,
                definition: TargetDefinition::ValueSet(definition),
            });
        }

        let key = codesystem.unwrap_or_default();
        let definition = store
            .get_codesystem(key)?
            .ok_or_else(|| FhirGuardError::not_found("CodeSystem", key))?;
        Ok(Self {
            key,
            definition: TargetDefinition::CodeSystem(definition),
        })
    }

    /// "valueset" or "codesystem", as used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self.definition {
            TargetDefinition::ValueSet(_) => "valueset",
            TargetDefinition::CodeSystem(_) => "codesystem",
        }
    }

    pub fn resource_url(&self) -> &str {
        match &self.definition {
            TargetDefinition::ValueSet(d) => &d.resource_url,
            TargetDefinition::CodeSystem(d) => &d.resource_url,
        }
    }

    pub fn allowed_values(&self) -> &[AllowedValue] {
        match &self.definition {
            TargetDefinition::ValueSet(d) => &d.allowed_values,
            TargetDefinition::CodeSystem(d) => &d.allowed_values,
        }
    }

    /// The allowed value with exactly this code. More than one is a defect in
    /// the compiled definition.
    pub fn find_code(&self, code: &str) -> Result<Option<&AllowedValue>> {
        let mut matches = self.allowed_values().iter().filter(|v| v.code == code);
        let first = matches.next();
        if matches.next().is_some() {
            return Err(FhirGuardError::consistency_defect(format!(
                "Multiple allowed values with code '{}' in {} '{}'",
                code,
                self.kind(),
                self.key
            )));
        }
        Ok(first)
    }

    /// Whether every allowed value is a BCP-47 language entry.
    pub fn is_language_only(&self) -> bool {
        let values = self.allowed_values();
        !values.is_empty()
            && values
                .iter()
                .all(|v| v.system.as_deref() == Some(BCP47_SYSTEM))
    }
}
