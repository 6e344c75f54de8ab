use indexmap::IndexMap;
use indexmap::map::Entry;
use tracing::warn;
use uuid::Uuid;

use super::{
    AllowedValue, CodeSystemDefinition, Definition, RelatedCodeSystem, ValueSetDefinition,
    ValueType,
};
use crate::error::Result;
use crate::relationship::{CodeSystemRelationship, Concept, Relationship, ValueSetRelationship};
use crate::types::{CodeSystem, ValueSetInclude};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    Value(String, Option<String>),
    /// A duplicate that could not be merged.
    Conflict(Uuid),
}

/// Turns resolved relationships into sealed definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionCompiler;

impl DefinitionCompiler {
    pub fn new() -> Self {
        Self
    }

    pub fn compile(&self, relationship: &Relationship<'_>) -> Result<Definition> {
        match relationship {
            Relationship::ValueSet(r) => self.compile_valueset(r).map(Definition::ValueSet),
            Relationship::CodeSystem(r) => self.compile_codesystem(r).map(Definition::CodeSystem),
        }
    }

    pub fn compile_valueset(&self, relationship: &ValueSetRelationship<'_>) -> Result<ValueSetDefinition> {
        let resource = relationship.resource;

        let values = relationship
            .concepts
            .iter()
            .map(|c| concept_value(c, ValueType::Concept))
            .chain(relationship.includes.iter().map(|i| include_value(i)))
            .chain(
                relationship
                    .contains
                    .iter()
                    .map(|c| concept_value(c, ValueType::Contains)),
            );

        ValueSetDefinition {
            name: resource.name.clone(),
            resource_id: resource.resource_id().to_string(),
            resource_url: resource.url.clone(),
            description: resource.description.clone(),
            compose: resource.compose.clone(),
            related_codesystems: related(&relationship.codesystems),
            allowed_values: deduplicate("ValueSet", &resource.name, values),
            content_hash: String::new(),
        }
        .seal()
    }

    pub fn compile_codesystem(
        &self,
        relationship: &CodeSystemRelationship<'_>,
    ) -> Result<CodeSystemDefinition> {
        let resource = relationship.resource;

        let values = relationship
            .concepts
            .iter()
            .map(|c| concept_value(c, ValueType::Concept));

        let valueset = relationship
            .valueset
            .as_deref()
            .map(|vs| self.compile_valueset(vs))
            .transpose()?;

        CodeSystemDefinition {
            name: resource.name.clone(),
            resource_id: resource.resource_id().to_string(),
            resource_url: resource.url.clone(),
            filter: (!resource.filter.is_empty()).then(|| resource.filter.clone()),
            allowed_values: deduplicate("CodeSystem", &resource.name, values),
            properties: relationship.properties.clone(),
            related_codesystems: related(&relationship.related_codesystems),
            valueset,
            content_hash: String::new(),
        }
        .seal()
    }
}

fn concept_value(concept: &Concept, value_type: ValueType) -> AllowedValue {
    AllowedValue {
        system: concept.system.clone(),
        display: concept.display.clone(),
        description: concept.description.clone(),
        ..AllowedValue::new(concept.code.clone(), value_type)
    }
}

/// An opaque include of a reference-only system, keyed by the system URI.
fn include_value(include: &ValueSetInclude) -> AllowedValue {
    let system = include.system.clone().unwrap_or_default();
    AllowedValue {
        system: Some(system.clone()),
        display: Some(system.clone()),
        description: include.version.clone(),
        filter: (!include.filter.is_empty()).then(|| include.filter.clone()),
        ..AllowedValue::new(system, ValueType::Include)
    }
}

fn related(codesystems: &[&CodeSystem]) -> Vec<RelatedCodeSystem> {
    codesystems
        .iter()
        .map(|cs| RelatedCodeSystem {
            id: cs.resource_id().to_string(),
            url: cs.url.clone(),
        })
        .collect()
}

fn agree<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

fn is_include_only(value: &AllowedValue) -> bool {
    value.value_type.len() == 1 && value.has_type(ValueType::Include)
}

/// Collapse values sharing a `(code, system)` key.
///
/// Values whose defined fields agree are merged. Include-only values that differ
/// in their filters get the filters concatenated. Anything else is kept as a
/// separate entry, logged under the resource `kind`.
fn deduplicate(
    kind: &str,
    name: &str,
    values: impl IntoIterator<Item = AllowedValue>,
) -> Vec<AllowedValue> {
    let mut allowed: IndexMap<DedupKey, AllowedValue> = IndexMap::new();

    for value in values {
        let key = DedupKey::Value(value.code.clone(), value.system.clone());
        let mut entry = match allowed.entry(key) {
            Entry::Vacant(vacant) => {
                vacant.insert(value);
                continue;
            }
            Entry::Occupied(occupied) => occupied,
        };
        let existing = entry.get_mut();

        if agree(&existing.display, &value.display)
            && agree(&existing.description, &value.description)
            && agree(&existing.filter, &value.filter)
        {
            existing.value_type.extend(value.value_type);
            if existing.display.is_none() {
                existing.display = value.display;
            }
            if existing.description.is_none() {
                existing.description = value.description;
            }
            if existing.filter.is_none() {
                existing.filter = value.filter;
            }
            continue;
        }

        if is_include_only(existing) && is_include_only(&value) {
            if let Some(filters) = value.filter {
                existing.filter.get_or_insert_with(Vec::new).extend(filters);
                continue;
            }
        }

        warn!(
            "Duplicate {} definitions in '{}' for code '{}'",
            kind, name, value.code
        );
        allowed.insert(DedupKey::Conflict(Uuid::new_v4()), value);
    }

    allowed.into_values().collect()
}
