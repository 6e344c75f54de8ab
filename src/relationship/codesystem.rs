use std::collections::HashSet;
use tracing::{info, warn};

use super::{Concept, RelationshipResolver, ValueSetRelationship};
use crate::error::{FhirGuardError, Result};
use crate::types::{CodeSystem, CodeSystemProperty, ConceptDefinition};

#[derive(Debug, Clone)]
pub struct CodeSystemRelationship<'a> {
    pub resource: &'a CodeSystem,
    /// The system the concepts belong to. For a supplement this is the base system.
    pub system: &'a str,
    pub concepts: Vec<Concept>,
    pub properties: Vec<CodeSystemProperty>,
    /// CodeSystems this one supplements, nearest first.
    pub related_codesystems: Vec<&'a CodeSystem>,
    pub valueset: Option<Box<ValueSetRelationship<'a>>>,
}

impl<'a> CodeSystemRelationship<'a> {
    fn new(resource: &'a CodeSystem) -> Self {
        Self {
            resource,
            system: &resource.url,
            concepts: Vec::new(),
            properties: Vec::new(),
            related_codesystems: Vec::new(),
            valueset: None,
        }
    }
}

impl<'a> RelationshipResolver<'a> {
    /// Resolve a CodeSystem, its supplemented base and its `valueSet`.
    ///
    /// A supplement whose base cannot be found is a [`FhirGuardError::NotFound`].
    pub fn resolve_codesystem(
        &mut self,
        codesystem: &'a CodeSystem,
    ) -> Result<CodeSystemRelationship<'a>> {
        let mut relationship = CodeSystemRelationship::new(codesystem);

        if let Some(base_url) = codesystem.supplements.as_deref().filter(|s| !s.is_empty()) {
            if self.is_resolving(base_url) {
                warn!(
                    "CodeSystem '{}' is part of a supplement cycle through '{}'",
                    codesystem.resource_id(),
                    base_url
                );
            } else {
                let base = self.search.find_codesystem(base_url).ok_or_else(|| {
                    FhirGuardError::not_found(
                        "CodeSystem",
                        format!(
                            "{} (supplemented by '{}')",
                            base_url,
                            codesystem.resource_id()
                        ),
                    )
                })?;

                let base_relationship =
                    self.with_resolving(&codesystem.url, |resolver| resolver.resolve_codesystem(base))?;
                relationship.system = base_relationship.system;
                relationship.concepts = base_relationship.concepts;
                relationship.properties = base_relationship.properties;
                relationship.related_codesystems.push(base);
                relationship
                    .related_codesystems
                    .extend(base_relationship.related_codesystems);
            }
        }

        relationship
            .concepts
            .extend(flatten_concepts(&codesystem.concept, relationship.system, None));
        relationship
            .properties
            .extend(codesystem.property.iter().cloned());

        if let Some(valueset_url) = codesystem.value_set.as_deref().filter(|s| !s.is_empty()) {
            match self.search.find_valueset(valueset_url) {
                Some(valueset) if self.is_resolving(&valueset.url) => {
                    warn!(
                        "ValueSet '{}' is already being resolved, skipping",
                        valueset.url
                    );
                }
                Some(valueset) => match self.resolve_valueset(valueset) {
                    Ok(resolved) => relationship.valueset = Some(Box::new(resolved)),
                    Err(e) if e.is_terminal() => info!("{}", e),
                    Err(e) => return Err(e),
                },
                None => warn!(
                    "ValueSet with URL '{}' for CodeSystem '{}' could not be identified",
                    valueset_url,
                    codesystem.resource_id()
                ),
            }
        }

        Ok(relationship)
    }
}

/// Flatten a concept hierarchy depth-first, parents before children.
///
/// With `subset`, only the concept with that code and its descendants are kept,
/// wherever it sits in the hierarchy. A code seen twice is skipped together with
/// its children, so self-referencing hierarchies terminate.
pub(crate) fn flatten_concepts(
    roots: &[ConceptDefinition],
    system: &str,
    subset: Option<&str>,
) -> Vec<Concept> {
    let mut concepts = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<(&ConceptDefinition, bool)> =
        roots.iter().rev().map(|concept| (concept, false)).collect();

    while let Some((concept, ancestor_selected)) = stack.pop() {
        let selected = ancestor_selected || subset.is_none_or(|code| concept.code == code);

        if selected {
            if !seen.insert(concept.code.as_str()) {
                warn!(
                    "Concept '{}' appears more than once in '{}', skipping",
                    concept.code, system
                );
                continue;
            }
            concepts.push(Concept::from_definition(concept, system));
        }

        stack.extend(concept.concept.iter().rev().map(|child| (child, selected)));
    }

    concepts
}
