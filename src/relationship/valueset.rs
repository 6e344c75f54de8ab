use indexmap::IndexSet;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::codesystem::flatten_concepts;
use super::{Concept, RelationshipResolver, is_reference_only};
use crate::error::{FhirGuardError, Result};
use crate::types::{
    CodeSystem, ExpansionContains, IncludeConcept, ValueSet, ValueSetCompose, ValueSetExpansion,
    ValueSetInclude,
};

#[derive(Debug, Clone)]
pub struct ValueSetRelationship<'a> {
    pub resource: &'a ValueSet,
    pub codesystems: Vec<&'a CodeSystem>,
    pub concepts: Vec<Concept>,
    /// Includes of reference-only systems, kept opaque.
    pub includes: Vec<&'a ValueSetInclude>,
    /// Flattened, non-abstract expansion entries.
    pub contains: Vec<Concept>,
}

impl<'a> ValueSetRelationship<'a> {
    fn new(resource: &'a ValueSet) -> Self {
        Self {
            resource,
            codesystems: Vec::new(),
            concepts: Vec::new(),
            includes: Vec::new(),
            contains: Vec::new(),
        }
    }

    fn merge(&mut self, other: ValueSetRelationship<'a>) {
        self.codesystems.extend(other.codesystems);
        self.concepts.extend(other.concepts);
        self.includes.extend(other.includes);
        self.contains.extend(other.contains);
    }

    /// Drop repeated entries, keeping the first occurrence of each.
    fn deduplicate(&mut self) {
        let mut seen = HashSet::new();
        self.codesystems.retain(|cs| {
            let cs: &'a CodeSystem = cs;
            seen.insert((cs.url.as_str(), cs.id.as_deref()))
        });

        self.concepts = std::mem::take(&mut self.concepts)
            .into_iter()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();
        self.contains = std::mem::take(&mut self.contains)
            .into_iter()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();

        let mut includes: Vec<&'a ValueSetInclude> = Vec::with_capacity(self.includes.len());
        for include in self.includes.drain(..) {
            if !includes.contains(&include) {
                includes.push(include);
            }
        }
        self.includes = includes;
    }
}

impl<'a> RelationshipResolver<'a> {
    /// Resolve a ValueSet's compose and expansion into its full closure.
    ///
    /// A ValueSet with neither is a [`FhirGuardError::Structural`] error. An
    /// expansion declaring `total: 0` ends with [`FhirGuardError::EmptyExpansion`].
    pub fn resolve_valueset(&mut self, valueset: &'a ValueSet) -> Result<ValueSetRelationship<'a>> {
        if valueset.compose.is_none() && valueset.expansion.is_none() {
            return Err(FhirGuardError::structural(
                valueset.resource_id(),
                "ValueSet has no compose or expansion",
            ));
        }

        let mut relationship = self.with_resolving(&valueset.url, |resolver| {
            let mut relationship = ValueSetRelationship::new(valueset);
            if let Some(compose) = &valueset.compose {
                resolver.match_compose(compose, &mut relationship)?;
            }
            if let Some(expansion) = &valueset.expansion {
                resolver.match_expansion(valueset, expansion, &mut relationship)?;
            }
            Ok::<_, FhirGuardError>(relationship)
        })?;

        relationship.deduplicate();
        Ok(relationship)
    }

    fn match_compose(
        &mut self,
        compose: &'a ValueSetCompose,
        relationship: &mut ValueSetRelationship<'a>,
    ) -> Result<()> {
        for include in &compose.include {
            if let Some(system) = include.system.as_deref().filter(|s| !s.is_empty()) {
                self.match_include_system(system, include, relationship);
            } else {
                relationship
                    .concepts
                    .extend(include.concept.iter().map(|c| include_concept(c, None)));
            }

            for url in &include.value_set {
                self.match_nested_valueset(url, relationship)?;
            }
        }
        Ok(())
    }

    fn match_include_system(
        &self,
        system: &str,
        include: &'a ValueSetInclude,
        relationship: &mut ValueSetRelationship<'a>,
    ) {
        if include.supplements.is_some() {
            warn!("Supplements on ValueSet includes are not supported ('{}')", system);
        }

        if is_reference_only(system) {
            relationship.includes.push(include);
            relationship
                .concepts
                .extend(include.concept.iter().map(|c| include_concept(c, Some(system))));
            return;
        }

        let Some(codesystem) = self.search.find_codesystem(system) else {
            warn!("CodeSystem with URL '{}' could not be identified", system);
            relationship
                .concepts
                .extend(include.concept.iter().map(|c| include_concept(c, Some(system))));
            return;
        };

        if let Some(version) = include.version.as_deref() {
            if codesystem.version.as_deref() != Some(version) {
                warn!(
                    "Version mismatch for CodeSystem '{}' with system '{}': include wants '{}', found '{}'",
                    codesystem.resource_id(),
                    system,
                    version,
                    codesystem.version.as_deref().unwrap_or("none")
                );
            }
        }

        if include.concept.is_empty() {
            relationship
                .concepts
                .extend(flatten_concepts(&codesystem.concept, system, None));
        } else {
            for wanted in &include.concept {
                let matched = flatten_concepts(&codesystem.concept, system, Some(&wanted.code));
                if matched.is_empty() {
                    debug!(
                        "Code '{}' is not defined by CodeSystem '{}', keeping include concept",
                        wanted.code,
                        codesystem.resource_id()
                    );
                    relationship.concepts.push(include_concept(wanted, Some(system)));
                } else {
                    relationship.concepts.extend(matched);
                }
            }
        }

        relationship.codesystems.push(codesystem);
    }

    fn match_nested_valueset(
        &mut self,
        url: &str,
        relationship: &mut ValueSetRelationship<'a>,
    ) -> Result<()> {
        if self.is_resolving(url) {
            warn!("ValueSet '{}' is already being resolved, skipping", url);
            return Ok(());
        }

        let Some(nested) = self.search.find_valueset(url) else {
            warn!("ValueSet with URL '{}' could not be identified", url);
            return Ok(());
        };

        match self.resolve_valueset(nested) {
            Ok(resolved) => relationship.merge(resolved),
            Err(e) if e.is_terminal() => info!("{}", e),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn match_expansion(
        &self,
        valueset: &'a ValueSet,
        expansion: &'a ValueSetExpansion,
        relationship: &mut ValueSetRelationship<'a>,
    ) -> Result<()> {
        if expansion.total == Some(0) {
            return Err(FhirGuardError::empty_expansion(valueset.resource_id()));
        }

        for parameter in &expansion.parameter {
            if parameter.name != "version" {
                continue;
            }
            let Some(version_uri) = parameter.value_uri.as_deref() else {
                continue;
            };
            if version_uri.contains("snomed.info") {
                continue;
            }

            let uri = version_uri
                .split_once('|')
                .map_or(version_uri, |(uri, _)| uri);
            match self.search.find_codesystem(uri) {
                Some(codesystem) => relationship.codesystems.push(codesystem),
                None => warn!("CodeSystem with URL '{}' could not be identified", uri),
            }
        }

        relationship.contains.extend(flatten_contains(&expansion.contains));
        Ok(())
    }
}

fn include_concept(concept: &IncludeConcept, system: Option<&str>) -> Concept {
    Concept {
        display: concept.display.clone(),
        ..Concept::new(concept.code.clone(), system)
    }
}

/// Flatten expansion entries depth-first. Abstract entries contribute their
/// descendants but are not values themselves.
fn flatten_contains(roots: &[ExpansionContains]) -> Vec<Concept> {
    let mut values = Vec::new();
    let mut seen: HashSet<(&str, Option<&str>)> = HashSet::new();
    let mut stack: Vec<&ExpansionContains> = roots.iter().rev().collect();

    while let Some(entry) = stack.pop() {
        stack.extend(entry.contains.iter().rev());

        let Some(code) = entry.code.as_deref() else {
            continue;
        };
        if entry.is_abstract.unwrap_or(false) {
            continue;
        }
        if !seen.insert((code, entry.system.as_deref())) {
            warn!(
                "Expansion entry '{}' ({}) appears more than once, skipping",
                code,
                entry.system.as_deref().unwrap_or("no system")
            );
            continue;
        }
        values.push(Concept::from_contains(entry, code));
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{AvailableResources, PackageResources};
    use crate::relationship::PackageSearch;
    use crate::types::{ConceptDefinition, ExpansionParameter};

    const GENDER_CS: &str = "http://hl7.org/fhir/administrative-gender";

    fn gender_codesystem() -> CodeSystem {
        CodeSystem {
            id: Some("administrative-gender".into()),
            url: GENDER_CS.into(),
            name: "AdministrativeGender".into(),
            version: Some("4.0.1".into()),
            concept: vec![
                ConceptDefinition::new("male").with_display("Male"),
                ConceptDefinition::new("female").with_display("Female"),
                ConceptDefinition::new("other").with_display("Other"),
                ConceptDefinition::new("unknown").with_display("Unknown"),
            ],
            ..Default::default()
        }
    }

    fn valueset(name: &str, url: &str) -> ValueSet {
        ValueSet {
            id: Some(name.to_lowercase()),
            url: url.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    fn composed(name: &str, url: &str, includes: Vec<ValueSetInclude>) -> ValueSet {
        ValueSet {
            compose: Some(ValueSetCompose {
                include: includes,
                ..Default::default()
            }),
            ..valueset(name, url)
        }
    }

    fn resolve_in<T>(
        resources: &AvailableResources,
        name: &str,
        check: impl FnOnce(Result<ValueSetRelationship<'_>>) -> T,
    ) -> T {
        let targets = vec!["pkg@1".to_string()];
        let package = resources.package("pkg@1").unwrap();
        let mut resolver =
            RelationshipResolver::new(PackageSearch::new(resources, "pkg@1", &targets, &[]));
        check(resolver.resolve_valueset(&package.value_sets[name]))
    }

    fn codes(concepts: &[Concept]) -> Vec<&str> {
        concepts.iter().map(|c| c.code.as_str()).collect()
    }

    #[test]
    fn test_compose_includes_whole_codesystem() {
        let resources = AvailableResources::new().with_package(
            PackageResources::new("pkg@1")
                .with_codesystem(gender_codesystem())
                .with_valueset(composed(
                    "AdministrativeGender",
                    "http://hl7.org/fhir/ValueSet/administrative-gender",
                    vec![ValueSetInclude::system(GENDER_CS)],
                )),
        );

        resolve_in(&resources, "AdministrativeGender", |result| {
            let relationship = result.unwrap();
            assert_eq!(codes(&relationship.concepts), vec!["male", "female", "other", "unknown"]);
            assert_eq!(relationship.codesystems.len(), 1);
            assert!(relationship.includes.is_empty());
        });
    }

    #[test]
    fn test_compose_concept_subset_and_reference_only_systems() {
        let resources = AvailableResources::new().with_package(
            PackageResources::new("pkg@1")
                .with_codesystem(gender_codesystem())
                .with_valueset(composed(
                    "Mixed",
                    "http://example.org/ValueSet/mixed",
                    vec![
                        ValueSetInclude::system(GENDER_CS).with_concept("female", None),
                        ValueSetInclude::system("http://snomed.info/sct")
                            .with_concept("394576009", Some("Surgical accident")),
                        ValueSetInclude::system("urn:ietf:bcp:47"),
                    ],
                )),
        );

        resolve_in(&resources, "Mixed", |result| {
            let relationship = result.unwrap();
            assert_eq!(codes(&relationship.concepts), vec!["female", "394576009"]);
            assert_eq!(
                relationship.concepts[1].system.as_deref(),
                Some("http://snomed.info/sct")
            );
            assert_eq!(relationship.includes.len(), 2);
        });
    }

    #[test]
    fn test_nested_valuesets_are_merged_and_cycles_skipped() {
        let resources = AvailableResources::new().with_package(
            PackageResources::new("pkg@1")
                .with_codesystem(gender_codesystem())
                .with_valueset(composed(
                    "Outer",
                    "http://example.org/ValueSet/outer",
                    vec![ValueSetInclude::default().with_value_set("http://example.org/ValueSet/inner")],
                ))
                .with_valueset(composed(
                    "Inner",
                    "http://example.org/ValueSet/inner",
                    vec![
                        ValueSetInclude::system(GENDER_CS).with_concept("male", None),
                        ValueSetInclude::default().with_value_set("http://example.org/ValueSet/outer"),
                        ValueSetInclude::default().with_value_set("http://example.org/ValueSet/missing"),
                    ],
                )),
        );

        resolve_in(&resources, "Outer", |result| {
            let relationship = result.unwrap();
            assert_eq!(codes(&relationship.concepts), vec!["male"]);
            assert_eq!(relationship.codesystems[0].resource_id(), "administrative-gender");
        });
    }

    #[test]
    fn test_expansion_flattening_skips_abstract_entries() {
        let mut expanded = valueset("Languages", "http://example.org/ValueSet/languages");
        expanded.expansion = Some(ValueSetExpansion {
            total: Some(3),
            parameter: vec![ExpansionParameter {
                name: "version".into(),
                value_uri: Some(format!("{GENDER_CS}|4.0.1")),
                value_string: None,
            }],
            contains: vec![
                ExpansionContains::new("urn:ietf:bcp:47", "group")
                    .abstract_group()
                    .with_child(ExpansionContains::new("urn:ietf:bcp:47", "en").with_display("English"))
                    .with_child(ExpansionContains::new("urn:ietf:bcp:47", "fr")),
                ExpansionContains::new("urn:ietf:bcp:47", "en"),
            ],
            ..Default::default()
        });
        let resources = AvailableResources::new().with_package(
            PackageResources::new("pkg@1")
                .with_codesystem(gender_codesystem())
                .with_valueset(expanded),
        );

        resolve_in(&resources, "Languages", |result| {
            let relationship = result.unwrap();
            assert_eq!(codes(&relationship.contains), vec!["en", "fr"]);
            assert_eq!(relationship.contains[0].display.as_deref(), Some("English"));
            assert_eq!(relationship.codesystems.len(), 1);
        });
    }

    #[test]
    fn test_abstract_entry_does_not_hide_concrete_entry_with_same_code() {
        let roots = vec![
            ExpansionContains::new("urn:ietf:bcp:47", "en")
                .abstract_group()
                .with_child(ExpansionContains::new("urn:ietf:bcp:47", "en-US")),
            ExpansionContains::new("urn:ietf:bcp:47", "en").with_display("English"),
        ];

        let values = flatten_contains(&roots);
        assert_eq!(codes(&values), vec!["en-US", "en"]);
        assert_eq!(values[1].display.as_deref(), Some("English"));
    }

    #[test]
    fn test_empty_expansion_is_terminal() {
        let mut empty = valueset("Empty", "http://example.org/ValueSet/empty");
        empty.expansion = Some(ValueSetExpansion {
            total: Some(0),
            ..Default::default()
        });
        let resources =
            AvailableResources::new().with_package(PackageResources::new("pkg@1").with_valueset(empty));

        resolve_in(&resources, "Empty", |result| {
            assert!(result.unwrap_err().is_terminal());
        });
    }

    #[test]
    fn test_valueset_without_compose_or_expansion_is_structural() {
        let resources = AvailableResources::new().with_package(
            PackageResources::new("pkg@1")
                .with_valueset(valueset("Bare", "http://example.org/ValueSet/bare")),
        );

        resolve_in(&resources, "Bare", |result| {
            assert!(matches!(result.unwrap_err(), FhirGuardError::Structural { .. }));
        });
    }

    #[test]
    fn test_deduplicate_keeps_first_occurrence() {
        let vs = valueset("Dup", "http://example.org/ValueSet/dup");
        let cs_a = gender_codesystem();
        let mut cs_b = gender_codesystem();
        cs_b.url = "http://example.org/other".into();

        let mut relationship = ValueSetRelationship::new(&vs);
        relationship.codesystems = vec![&cs_a, &cs_b, &cs_a];
        relationship.concepts = vec![
            Concept::new("b", None),
            Concept::new("a", None),
            Concept::new("b", None),
        ];
        relationship.deduplicate();

        assert_eq!(relationship.codesystems.len(), 2);
        assert_eq!(relationship.codesystems[0].url, GENDER_CS);
        assert_eq!(codes(&relationship.concepts), vec!["b", "a"]);
    }
}
