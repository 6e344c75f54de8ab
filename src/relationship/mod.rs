//! Transitive resolution of terminology resources across packages.
//!
//! A [`RelationshipResolver`] is bound to the package that owns the resources it
//! resolves. Canonical URLs are looked up in that package first, then in the
//! other target packages, then in the reference packages. The first hit wins.

pub mod codesystem;
pub mod valueset;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::package::{ResourceFilter, ResourceProvider};
use crate::types::{CodeSystem, ConceptDefinition, ExpansionContains, ValueSet};

pub use codesystem::CodeSystemRelationship;
pub use valueset::ValueSetRelationship;

/// External systems that are referenced by URI only and never expanded.
pub const REFERENCE_ONLY_SYSTEMS: &[&str] = &[
    "http://snomed.info/sct",
    "http://loinc.org",
    "https://dmd.nhs.uk",
    "urn:iso:std:iso:3166",
    "urn:iso:std:iso:3166:-2",
    "urn:ietf:bcp:47",
    "http://unitsofmeasure.org",
    "urn:ietf:rfc:3986",
    "urn:ietf:bcp:13",
    "urn:iso:std:iso:4217",
];

pub const BCP47_SYSTEM: &str = "urn:ietf:bcp:47";

pub fn is_reference_only(system: &str) -> bool {
    REFERENCE_ONLY_SYSTEMS.contains(&system)
}

/// A concept with its hierarchy flattened away.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Concept {
    pub code: String,
    pub system: Option<String>,
    pub display: Option<String>,
    pub description: Option<String>,
}

impl Concept {
    pub fn new(code: impl Into<String>, system: Option<&str>) -> Self {
        Self {
            code: code.into(),
            system: system.map(str::to_string),
            display: None,
            description: None,
        }
    }

    fn from_definition(concept: &ConceptDefinition, system: &str) -> Self {
        Self {
            code: concept.code.clone(),
            system: Some(system.to_string()),
            display: concept.display.clone(),
            description: concept.definition.clone(),
        }
    }

    fn from_contains(contains: &ExpansionContains, code: &str) -> Self {
        Self {
            code: code.to_string(),
            system: contains.system.clone(),
            display: contains.display.clone(),
            description: None,
        }
    }
}

/// A resource handed to [`RelationshipResolver::resolve`].
#[derive(Debug, Clone, Copy)]
pub enum ResourceRef<'a> {
    CodeSystem(&'a CodeSystem),
    ValueSet(&'a ValueSet),
}

/// The resolved closure of a resource.
#[derive(Debug, Clone)]
pub enum Relationship<'a> {
    CodeSystem(CodeSystemRelationship<'a>),
    ValueSet(ValueSetRelationship<'a>),
}

/// Priority-ordered lookup of canonical URLs across packages.
#[derive(Clone, Copy)]
pub struct PackageSearch<'a> {
    provider: &'a dyn ResourceProvider,
    package_id: &'a str,
    target_packages: &'a [String],
    reference_packages: &'a [String],
}

impl<'a> PackageSearch<'a> {
    pub fn new(
        provider: &'a dyn ResourceProvider,
        package_id: &'a str,
        target_packages: &'a [String],
        reference_packages: &'a [String],
    ) -> Self {
        Self {
            provider,
            package_id,
            target_packages,
            reference_packages,
        }
    }

    pub fn package_id(&self) -> &'a str {
        self.package_id
    }

    /// Own package, then the other target packages, then the reference packages.
    pub fn search_order(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        let own = self.package_id;
        let targets: &'a [String] = self.target_packages;
        let references: &'a [String] = self.reference_packages;
        std::iter::once(own)
            .chain(
                targets
                    .iter()
                    .map(String::as_str)
                    .filter(move |id| *id != own),
            )
            .chain(references.iter().map(String::as_str))
    }

    pub fn find_codesystem(&self, url: &str) -> Option<&'a CodeSystem> {
        let provider = self.provider;
        self.search_order().find_map(|package_id| {
            let filter = ResourceFilter::new().package(package_id).url(url);
            let found = provider.filter_codesystems(&filter).next();
            if let Some(codesystem) = found {
                debug!(
                    "Found CodeSystem '{}' with URL '{}' in package '{}'",
                    codesystem.resource_id(),
                    url,
                    package_id
                );
            }
            found
        })
    }

    pub fn find_valueset(&self, url: &str) -> Option<&'a ValueSet> {
        let provider = self.provider;
        self.search_order().find_map(|package_id| {
            let filter = ResourceFilter::new().package(package_id).url(url);
            let found = provider.filter_valuesets(&filter).next();
            if let Some(valueset) = found {
                debug!(
                    "Found ValueSet '{}' with URL '{}' in package '{}'",
                    valueset.resource_id(),
                    url,
                    package_id
                );
            }
            found
        })
    }
}

impl std::fmt::Debug for PackageSearch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageSearch")
            .field("package_id", &self.package_id)
            .field("target_packages", &self.target_packages)
            .field("reference_packages", &self.reference_packages)
            .finish_non_exhaustive()
    }
}

/// Computes the closure of CodeSystems and ValueSets owned by one package.
#[derive(Debug)]
pub struct RelationshipResolver<'a> {
    search: PackageSearch<'a>,
    /// Canonical URLs currently being resolved, innermost last.
    resolving: Vec<String>,
}

impl<'a> RelationshipResolver<'a> {
    pub fn new(search: PackageSearch<'a>) -> Self {
        Self {
            search,
            resolving: Vec::new(),
        }
    }

    pub fn search(&self) -> &PackageSearch<'a> {
        &self.search
    }

    pub fn resolve(&mut self, resource: ResourceRef<'a>) -> Result<Relationship<'a>> {
        match resource {
            ResourceRef::CodeSystem(codesystem) => self
                .resolve_codesystem(codesystem)
                .map(Relationship::CodeSystem),
            ResourceRef::ValueSet(valueset) => {
                self.resolve_valueset(valueset).map(Relationship::ValueSet)
            }
        }
    }

    fn is_resolving(&self, url: &str) -> bool {
        self.resolving.iter().any(|u| u == url)
    }

    /// Run `f` with `url` pushed onto the resolution stack.
    fn with_resolving<T>(&mut self, url: &str, f: impl FnOnce(&mut Self) -> T) -> T {
        self.resolving.push(url.to_string());
        let result = f(self);
        self.resolving.pop();
        result
    }
}
