use indexmap::IndexMap;
use serde::Serialize;

use crate::types::{CodeSystem, TerminologyResource, ValueSet};

/// Criteria for narrowing package resources. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFilter {
    pub package_id: Option<String>,
    pub resource_id: Option<String>,
    pub url: Option<String>,
    /// Matches `CodeSystem.valueSet`. Ignored for ValueSets.
    pub value_set: Option<String>,
}

impl ResourceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn package(mut self, package_id: impl Into<String>) -> Self {
        self.package_id = Some(package_id.into());
        self
    }

    pub fn resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn value_set(mut self, value_set: impl Into<String>) -> Self {
        self.value_set = Some(value_set.into());
        self
    }

    fn accepts_package(&self, package_id: &str) -> bool {
        self.package_id.as_deref().is_none_or(|id| id == package_id)
    }

    fn accepts_codesystem(&self, codesystem: &CodeSystem) -> bool {
        self.resource_id
            .as_deref()
            .is_none_or(|id| codesystem.id.as_deref() == Some(id))
            && self.url.as_deref().is_none_or(|url| codesystem.url == url)
            && self
                .value_set
                .as_deref()
                .is_none_or(|vs| codesystem.value_set.as_deref() == Some(vs))
    }

    fn accepts_valueset(&self, valueset: &ValueSet) -> bool {
        self.resource_id
            .as_deref()
            .is_none_or(|id| valueset.id.as_deref() == Some(id))
            && self.url.as_deref().is_none_or(|url| valueset.url == url)
    }
}

/// Source of typed terminology resources, grouped by package.
pub trait ResourceProvider {
    fn filter_codesystems<'a>(
        &'a self,
        filter: &ResourceFilter,
    ) -> Box<dyn Iterator<Item = &'a CodeSystem> + 'a>;

    fn filter_valuesets<'a>(
        &'a self,
        filter: &ResourceFilter,
    ) -> Box<dyn Iterator<Item = &'a ValueSet> + 'a>;
}

/// The CodeSystems and ValueSets of one package, keyed by resource name.
#[derive(Debug, Clone, Default)]
pub struct PackageResources {
    pub id: String,
    pub code_systems: IndexMap<String, CodeSystem>,
    pub value_sets: IndexMap<String, ValueSet>,
}

impl PackageResources {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Add a resource. A later resource with the same name replaces the earlier one.
    pub fn insert(&mut self, resource: TerminologyResource) {
        match resource {
            TerminologyResource::CodeSystem(cs) => {
                self.code_systems.insert(cs.name.clone(), cs);
            }
            TerminologyResource::ValueSet(vs) => {
                self.value_sets.insert(vs.name.clone(), vs);
            }
        }
    }

    pub fn with_codesystem(mut self, codesystem: CodeSystem) -> Self {
        self.insert(TerminologyResource::CodeSystem(codesystem));
        self
    }

    pub fn with_valueset(mut self, valueset: ValueSet) -> Self {
        self.insert(TerminologyResource::ValueSet(valueset));
        self
    }

    pub fn summary(&self) -> PackageSummary {
        PackageSummary {
            package_id: self.id.clone(),
            code_systems: self.code_systems.len(),
            value_sets: self.value_sets.len(),
        }
    }
}

/// Per-package resource counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    pub package_id: String,
    pub code_systems: usize,
    pub value_sets: usize,
}

/// All loaded target and reference packages, in load order.
#[derive(Debug, Clone, Default)]
pub struct AvailableResources {
    packages: IndexMap<String, PackageResources>,
}

impl AvailableResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_package(&mut self, package: PackageResources) {
        self.packages.insert(package.id.clone(), package);
    }

    pub fn with_package(mut self, package: PackageResources) -> Self {
        self.add_package(package);
        self
    }

    pub fn package(&self, package_id: &str) -> Option<&PackageResources> {
        self.packages.get(package_id)
    }

    pub fn package_ids(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn summary(&self) -> Vec<PackageSummary> {
        self.packages.values().map(PackageResources::summary).collect()
    }
}

impl ResourceProvider for AvailableResources {
    fn filter_codesystems<'a>(
        &'a self,
        filter: &ResourceFilter,
    ) -> Box<dyn Iterator<Item = &'a CodeSystem> + 'a> {
        let package_filter = filter.clone();
        let filter = filter.clone();
        Box::new(
            self.packages
                .values()
                .filter(move |package| package_filter.accepts_package(&package.id))
                .flat_map(|package| package.code_systems.values())
                .filter(move |cs| filter.accepts_codesystem(cs)),
        )
    }

    fn filter_valuesets<'a>(
        &'a self,
        filter: &ResourceFilter,
    ) -> Box<dyn Iterator<Item = &'a ValueSet> + 'a> {
        let package_filter = filter.clone();
        let filter = filter.clone();
        Box::new(
            self.packages
                .values()
                .filter(move |package| package_filter.accepts_package(&package.id))
                .flat_map(|package| package.value_sets.values())
                .filter(move |vs| filter.accepts_valueset(vs)),
        )
    }
}
