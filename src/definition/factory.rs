use tracing::info;

use super::{DefinitionCompiler, DefinitionSet};
use crate::error::Result;
use crate::package::{ResourceFilter, ResourceProvider};
use crate::relationship::{PackageSearch, RelationshipResolver};

/// Resolves and compiles every CodeSystem and ValueSet of the target packages.
pub struct DefinitionFactory<'a> {
    provider: &'a dyn ResourceProvider,
    target_packages: &'a [String],
    reference_packages: &'a [String],
    compiler: DefinitionCompiler,
}

impl<'a> DefinitionFactory<'a> {
    pub fn new(
        provider: &'a dyn ResourceProvider,
        target_packages: &'a [String],
        reference_packages: &'a [String],
    ) -> Self {
        Self {
            provider,
            target_packages,
            reference_packages,
            compiler: DefinitionCompiler::new(),
        }
    }

    fn resolver(&self, package_id: &'a str) -> RelationshipResolver<'a> {
        RelationshipResolver::new(PackageSearch::new(
            self.provider,
            package_id,
            self.target_packages,
            self.reference_packages,
        ))
    }

    /// Compile all CodeSystems first, then all ValueSets, package by package.
    ///
    /// A resource ending in an empty expansion is skipped. Any other resolution
    /// error aborts the run.
    pub fn generate(&self) -> Result<DefinitionSet> {
        let mut definitions = DefinitionSet::new();
        let provider = self.provider;

        for package_id in self.target_packages {
            let mut resolver = self.resolver(package_id);
            let filter = ResourceFilter::new().package(package_id.as_str());
            for codesystem in provider.filter_codesystems(&filter) {
                match resolver.resolve_codesystem(codesystem) {
                    Ok(relationship) => definitions
                        .codesystems
                        .push(self.compiler.compile_codesystem(&relationship)?),
                    Err(e) if e.is_terminal() => info!("{}", e),
                    Err(e) => return Err(e),
                }
            }
        }
        info!(
            "Generated {} CodeSystem definitions",
            definitions.codesystems.len()
        );

        for package_id in self.target_packages {
            let mut resolver = self.resolver(package_id);
            let filter = ResourceFilter::new().package(package_id.as_str());
            for valueset in provider.filter_valuesets(&filter) {
                match resolver.resolve_valueset(valueset) {
                    Ok(relationship) => definitions
                        .valuesets
                        .push(self.compiler.compile_valueset(&relationship)?),
                    Err(e) if e.is_terminal() => info!("{}", e),
                    Err(e) => return Err(e),
                }
            }
        }
        info!(
            "Generated {} ValueSet definitions",
            definitions.valuesets.len()
        );

        Ok(definitions)
    }
}

impl std::fmt::Debug for DefinitionFactory<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionFactory")
            .field("target_packages", &self.target_packages)
            .field("reference_packages", &self.reference_packages)
            .finish_non_exhaustive()
    }
}
