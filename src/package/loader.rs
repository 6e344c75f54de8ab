use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::provider::{AvailableResources, PackageResources, PackageSummary};
use crate::config::GuardConfig;
use crate::error::{FhirGuardError, Result};
use crate::types::TerminologyResource;

#[derive(Debug, Deserialize)]
struct PackageManifest {
    name: String,
    version: String,
}

/// Reads extracted FHIR packages from disk.
#[derive(Debug, Clone)]
pub struct PackageLoader {
    config: GuardConfig,
}

impl PackageLoader {
    pub fn new(config: GuardConfig) -> Self {
        Self { config }
    }

    /// Load every named package from the configured package directory, in order.
    pub fn load_all<S: AsRef<str>>(&self, names: &[S]) -> Result<AvailableResources> {
        let mut resources = AvailableResources::new();
        for name in names {
            let package = Self::load(self.config.package_path(name.as_ref()))?;
            resources.add_package(package);
        }
        Ok(resources)
    }

    /// Resource counts for each named package directory, loaded one at a time
    /// so directories carrying the same package id are reported separately.
    pub fn summarize<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<(String, PackageSummary)>> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let package = Self::load(self.config.package_path(name))?;
                Ok((name.to_string(), package.summary()))
            })
            .collect()
    }

    /// Load one extracted package directory.
    ///
    /// The package id is `name@version` from `package/package.json`. Only
    /// CodeSystem and ValueSet resources are kept, and files whose name
    /// contains `example` are skipped.
    pub fn load(path: impl AsRef<Path>) -> Result<PackageResources> {
        let path = path.as_ref();
        let manifest_path = path.join("package").join("package.json");
        if !manifest_path.exists() {
            return Err(FhirGuardError::not_found(
                "Package manifest",
                manifest_path.display().to_string(),
            ));
        }

        let manifest: PackageManifest = serde_json::from_str(&fs::read_to_string(&manifest_path)?)?;
        let mut package = PackageResources::new(format!("{}@{}", manifest.name, manifest.version));

        let entries = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"));

        for entry in entries {
            let file_name = entry.file_name().to_string_lossy();
            if file_name.contains("example") {
                continue;
            }

            let Some(resource) = Self::read_resource(entry.path())? else {
                continue;
            };
            package.insert(resource);
        }

        debug!(
            "Loaded package '{}' with {} CodeSystems and {} ValueSets",
            package.id,
            package.code_systems.len(),
            package.value_sets.len()
        );
        Ok(package)
    }

    fn read_resource(path: &Path) -> Result<Option<TerminologyResource>> {
        let content = fs::read_to_string(path)?;
        let value: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!("Skipping unreadable JSON file {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        let resource_type = value.get("resourceType").and_then(Value::as_str);
        if !matches!(resource_type, Some("CodeSystem" | "ValueSet")) {
            return Ok(None);
        }

        let file = path.display().to_string();
        if value
            .get("name")
            .and_then(Value::as_str)
            .is_none_or(str::is_empty)
        {
            return Err(FhirGuardError::structural(file, "resource does not have a name"));
        }

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| FhirGuardError::structural(file, e.to_string()))
    }
}
