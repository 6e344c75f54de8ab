use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::{Binding, CodeValidator, CodingValidator, Iso639Languages, LanguageLookup, Validator};
use crate::config::StoreConfig;
use crate::error::Result;
use crate::path::query_value;
use crate::storage::MetadataStore;
use crate::types::{Issue, IssueSeverity};

/// Entry point for validating records against compiled definitions.
pub struct FhirGuard {
    store: MetadataStore,
    languages: Arc<dyn LanguageLookup>,
}

impl FhirGuard {
    /// Open the definition directories in priority order.
    pub fn open<P: AsRef<Path>>(paths: &[P], config: &StoreConfig) -> Result<Self> {
        Ok(Self::from_store(MetadataStore::open(paths, config)?))
    }

    pub fn from_store(store: MetadataStore) -> Self {
        Self {
            store,
            languages: Arc::new(Iso639Languages::new()),
        }
    }

    pub fn with_languages(mut self, languages: Arc<dyn LanguageLookup>) -> Self {
        self.languages = languages;
        self
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Start validating one record.
    pub fn validator<'g, 'r>(&'g self, resource: &'r Value) -> ValidatorStrategy<'g, 'r> {
        ValidatorStrategy {
            guard: self,
            resource,
            issues: IndexMap::new(),
        }
    }
}

impl std::fmt::Debug for FhirGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FhirGuard")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Collects issues for one record across any number of bound paths.
///
/// Each call queries its path, validates every value found there and files the
/// issues under that path. Calls chain:
///
/// ```ignore
/// let result = guard
///     .validator(&patient)
///     .code("gender", Binding::valueset("AdministrativeGender"))?
///     .codeable_concept("maritalStatus", Binding::valueset("marital-status"))?;
/// assert!(result.is_valid());
/// ```
#[derive(Debug)]
pub struct ValidatorStrategy<'g, 'r> {
    guard: &'g FhirGuard,
    resource: &'r Value,
    issues: IndexMap<String, Vec<Issue>>,
}

impl<'g, 'r> ValidatorStrategy<'g, 'r> {
    /// Validate the plain codes at `path`.
    pub fn code(mut self, path: &str, binding: Binding) -> Result<Self> {
        binding.check()?;
        let values = query_value(self.resource, path);
        if values.is_empty() {
            return Ok(self.missing(path, &binding, "Code resource is missing or null"));
        }

        let mut validator = CodeValidator::new(&self.guard.store);
        for (index, value) in values.iter().enumerate() {
            validator.validate(
                &child_path(path, index, values.len()),
                value,
                binding.valueset.as_deref(),
                binding.codesystem.as_deref(),
            )?;
        }
        self.record(path, validator.take_issues());
        Ok(self)
    }

    /// Validate the `Coding` objects at `path`.
    pub fn coding(mut self, path: &str, binding: Binding) -> Result<Self> {
        binding.check()?;
        let values = query_value(self.resource, path);
        if values.is_empty() {
            return Ok(self.missing(path, &binding, "Coding resource is missing or null"));
        }

        let mut validator = self.coding_validator();
        for (index, value) in values.iter().enumerate() {
            validator.validate(
                &child_path(path, index, values.len()),
                value,
                binding.valueset.as_deref(),
                binding.codesystem.as_deref(),
            )?;
        }
        self.record(path, validator.take_issues());
        Ok(self)
    }

    /// Validate every `coding` of the `CodeableConcept` objects at `path`.
    pub fn codeable_concept(mut self, path: &str, binding: Binding) -> Result<Self> {
        binding.check()?;
        let concepts = query_value(self.resource, path);
        if concepts.is_empty() {
            return Ok(self.missing(path, &binding, "CodeableConcept resource is missing or null"));
        }

        let mut validator = self.coding_validator();
        let mut issues = Vec::new();
        for (index, concept) in concepts.iter().enumerate() {
            let concept_path = child_path(path, index, concepts.len());
            let Some(object) = concept.as_object() else {
                issues.push(Issue::error(
                    "CodeableConcept resource is not a valid FHIR CodeableConcept resource",
                    concept_path,
                ));
                continue;
            };

            let codings = match object.get("coding") {
                Some(Value::Array(codings)) => codings.iter().collect(),
                Some(Value::Null) | None => Vec::new(),
                Some(coding) => vec![coding],
            };
            for (i, coding) in codings.into_iter().enumerate() {
                validator.validate(
                    &format!("{concept_path}.coding[{i}]"),
                    coding,
                    binding.valueset.as_deref(),
                    binding.codesystem.as_deref(),
                )?;
            }
            issues.extend(validator.take_issues());
        }
        self.record(path, issues);
        Ok(self)
    }

    fn coding_validator(&self) -> CodingValidator<'g> {
        CodingValidator::new(&self.guard.store, Arc::clone(&self.guard.languages))
    }

    fn missing(mut self, path: &str, binding: &Binding, diagnostics: &str) -> Self {
        if binding.required {
            self.record(path, vec![Issue::error(diagnostics, path)]);
        } else {
            debug!("Skipping absent optional path '{}'", path);
        }
        self
    }

    fn record(&mut self, path: &str, issues: Vec<Issue>) {
        if issues.is_empty() {
            return;
        }
        self.issues.entry(path.to_string()).or_default().extend(issues);
    }

    /// Issues in the order the paths were first validated.
    pub fn issues(&self) -> Vec<&Issue> {
        self.issues.values().flatten().collect()
    }

    pub fn issues_at(&self, path: &str) -> &[Issue] {
        self.issues.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues.into_values().flatten().collect()
    }

    /// No fatal or error issue anywhere in the record.
    pub fn is_valid(&self) -> bool {
        !self
            .issues
            .values()
            .flatten()
            .any(|issue| issue.severity.is_blocking())
    }

    pub fn has_warnings(&self) -> bool {
        self.issues
            .values()
            .flatten()
            .any(|issue| issue.severity == IssueSeverity::Warning)
    }

    pub fn outcome(&self) -> OperationOutcome {
        OperationOutcome::new(self.issues().into_iter().cloned().collect())
    }
}

/// `path` for a single value, `path[index]` when the path matched several.
fn child_path(path: &str, index: usize, count: usize) -> String {
    if count > 1 {
        format!("{path}[{index}]")
    } else {
        path.to_string()
    }
}

/// A FHIR `OperationOutcome` carrying the collected issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    pub resource_type: String,
    #[serde(default)]
    pub issue: Vec<Issue>,
}

impl OperationOutcome {
    pub fn new(issue: Vec<Issue>) -> Self {
        Self {
            resource_type: "OperationOutcome".to_string(),
            issue,
        }
    }
}
