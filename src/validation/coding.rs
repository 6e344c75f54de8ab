use serde_json::Value;
use std::sync::Arc;

use super::{LanguageLookup, Target, Validator};
use crate::definition::AllowedValue;
use crate::error::Result;
use crate::storage::MetadataStore;
use crate::types::{Coding, Issue};

/// Validates `Coding` objects: code membership, system and display.
///
/// Bindings whose allowed values are all BCP-47 entries are checked against
/// the language table instead of the compiled definition.
pub struct CodingValidator<'s> {
    store: &'s MetadataStore,
    languages: Arc<dyn LanguageLookup>,
    issues: Vec<Issue>,
}

impl<'s> CodingValidator<'s> {
    pub fn new(store: &'s MetadataStore, languages: Arc<dyn LanguageLookup>) -> Self {
        Self {
            store,
            languages,
            issues: Vec::new(),
        }
    }

    fn parse(&mut self, path: &str, value: &Value) -> Option<Coding> {
        let diagnostics = match value {
            Value::Null => "Coding resource is missing or null",
            Value::Object(map) if map.is_empty() => "Coding resource is empty",
            Value::Object(_) => match serde_json::from_value(value.clone()) {
                Ok(coding) => return Some(coding),
                Err(_) => "Coding resource is not a valid FHIR Coding resource",
            },
            _ => "Coding resource is not a valid FHIR Coding resource",
        };
        self.issues.push(Issue::error(diagnostics, path));
        None
    }

    fn error(&mut self, diagnostics: String, location: String) {
        self.issues.push(Issue::error(diagnostics, location));
    }

    fn warning(&mut self, diagnostics: String, location: String) {
        self.issues.push(Issue::warning(diagnostics, location));
    }

    fn check_code(&mut self, path: &str, coding: &Coding, target: &Target<'_>) -> Result<()> {
        let code = coding.code().unwrap_or_default();

        let Some(allowed) = target.find_code(code)? else {
            self.suggest_code(path, coding, target);
            return Ok(());
        };

        let expected = allowed.display.as_deref();
        if let (Some(expected), None) = (expected, coding.display()) {
            self.warning(
                format!("Coding resource does not have a defined display, expected: '{expected}'"),
                format!("{path}.display"),
            );
        }

        if coding.system().is_none() {
            self.warning(
                format!(
                    "Coding resource does not have a defined system, expected: '{}'",
                    target.resource_url()
                ),
                format!("{path}.system"),
            );
        }

        if let (Some(expected), Some(display)) = (expected, coding.display()) {
            if display != expected {
                self.error(
                    format!(
                        "Coding resource display '{display}' does not match the expected display, expected: '{expected}'"
                    ),
                    format!("{path}.display"),
                );
            }
        }
        Ok(())
    }

    /// An unknown code is downgraded to a warning when the display names exactly
    /// one allowed value.
    fn suggest_code(&mut self, path: &str, coding: &Coding, target: &Target<'_>) {
        let code = coding.code().unwrap_or_default();
        let not_found = format!(
            "Coding resource code '{}' not found in {} '{}'",
            code,
            target.kind(),
            target.key
        );

        let suggestion = coding.display().and_then(|display| {
            let mut candidates = target
                .allowed_values()
                .iter()
                .filter(|v| v.display.as_deref() == Some(display));
            match (candidates.next(), candidates.next()) {
                (Some(only), None) => Some(only),
                _ => None,
            }
        });

        match suggestion {
            Some(AllowedValue { code: suggested, .. }) => self.warning(
                format!("{not_found}. Did you mean '{suggested}'?"),
                format!("{path}.code"),
            ),
            None => self.error(not_found, format!("{path}.code")),
        }
    }

    fn check_language(&mut self, path: &str, coding: &Coding, target: &Target<'_>) {
        let code = coding.code().unwrap_or_default();
        let by_code = self.languages.by_code(code);
        let by_display = coding.display().and_then(|d| self.languages.by_name(d));

        match (by_code, by_display) {
            (None, None) => self.error(
                format!(
                    "Coding resource code '{}' not found in {} '{}'",
                    code,
                    target.kind(),
                    target.resource_url()
                ),
                format!("{path}.code"),
            ),
            (Some(language), None) => match coding.display() {
                None => self.warning(
                    format!(
                        "Coding resource does not have a defined display, expected: '{}'",
                        language.name
                    ),
                    format!("{path}.display"),
                ),
                Some(display) => self.error(
                    format!(
                        "Coding resource display '{}' does not match the expected display, expected: '{}'",
                        display, language.name
                    ),
                    format!("{path}.display"),
                ),
            },
            (None, Some(language)) => self.error(
                format!(
                    "Coding resource code '{}' does not match the expected code, expected: '{}'",
                    code, language.code
                ),
                format!("{path}.code"),
            ),
            (Some(language), Some(named)) if language != named => self.error(
                format!(
                    "Coding resource display '{}' does not match the expected display, expected: '{}'",
                    coding.display().unwrap_or_default(),
                    language.name
                ),
                format!("{path}.display"),
            ),
            (Some(_), Some(_)) => {}
        }
    }
}

impl Validator for CodingValidator<'_> {
    fn validate(
        &mut self,
        path: &str,
        value: &Value,
        valueset: Option<&str>,
        codesystem: Option<&str>,
    ) -> Result<bool> {
        let target = Target::resolve(self.store, valueset, codesystem)?;
        let raised = self.issues.len();

        let Some(coding) = self.parse(path, value) else {
            return Ok(false);
        };

        if let Some(system) = coding.system() {
            if system != target.resource_url() {
                self.error(
                    format!(
                        "Coding system '{}' does not match the expected system, expected: '{}'",
                        system,
                        target.resource_url()
                    ),
                    format!("{path}.system"),
                );
            }
        }

        if target.is_language_only() {
            self.check_language(path, &coding, &target);
        } else {
            self.check_code(path, &coding, &target)?;
        }

        Ok(!self.issues[raised..]
            .iter()
            .any(|issue| issue.severity.is_blocking()))
    }

    fn issues(&self) -> &[Issue] {
        &self.issues
    }

    fn take_issues(&mut self) -> Vec<Issue> {
        std::mem::take(&mut self.issues)
    }
}

impl std::fmt::Debug for CodingValidator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodingValidator")
            .field("store", &self.store)
            .field("issues", &self.issues)
            .finish_non_exhaustive()
    }
}
