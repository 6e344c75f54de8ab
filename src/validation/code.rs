use serde_json::Value;
use tracing::debug;

use super::{Target, Validator};
use crate::error::Result;
use crate::storage::MetadataStore;
use crate::types::Issue;

/// Validates bare `code` values.
#[derive(Debug)]
pub struct CodeValidator<'s> {
    store: &'s MetadataStore,
    issues: Vec<Issue>,
}

impl<'s> CodeValidator<'s> {
    pub fn new(store: &'s MetadataStore) -> Self {
        Self {
            store,
            issues: Vec::new(),
        }
    }

    fn is_missing(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}

impl Validator for CodeValidator<'_> {
    fn validate(
        &mut self,
        path: &str,
        value: &Value,
        valueset: Option<&str>,
        codesystem: Option<&str>,
    ) -> Result<bool> {
        let target = Target::resolve(self.store, valueset, codesystem)?;

        if Self::is_missing(value) {
            self.issues
                .push(Issue::error("Code is missing, null or empty", path));
            return Ok(false);
        }
        let Some(code) = value.as_str() else {
            self.issues
                .push(Issue::error("Code must be a valid string", path));
            return Ok(false);
        };

        if target.find_code(code)?.is_some() {
            return Ok(true);
        }

        debug!("Code '{}' rejected by {} '{}'", code, target.kind(), target.key);
        self.issues.push(Issue::error(
            format!(
                "Code '{}' not found in {} '{}'",
                code,
                target.kind(),
                target.key
            ),
            path,
        ));
        Ok(false)
    }

    fn issues(&self) -> &[Issue] {
        &self.issues
    }

    fn take_issues(&mut self) -> Vec<Issue> {
        std::mem::take(&mut self.issues)
    }
}
