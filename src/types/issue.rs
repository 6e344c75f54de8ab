use serde::{Deserialize, Serialize};
use std::fmt;

/// Issue code used for every terminology binding problem.
pub const CODE_INVALID: &str = "code-invalid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

impl IssueSeverity {
    /// Fatal and error issues make a record invalid.
    pub fn is_blocking(self) -> bool {
        matches!(self, IssueSeverity::Fatal | IssueSeverity::Error)
    }
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueSeverity::Fatal => "fatal",
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
            IssueSeverity::Information => "information",
        };
        f.write_str(s)
    }
}

/// A single validation finding, shaped like `OperationOutcome.issue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: IssueSeverity,
    pub code: String,
    pub diagnostics: String,
    #[serde(default)]
    pub location: Vec<String>,
}

impl Issue {
    pub fn new(
        severity: IssueSeverity,
        code: impl Into<String>,
        diagnostics: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            diagnostics: diagnostics.into(),
            location: vec![location.into()],
        }
    }

    pub fn error(diagnostics: impl Into<String>, location: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Error, CODE_INVALID, diagnostics, location)
    }

    pub fn warning(diagnostics: impl Into<String>, location: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Warning, CODE_INVALID, diagnostics, location)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.diagnostics)?;
        if !self.location.is_empty() {
            write!(f, " at {}", self.location.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_issue_serialization_shape() {
        let issue = Issue::error("Code 'goose' not found in valueset 'AdministrativeGender'", "gender");

        assert_eq!(
            serde_json::to_value(&issue).unwrap(),
            json!({
                "severity": "error",
                "code": "code-invalid",
                "diagnostics": "Code 'goose' not found in valueset 'AdministrativeGender'",
                "location": ["gender"]
            })
        );
    }

    #[test]
    fn test_blocking_severities() {
        assert!(IssueSeverity::Fatal.is_blocking());
        assert!(IssueSeverity::Error.is_blocking());
        assert!(!IssueSeverity::Warning.is_blocking());
        assert!(!IssueSeverity::Information.is_blocking());
    }
}
