use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FhirGuardError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("{kind} not found: {reference}")]
    NotFound { kind: String, reference: String },

    #[error("Consistency defect: {message}")]
    ConsistencyDefect { message: String },

    #[error("Structural error in '{resource}': {message}")]
    Structural { resource: String, message: String },

    /// An expansion that declares `total: 0`. Processing of the resource stops,
    /// but this is not a failure.
    #[error("ValueSet '{resource}' has an empty expansion")]
    EmptyExpansion { resource: String },

    #[error("Invalid manifest {path}: {message}")]
    InvalidManifest { path: PathBuf, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FhirGuardError>;

impl FhirGuardError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn not_found<K: Into<String>, R: Into<String>>(kind: K, reference: R) -> Self {
        Self::NotFound {
            kind: kind.into(),
            reference: reference.into(),
        }
    }

    pub fn consistency_defect<S: Into<String>>(message: S) -> Self {
        Self::ConsistencyDefect {
            message: message.into(),
        }
    }

    pub fn structural<R: Into<String>, S: Into<String>>(resource: R, message: S) -> Self {
        Self::Structural {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn empty_expansion<S: Into<String>>(resource: S) -> Self {
        Self::EmptyExpansion {
            resource: resource.into(),
        }
    }

    pub fn invalid_manifest<S: Into<String>>(path: impl Into<PathBuf>, message: S) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error ends processing of a resource without being a failure.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::EmptyExpansion { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FhirGuardError::not_found("ValueSet", "AdministrativeGender");
        assert_eq!(err.to_string(), "ValueSet not found: AdministrativeGender");

        let err = FhirGuardError::configuration("Cannot specify both valueset and codesystem");
        assert_eq!(
            err.to_string(),
            "Configuration error: Cannot specify both valueset and codesystem"
        );
    }

    #[test]
    fn test_terminal_errors() {
        assert!(FhirGuardError::empty_expansion("languages").is_terminal());
        assert!(!FhirGuardError::structural("vs", "no compose").is_terminal());
    }
}
