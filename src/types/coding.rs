use serde::{Deserialize, Serialize};

/// A FHIR `Coding` value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_selected: Option<bool>,
}

impl Coding {
    pub fn new(
        system: Option<&str>,
        code: impl Into<String>,
        display: Option<&str>,
    ) -> Self {
        Self {
            system: system.map(str::to_string),
            code: Some(code.into()),
            display: display.map(str::to_string),
            ..Default::default()
        }
    }

    /// Empty strings count as absent, as they do in FHIR JSON.
    pub fn system(&self) -> Option<&str> {
        self.system.as_deref().filter(|s| !s.is_empty())
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref().filter(|s| !s.is_empty())
    }

    pub fn display(&self) -> Option<&str> {
        self.display.as_deref().filter(|s| !s.is_empty())
    }
}

/// A FHIR `CodeableConcept` value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coding_accessors_treat_empty_as_absent() {
        let coding: Coding = serde_json::from_value(json!({
            "system": "",
            "code": "M",
            "display": "Married"
        }))
        .unwrap();

        assert_eq!(coding.system(), None);
        assert_eq!(coding.code(), Some("M"));
        assert_eq!(coding.display(), Some("Married"));
    }

    #[test]
    fn test_codeable_concept_defaults() {
        let concept: CodeableConcept = serde_json::from_value(json!({"text": "English"})).unwrap();
        assert!(concept.coding.is_empty());
        assert_eq!(concept.text.as_deref(), Some("English"));
    }
}
