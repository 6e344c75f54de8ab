#![allow(dead_code)]

use octofhir_fhirguard::*;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const CORE: &str = "hl7.fhir.r4.core@4.0.1";
pub const TERMINOLOGY: &str = "hl7.terminology.r4@5.0.0";

pub fn codesystem(id: &str, url: &str, name: &str, concepts: &[(&str, &str)]) -> CodeSystem {
    CodeSystem {
        id: Some(id.into()),
        url: url.into(),
        name: name.into(),
        concept: concepts
            .iter()
            .map(|(code, display)| ConceptDefinition::new(*code).with_display(*display))
            .collect(),
        ..Default::default()
    }
}

pub fn valueset(id: &str, name: &str, includes: Vec<ValueSetInclude>) -> ValueSet {
    ValueSet {
        id: Some(id.into()),
        url: format!("http://hl7.org/fhir/ValueSet/{id}"),
        name: name.into(),
        compose: Some(ValueSetCompose {
            include: includes,
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// The FHIR core package: Patient bindings plus the FHIR-owned code systems.
pub fn core_package() -> PackageResources {
    PackageResources::new(CORE)
        .with_codesystem(codesystem(
            "administrative-gender",
            "http://hl7.org/fhir/administrative-gender",
            "AdministrativeGender",
            &[
                ("male", "Male"),
                ("female", "Female"),
                ("other", "Other"),
                ("unknown", "Unknown"),
            ],
        ))
        .with_codesystem(codesystem(
            "link-type",
            "http://hl7.org/fhir/link-type",
            "LinkType",
            &[
                ("replaced-by", "Replaced-by"),
                ("replaces", "Replaces"),
                ("refer", "Refer"),
                ("seealso", "See also"),
            ],
        ))
        .with_valueset(valueset(
            "administrative-gender",
            "AdministrativeGender",
            vec![ValueSetInclude::system("http://hl7.org/fhir/administrative-gender")],
        ))
        .with_valueset(valueset(
            "link-type",
            "LinkType",
            vec![ValueSetInclude::system("http://hl7.org/fhir/link-type")],
        ))
        .with_valueset(valueset(
            "marital-status",
            "MaritalStatus",
            vec![
                ValueSetInclude::system("http://terminology.hl7.org/CodeSystem/v3-MaritalStatus"),
                ValueSetInclude::system("http://terminology.hl7.org/CodeSystem/v3-NullFlavor")
                    .with_concept("UNK", Some("unknown")),
            ],
        ))
        .with_valueset(valueset(
            "patient-contactrelationship",
            "PatientContactRelationship",
            vec![ValueSetInclude::system(
                "http://terminology.hl7.org/CodeSystem/v2-0131",
            )],
        ))
        .with_valueset(valueset(
            "all-languages",
            "AllLanguages",
            vec![ValueSetInclude::system("urn:ietf:bcp:47")],
        ))
}

/// A terminology package the core package only refers to.
pub fn terminology_package() -> PackageResources {
    PackageResources::new(TERMINOLOGY)
        .with_codesystem(codesystem(
            "v3-MaritalStatus",
            "http://terminology.hl7.org/CodeSystem/v3-MaritalStatus",
            "MaritalStatus",
            &[
                ("A", "Annulled"),
                ("D", "Divorced"),
                ("I", "Interlocutory"),
                ("L", "Legally Separated"),
                ("M", "Married"),
                ("P", "Polygamous"),
                ("S", "Never Married"),
                ("T", "Domestic partner"),
                ("U", "unmarried"),
                ("W", "Widowed"),
            ],
        ))
        .with_codesystem(codesystem(
            "v3-NullFlavor",
            "http://terminology.hl7.org/CodeSystem/v3-NullFlavor",
            "NullFlavor",
            &[("NI", "NoInformation"), ("UNK", "unknown"), ("ASKU", "asked but unknown")],
        ))
        .with_codesystem(codesystem(
            "v2-0131",
            "http://terminology.hl7.org/CodeSystem/v2-0131",
            "ContactRole2",
            &[
                ("C", "Emergency Contact"),
                ("E", "Employer"),
                ("F", "Federal Agency"),
                ("I", "Insurance Company"),
                ("N", "Next-of-Kin"),
                ("S", "State Agency"),
                ("U", "Unknown"),
            ],
        ))
}

pub fn resources() -> AvailableResources {
    AvailableResources::new()
        .with_package(core_package())
        .with_package(terminology_package())
}

pub fn generate(resources: &AvailableResources, targets: &[&str], references: &[&str]) -> DefinitionSet {
    let targets: Vec<String> = targets.iter().map(|s| s.to_string()).collect();
    let references: Vec<String> = references.iter().map(|s| s.to_string()).collect();
    DefinitionFactory::new(resources, &targets, &references)
        .generate()
        .unwrap()
}

/// Compiled core definitions on disk, with a guard opened over them.
pub struct Fixture {
    pub dir: TempDir,
    pub guard: FhirGuard,
}

pub fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    generate(&resources(), &[CORE], &[TERMINOLOGY])
        .write(dir.path())
        .unwrap();
    let guard = FhirGuard::open(&[dir.path()], &StoreConfig::default()).unwrap();
    Fixture { dir, guard }
}

/// Write an extracted package directory the way the package registry lays it out.
pub fn write_package(root: &Path, name: &str, version: &str, resources: &[Value]) {
    let package_dir = root.join("package");
    fs::create_dir_all(&package_dir).unwrap();
    fs::write(
        package_dir.join("package.json"),
        json!({"name": name, "version": version}).to_string(),
    )
    .unwrap();
    for resource in resources {
        let file_name = format!(
            "{}-{}.json",
            resource["resourceType"].as_str().unwrap(),
            resource["id"].as_str().unwrap()
        );
        fs::write(package_dir.join(file_name), resource.to_string()).unwrap();
    }
}

pub fn validate_patient<'g, 'r>(
    guard: &'g FhirGuard,
    patient: &'r Value,
) -> Result<ValidatorStrategy<'g, 'r>> {
    guard
        .validator(patient)
        .code("gender", Binding::valueset("AdministrativeGender"))?
        .coding("maritalStatus", Binding::valueset("marital-status"))?
        .code("contact.gender", Binding::valueset("AdministrativeGender"))?
        .coding(
            "contact.relationship",
            Binding::valueset("PatientContactRelationship"),
        )?
        .codeable_concept("communication.language", Binding::valueset("AllLanguages"))?
        .code("link.type", Binding::valueset("LinkType"))
}

pub fn happy_patient() -> Value {
    json!({
        "resourceType": "Patient",
        "id": "123",
        "active": true,
        "name": [{"family": "Simpson", "given": ["Homer"]}],
        "gender": "male",
        "maritalStatus": {
            "system": "http://hl7.org/fhir/ValueSet/marital-status",
            "code": "M",
            "display": "Married"
        },
        "contact": {
            "name": {"family": "Simpson", "given": ["Marge"]},
            "gender": "female",
            "relationship": {
                "system": "http://hl7.org/fhir/ValueSet/patient-contactrelationship",
                "code": "N",
                "display": "Next-of-Kin"
            }
        },
        "communication": {
            "language": {
                "coding": [{
                    "system": "http://hl7.org/fhir/ValueSet/all-languages",
                    "code": "en",
                    "display": "English"
                }],
                "text": "English"
            }
        },
        "link": [{"other": {"reference": "Patient/1234"}, "type": "seealso"}]
    })
}

pub fn failing_patient() -> Value {
    json!({
        "resourceType": "Patient",
        "id": "123",
        "active": true,
        "name": [{"family": "Simpson", "given": ["Homer"]}],
        "gender": "goose",
        "maritalStatus": {
            "system": "http://hl7.org/fhir/ValueSet/marriage-status",
            "code": "Married",
            "display": "Married"
        },
        "contact": {
            "name": {"family": "Simpson", "given": ["Marge"]},
            "gender": "attackhelicopter",
            "relationship": {
                "system": "http://hl7.org/fhir/ValueSet/patient-relationship",
                "code": "N",
                "display": "Partner"
            }
        },
        "communication": {
            "language": {
                "coding": [{
                    "system": "http://hl7.org/fhir/ValueSet/languages",
                    "code": "eng",
                    "display": "English"
                }],
                "text": "English"
            }
        },
        "link": [
            {"other": {"reference": "Patient/1234"}, "type": "seealsothisone"},
            {"other": {"reference": "Patient/1234"}, "type": "thisonetoo"}
        ]
    })
}
