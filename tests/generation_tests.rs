mod common;

use common::*;
use octofhir_fhirguard::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;

fn resource_values(package: &PackageResources) -> Vec<Value> {
    let codesystems = package
        .code_systems
        .values()
        .map(|cs| serde_json::to_value(TerminologyResource::CodeSystem(cs.clone())).unwrap());
    let valuesets = package
        .value_sets
        .values()
        .map(|vs| serde_json::to_value(TerminologyResource::ValueSet(vs.clone())).unwrap());
    codesystems.chain(valuesets).collect()
}

/// Extracted core and terminology packages under one package directory.
fn package_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_package(
        &dir.path().join("hl7.fhir.r4.core"),
        "hl7.fhir.r4.core",
        "4.0.1",
        &resource_values(&core_package()),
    );
    write_package(
        &dir.path().join("hl7.terminology.r4"),
        "hl7.terminology.r4",
        "5.0.0",
        &resource_values(&terminology_package()),
    );
    fs::write(
        dir.path()
            .join("hl7.fhir.r4.core")
            .join("package")
            .join("ValueSet-broken.json"),
        "{not json",
    )
    .unwrap();
    dir
}

#[test]
fn test_generate_from_disk_and_validate() {
    let packages = package_dir();
    let output = TempDir::new().unwrap();

    let config = GuardConfig::default().with_package_dir(packages.path());
    let resources = PackageLoader::new(config)
        .load_all(&["hl7.fhir.r4.core", "hl7.terminology.r4"])
        .unwrap();
    assert_eq!(
        resources.package_ids().collect::<Vec<_>>(),
        vec![CORE, TERMINOLOGY]
    );

    let manifest = generate(&resources, &[CORE], &[TERMINOLOGY])
        .write(output.path())
        .unwrap();

    let mut valuesets: Vec<_> = manifest.valuesets.id.keys().cloned().collect();
    valuesets.sort();
    assert_eq!(
        valuesets,
        vec![
            "administrative-gender",
            "all-languages",
            "link-type",
            "marital-status",
            "patient-contactrelationship",
        ]
    );
    let codesystems: Vec<_> = manifest.codesystems.name.keys().cloned().collect();
    assert_eq!(codesystems, vec!["AdministrativeGender", "LinkType"]);

    let guard = FhirGuard::open(&[output.path()], &StoreConfig::default()).unwrap();
    let patient = happy_patient();
    let result = validate_patient(&guard, &patient).unwrap();
    assert!(result.is_valid(), "{:?}", result.issues());
}

#[test]
fn test_compiled_definitions_record_related_codesystems() {
    let definitions = generate(&resources(), &[CORE], &[TERMINOLOGY]);

    let marital = definitions
        .valuesets
        .iter()
        .find(|vs| vs.resource_id == "marital-status")
        .unwrap();
    let related: Vec<_> = marital
        .related_codesystems
        .iter()
        .map(|cs| cs.id.as_str())
        .collect();
    assert_eq!(related, vec!["v3-MaritalStatus", "v3-NullFlavor"]);

    let codes: Vec<_> = marital
        .allowed_values
        .iter()
        .map(|v| v.code.as_str())
        .collect();
    assert_eq!(
        codes,
        vec!["A", "D", "I", "L", "M", "P", "S", "T", "U", "W", "UNK"]
    );

    let languages = definitions
        .valuesets
        .iter()
        .find(|vs| vs.name == "AllLanguages")
        .unwrap();
    assert_eq!(languages.allowed_values.len(), 1);
    assert!(languages.allowed_values[0].has_type(ValueType::Include));
    assert_eq!(languages.allowed_values[0].code, "urn:ietf:bcp:47");
}

#[test]
fn test_generation_is_deterministic() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();

    let a = generate(&resources(), &[CORE], &[TERMINOLOGY])
        .write(first.path())
        .unwrap();
    let b = generate(&resources(), &[CORE], &[TERMINOLOGY])
        .write(second.path())
        .unwrap();

    assert_eq!(a, b);
    for hash in a.valuesets.id.values() {
        let file = format!("valuesets/{hash}.json");
        assert_eq!(
            fs::read_to_string(first.path().join(&file)).unwrap(),
            fs::read_to_string(second.path().join(&file)).unwrap()
        );
    }
}

#[test]
fn test_own_package_wins_over_references() {
    let local_marital = codesystem(
        "v3-MaritalStatus",
        "http://terminology.hl7.org/CodeSystem/v3-MaritalStatus",
        "MaritalStatus",
        &[("M", "Married"), ("S", "Single")],
    );
    let resources = AvailableResources::new()
        .with_package(core_package().with_codesystem(local_marital))
        .with_package(terminology_package());

    let definitions = generate(&resources, &[CORE], &[TERMINOLOGY]);
    let marital = definitions
        .valuesets
        .iter()
        .find(|vs| vs.resource_id == "marital-status")
        .unwrap();
    let codes: Vec<_> = marital
        .allowed_values
        .iter()
        .map(|v| v.code.as_str())
        .collect();
    assert_eq!(codes, vec!["M", "S", "UNK"]);
}

#[test]
fn test_supplement_is_compiled_with_base_concepts() {
    let mut supplement = codesystem(
        "link-type-supplement",
        "http://example.org/CodeSystem/link-type-supplement",
        "LinkTypeSupplement",
        &[("archived", "Archived")],
    );
    supplement.supplements = Some("http://hl7.org/fhir/link-type".into());
    let resources = AvailableResources::new()
        .with_package(PackageResources::new("local@1").with_codesystem(supplement))
        .with_package(core_package());

    let definitions = generate(&resources, &["local@1"], &[CORE]);
    assert_eq!(definitions.codesystems.len(), 1);

    let compiled = &definitions.codesystems[0];
    assert_eq!(compiled.related_codesystems[0].id, "link-type");
    let codes: Vec<_> = compiled
        .allowed_values
        .iter()
        .map(|v| v.code.as_str())
        .collect();
    assert_eq!(
        codes,
        vec!["replaced-by", "replaces", "refer", "seealso", "archived"]
    );
    assert!(compiled
        .allowed_values
        .iter()
        .all(|v| v.system.as_deref() == Some("http://hl7.org/fhir/link-type")));
}

#[test]
fn test_first_store_root_wins() {
    let local = TempDir::new().unwrap();
    let core = TempDir::new().unwrap();

    let restricted = valueset(
        "link-type",
        "LinkType",
        vec![ValueSetInclude::system("http://hl7.org/fhir/link-type").with_concept("refer", None)],
    );
    let local_resources = AvailableResources::new()
        .with_package(PackageResources::new("local@1").with_valueset(restricted))
        .with_package(core_package());
    generate(&local_resources, &["local@1"], &[CORE])
        .write(local.path())
        .unwrap();
    generate(&resources(), &[CORE], &[TERMINOLOGY])
        .write(core.path())
        .unwrap();

    let guard = FhirGuard::open(&[local.path(), core.path()], &StoreConfig::default()).unwrap();
    let patient = json!({"gender": "female", "link": [{"type": "refer"}, {"type": "seealso"}]});
    let result = guard
        .validator(&patient)
        .code("link.type", Binding::valueset("LinkType"))
        .unwrap()
        .code("gender", Binding::valueset("AdministrativeGender"))
        .unwrap();

    assert_eq!(
        result.into_issues(),
        vec![Issue::error(
            "Code 'seealso' not found in valueset 'LinkType'",
            "link.type[1]",
        )]
    );
}

#[test]
fn test_resolve_and_compile_single_resource() {
    let resources = resources();
    let targets = vec![CORE.to_string()];
    let references = vec![TERMINOLOGY.to_string()];
    let package = resources.package(CORE).unwrap();

    let mut resolver =
        RelationshipResolver::new(PackageSearch::new(&resources, CORE, &targets, &references));
    let relationship = resolver
        .resolve(ResourceRef::ValueSet(&package.value_sets["PatientContactRelationship"]))
        .unwrap();
    let definition = DefinitionCompiler::new().compile(&relationship).unwrap();

    assert_eq!(definition.name(), "PatientContactRelationship");
    let Definition::ValueSet(compiled) = &definition else {
        panic!("expected a ValueSet definition");
    };
    assert_eq!(definition.content_hash(), compiled.content_hash);
    assert_eq!(compiled.related_codesystems[0].id, "v2-0131");
    let next_of_kin = compiled
        .allowed_values
        .iter()
        .find(|v| v.code == "N")
        .unwrap();
    assert_eq!(next_of_kin.display.as_deref(), Some("Next-of-Kin"));
    assert_eq!(
        next_of_kin.system.as_deref(),
        Some("http://terminology.hl7.org/CodeSystem/v2-0131")
    );

    let codesystem = resolver
        .resolve(ResourceRef::CodeSystem(&package.code_systems["LinkType"]))
        .unwrap();
    let Definition::CodeSystem(link_type) = DefinitionCompiler::new().compile(&codesystem).unwrap()
    else {
        panic!("expected a CodeSystem definition");
    };
    assert_eq!(link_type.allowed_values.len(), 4);
    assert_eq!(link_type.resource_url, "http://hl7.org/fhir/link-type");
}
