//! # OctoFHIR FHIRGuard
//!
//! Terminology binding validation for FHIR JSON records.
//!
//! The crate works in two phases:
//!
//! - **Generation**: load FHIR packages, resolve every CodeSystem and ValueSet
//!   across package boundaries and compile them into content-addressed
//!   definition files with a manifest.
//! - **Validation**: open one or more definition directories and check codes,
//!   codings and codeable concepts found at dotted paths of a record.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use octofhir_fhirguard::*;
//! use serde_json::json;
//!
//! # fn example() -> Result<()> {
//! let resources = PackageLoader::new(GuardConfig::default())
//!     .load_all(&["packages/hl7.fhir.r4.core"])?;
//! let targets: Vec<String> = resources.package_ids().map(str::to_string).collect();
//! DefinitionFactory::new(&resources, &targets, &[])
//!     .generate()?
//!     .write("definitions")?;
//!
//! let guard = FhirGuard::open(&["definitions"], &StoreConfig::default())?;
//! let patient = json!({"resourceType": "Patient", "gender": "male"});
//! let result = guard
//!     .validator(&patient)
//!     .code("gender", Binding::valueset("AdministrativeGender").required())?;
//! assert!(result.is_valid());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod definition;
pub mod error;
pub mod package;
pub mod path;
pub mod relationship;
pub mod storage;
pub mod types;
pub mod utils;
pub mod validation;

pub use config::{GuardConfig, StoreConfig};
pub use definition::{
    AllowedValue, CodeSystemDefinition, Definition, DefinitionCompiler, DefinitionFactory,
    DefinitionSet, Manifest, ValueSetDefinition, ValueType,
};
pub use error::{FhirGuardError, Result};
pub use package::{AvailableResources, PackageLoader, PackageResources, ResourceProvider};
pub use path::query_value;
pub use relationship::{PackageSearch, Relationship, RelationshipResolver, ResourceRef};
pub use storage::MetadataStore;
pub use types::*;
pub use validation::{
    Binding, CodeValidator, CodingValidator, FhirGuard, Iso639Languages, Language, LanguageLookup,
    OperationOutcome, Validator, ValidatorStrategy,
};
