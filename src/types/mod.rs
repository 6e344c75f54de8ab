pub mod coding;
pub mod issue;
pub mod resources;

pub use coding::{CodeableConcept, Coding};
pub use issue::{CODE_INVALID, Issue, IssueSeverity};
pub use resources::{
    CodeSystem, CodeSystemFilter, CodeSystemProperty, ConceptDefinition, ExpansionContains,
    ExpansionParameter, IncludeConcept, IncludeFilter, TerminologyResource, ValueSet,
    ValueSetCompose, ValueSetExpansion, ValueSetInclude,
};
