use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

use super::{CodeSystemDefinition, ValueSetDefinition};
use crate::error::Result;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const VALUESETS_DIR: &str = "valuesets";
pub const CODESYSTEMS_DIR: &str = "codesystems";

/// Name and id lookups to content hashes for one resource kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIndex {
    #[serde(default)]
    pub name: BTreeMap<String, String>,
    #[serde(default)]
    pub id: BTreeMap<String, String>,
}

impl ManifestIndex {
    fn insert(&mut self, name: &str, id: &str, hash: &str) {
        self.name.insert(name.to_string(), hash.to_string());
        self.id.insert(id.to_string(), hash.to_string());
    }

    /// Look up by id first, then by name.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.id
            .get(key)
            .or_else(|| self.name.get(key))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub valuesets: ManifestIndex,
    #[serde(default)]
    pub codesystems: ManifestIndex,
}

/// Everything one generation run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefinitionSet {
    pub valuesets: Vec<ValueSetDefinition>,
    pub codesystems: Vec<CodeSystemDefinition>,
}

impl DefinitionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manifest(&self) -> Manifest {
        let mut manifest = Manifest::default();
        for vs in &self.valuesets {
            manifest
                .valuesets
                .insert(&vs.name, &vs.resource_id, &vs.content_hash);
        }
        for cs in &self.codesystems {
            manifest
                .codesystems
                .insert(&cs.name, &cs.resource_id, &cs.content_hash);
        }
        manifest
    }

    /// Replace `output` with the definitions and their manifest.
    ///
    /// Any existing directory at `output` is removed first; runs never merge.
    pub fn write(&self, output: impl AsRef<Path>) -> Result<Manifest> {
        let output = output.as_ref();
        if output.exists() {
            fs::remove_dir_all(output)?;
        }

        let valueset_dir = output.join(VALUESETS_DIR);
        let codesystem_dir = output.join(CODESYSTEMS_DIR);
        fs::create_dir_all(&valueset_dir)?;
        fs::create_dir_all(&codesystem_dir)?;

        for vs in &self.valuesets {
            let path = valueset_dir.join(format!("{}.json", vs.content_hash));
            fs::write(path, serde_json::to_string_pretty(vs)?)?;
        }
        for cs in &self.codesystems {
            let path = codesystem_dir.join(format!("{}.json", cs.content_hash));
            fs::write(path, serde_json::to_string_pretty(cs)?)?;
        }

        let manifest = self.manifest();
        fs::write(
            output.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;

        info!(
            "Wrote {} ValueSet and {} CodeSystem definitions to {}",
            self.valuesets.len(),
            self.codesystems.len(),
            output.display()
        );
        Ok(manifest)
    }
}
