use lru::LruCache;
use serde::de::DeserializeOwned;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use crate::config::StoreConfig;
use crate::definition::{
    CODESYSTEMS_DIR, CodeSystemDefinition, MANIFEST_FILE, Manifest, ManifestIndex, VALUESETS_DIR,
    ValueSetDefinition,
};
use crate::error::{FhirGuardError, Result};
use crate::utils::is_content_hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    ValueSet,
    CodeSystem,
}

impl Kind {
    fn dir(self) -> &'static str {
        match self {
            Kind::ValueSet => VALUESETS_DIR,
            Kind::CodeSystem => CODESYSTEMS_DIR,
        }
    }

    fn index(self, manifest: &Manifest) -> &ManifestIndex {
        match self {
            Kind::ValueSet => &manifest.valuesets,
            Kind::CodeSystem => &manifest.codesystems,
        }
    }
}

fn new_cache<V>(capacity: usize) -> Mutex<LruCache<PathBuf, Arc<V>>> {
    let cache = match NonZeroUsize::new(capacity) {
        Some(capacity) => LruCache::new(capacity),
        None => LruCache::unbounded(),
    };
    Mutex::new(cache)
}

/// Read-only access to compiled definitions written by [`DefinitionSet::write`].
///
/// Manifests are loaded when the store is opened. Definition files are read on
/// first lookup and kept in an LRU cache keyed by file path.
///
/// [`DefinitionSet::write`]: crate::definition::DefinitionSet::write
pub struct MetadataStore {
    manifests: Vec<(PathBuf, Manifest)>,
    valuesets: Mutex<LruCache<PathBuf, Arc<ValueSetDefinition>>>,
    codesystems: Mutex<LruCache<PathBuf, Arc<CodeSystemDefinition>>>,
}

impl MetadataStore {
    pub fn open<P: AsRef<Path>>(paths: &[P], config: &StoreConfig) -> Result<Self> {
        let mut manifests = Vec::with_capacity(paths.len());
        for root in paths {
            let root = root.as_ref().to_path_buf();
            let manifest = Self::load_manifest(&root)?;
            manifests.push((root, manifest));
        }

        Ok(Self {
            manifests,
            valuesets: new_cache(config.cache_capacity),
            codesystems: new_cache(config.cache_capacity),
        })
    }

    fn load_manifest(root: &Path) -> Result<Manifest> {
        let path = root.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(FhirGuardError::not_found(
                "Manifest",
                path.display().to_string(),
            ));
        }

        let manifest: Manifest = serde_json::from_str(&fs::read_to_string(&path)?)
            .map_err(|e| FhirGuardError::invalid_manifest(&path, e.to_string()))?;

        let indexes = [&manifest.valuesets, &manifest.codesystems];
        let hashes = indexes
            .iter()
            .flat_map(|index| index.name.values().chain(index.id.values()));
        for hash in hashes {
            if !is_content_hash(hash) {
                return Err(FhirGuardError::invalid_manifest(
                    &path,
                    format!("'{hash}' is not a content hash"),
                ));
            }
        }

        debug!(
            "Loaded manifest {} ({} ValueSets, {} CodeSystems)",
            path.display(),
            manifest.valuesets.id.len(),
            manifest.codesystems.id.len()
        );
        Ok(manifest)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Path> {
        self.manifests.iter().map(|(root, _)| root.as_path())
    }

    /// Find a ValueSet definition by id, name or canonical URL.
    pub fn get_valueset(&self, key: &str) -> Result<Option<Arc<ValueSetDefinition>>> {
        self.get(key, Kind::ValueSet, &self.valuesets)
    }

    /// Find a CodeSystem definition by id, name or canonical URL.
    pub fn get_codesystem(&self, key: &str) -> Result<Option<Arc<CodeSystemDefinition>>> {
        self.get(key, Kind::CodeSystem, &self.codesystems)
    }

    fn get<V: DeserializeOwned>(
        &self,
        key: &str,
        kind: Kind,
        cache: &Mutex<LruCache<PathBuf, Arc<V>>>,
    ) -> Result<Option<Arc<V>>> {
        let Some(path) = self.resource_path(key, kind) else {
            return Ok(None);
        };

        let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(definition) = cache.get(&path) {
            return Ok(Some(Arc::clone(definition)));
        }

        let definition: Arc<V> = Arc::new(serde_json::from_str(&fs::read_to_string(&path)?)?);
        cache.put(path, Arc::clone(&definition));
        Ok(Some(definition))
    }

    /// Id then name across roots in order. Keys that look like URLs are retried
    /// with their last path segment.
    fn resource_path(&self, key: &str, kind: Kind) -> Option<PathBuf> {
        let found = self.manifests.iter().find_map(|(root, manifest)| {
            kind.index(manifest)
                .lookup(key)
                .map(|hash| root.join(kind.dir()).join(format!("{hash}.json")))
        });
        if found.is_some() {
            return found;
        }

        if key.contains("http") {
            let segment = key.rsplit('/').next().unwrap_or(key);
            if segment != key {
                return self.resource_path(segment, kind);
            }
        }
        None
    }
}

impl std::fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataStore")
            .field("roots", &self.roots().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{AllowedValue, DefinitionSet, ValueType};
    use tempfile::TempDir;

    fn definitions() -> DefinitionSet {
        let gender = ValueSetDefinition {
            name: "AdministrativeGender".into(),
            resource_id: "administrative-gender".into(),
            resource_url: "http://hl7.org/fhir/ValueSet/administrative-gender".into(),
            description: None,
            compose: None,
            related_codesystems: vec![],
            allowed_values: vec![AllowedValue::new("male", ValueType::Concept)],
            content_hash: String::new(),
        }
        .seal()
        .unwrap();

        DefinitionSet {
            valuesets: vec![gender],
            codesystems: vec![],
        }
    }

    fn store(capacity: usize) -> (TempDir, MetadataStore) {
        let temp = TempDir::new().unwrap();
        definitions().write(temp.path()).unwrap();
        let store = MetadataStore::open(&[temp.path()], &StoreConfig { cache_capacity: capacity })
            .unwrap();
        (temp, store)
    }

    #[test]
    fn test_lookup_by_id_name_and_url() {
        let (_temp, store) = store(4);

        let by_id = store.get_valueset("administrative-gender").unwrap().unwrap();
        let by_name = store.get_valueset("AdministrativeGender").unwrap().unwrap();
        let by_url = store
            .get_valueset("http://hl7.org/fhir/ValueSet/administrative-gender")
            .unwrap()
            .unwrap();

        assert!(Arc::ptr_eq(&by_id, &by_name));
        assert!(Arc::ptr_eq(&by_id, &by_url));
        assert!(store.get_valueset("marital-status").unwrap().is_none());
        assert!(store.get_codesystem("administrative-gender").unwrap().is_none());
    }

    #[test]
    fn test_unbounded_cache() {
        let (_temp, store) = store(0);
        assert!(store.get_valueset("AdministrativeGender").unwrap().is_some());
    }

    #[test]
    fn test_missing_manifest() {
        let temp = TempDir::new().unwrap();
        let err = MetadataStore::open(&[temp.path()], &StoreConfig::default()).unwrap_err();
        assert!(matches!(err, FhirGuardError::NotFound { .. }));
    }

    #[test]
    fn test_manifest_with_bad_hash_is_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(MANIFEST_FILE),
            r#"{"valuesets": {"name": {"Evil": "../../secrets"}, "id": {}}, "codesystems": {"name": {}, "id": {}}}"#,
        )
        .unwrap();

        let err = MetadataStore::open(&[temp.path()], &StoreConfig::default()).unwrap_err();
        assert!(matches!(err, FhirGuardError::InvalidManifest { .. }));
    }
}
