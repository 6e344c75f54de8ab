use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GuardConfig {
    /// Directory holding extracted packages, one sub-directory per package.
    pub package_dir: PathBuf,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of definitions kept in memory. `0` means unbounded.
    pub cache_capacity: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            package_dir: base.join(".fhirguard").join("packages"),
            store: StoreConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 256,
        }
    }
}

impl GuardConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn with_package_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.package_dir = dir.into();
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.store.cache_capacity = capacity;
        self
    }

    pub fn package_path(&self, name: &str) -> PathBuf {
        self.package_dir.join(name)
    }
}
