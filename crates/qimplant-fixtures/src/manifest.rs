//! `qparam.json`: the manifest mapping tensor names to their array files.
//!
//! ```json
//! {
//!   "ifm": { "dtype": "uint8", "scale": "1.npy", "zerop": "2.npy",
//!            "quantized_dimension": 0, "value": "0.npy" }
//! }
//! ```
//!
//! Array paths are relative to the directory holding the manifest.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dtype::QuantDType;
use crate::error::{FixtureError, Result};

/// File name of a case manifest.
pub const MANIFEST_FILE_NAME: &str = "qparam.json";

/// Numeric field tracked per tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManifestField {
    Value,
    Scale,
    ZeroPoint,
}

impl ManifestField {
    /// Check order used everywhere a node's fields are walked.
    pub const ALL: [ManifestField; 3] = [Self::Value, Self::Scale, Self::ZeroPoint];

    /// Key in `qparam.json`.
    #[must_use]
    pub const fn manifest_key(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Scale => "scale",
            Self::ZeroPoint => "zerop",
        }
    }
}

impl fmt::Display for ManifestField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manifest_key())
    }
}

/// One tensor's entry. Every field is optional so partial manifests load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<QuantDType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zerop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantized_dimension: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ManifestEntry {
    /// Relative array path declared for `field`.
    #[must_use]
    pub fn path(&self, field: ManifestField) -> Option<&str> {
        match field {
            ManifestField::Value => self.value.as_deref(),
            ManifestField::Scale => self.scale.as_deref(),
            ManifestField::ZeroPoint => self.zerop.as_deref(),
        }
    }

    /// Declared fields with their paths, in [`ManifestField::ALL`] order.
    pub fn fields(&self) -> impl Iterator<Item = (ManifestField, &str)> {
        ManifestField::ALL.into_iter().filter_map(|f| self.path(f).map(|p| (f, p)))
    }
}

/// Whole manifest, keyed by tensor (node) name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: ManifestEntry) {
        self.entries.insert(name.into(), entry);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Load and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|source| FixtureError::Read { path: path.to_path_buf(), source })?;
        Self::from_json(&text).map_err(|e| FixtureError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Write via a temporary sibling and rename, so `path` only ever holds
    /// a complete manifest.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(|e| FixtureError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, text).map_err(|e| FixtureError::write(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| FixtureError::write(path, e))?;
        Ok(())
    }
}

/// Resolve a manifest-relative array path against `base`.
#[must_use]
pub fn resolve(base: &Path, relative: &str) -> PathBuf {
    base.join(relative)
}
