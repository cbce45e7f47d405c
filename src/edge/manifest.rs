//! Build asset manifest expansion
//!
//! The build emits a manifest enumerating every hashed artifact. It is not
//! known at install time, so the worker fetches and expands it dynamically,
//! both at install and again after login.

use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;

/// The build tool's asset manifest: artifact paths plus entrypoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetManifest {
    #[serde(default)]
    pub files: HashMap<String, ManifestEntry>,
    #[serde(default)]
    pub entrypoints: Vec<String>,
}

/// A manifest leaf: a path, or one nested level of chunk-group files.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ManifestEntry {
    Path(String),
    Nested { files: HashMap<String, String> },
}

impl AssetManifest {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }

    /// Every cacheable URL in the manifest: direct file paths, nested chunk
    /// files, and entrypoints. Deduplicated; entrypoints are normalized to
    /// absolute paths.
    pub fn collect_urls(&self) -> Vec<String> {
        let mut urls = BTreeSet::new();

        for entry in self.files.values() {
            match entry {
                ManifestEntry::Path(path) => {
                    urls.insert(path.clone());
                }
                ManifestEntry::Nested { files } => {
                    for path in files.values() {
                        urls.insert(path.clone());
                    }
                }
            }
        }

        for entry in &self.entrypoints {
            urls.insert(normalize(entry));
        }

        urls.into_iter().collect()
    }
}

/// Entrypoints are emitted without a leading slash; cache them rooted.
fn normalize(path: &str) -> String {
    if path.starts_with('/') || path.contains("://") {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
