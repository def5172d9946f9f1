//! Cache record data structure.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::freshness::compute_file_hash;

/// Bump when the record layout changes; stale stores are dropped on start-up.
pub const CACHE_VERSION: u32 = 2;

/// Fingerprint stored for a path that was missing at capture time.
const MISSING: &str = "";

/// Fingerprints of an entity's cached paths, plus what its build left
/// behind.
///
/// ```json
/// {
///   "files": { "<path>": "<blake3 hex>" },
///   "outputs": ["guide/intro/index.html"],
///   "keywords": ["Button"]
/// }
/// ```
///
/// `outputs` and `keywords` let a cache hit in a fresh process remove the
/// entity's files on delete and rebuild it when a keyword it links to moves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    files: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    outputs: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    keywords: Vec<String>,
}

impl CacheRecord {
    /// Fingerprint every path as it is on disk right now.
    pub fn capture(paths: &[PathBuf]) -> Self {
        let files = paths
            .iter()
            .map(|path| {
                let fingerprint =
                    compute_file_hash(path).map_or_else(|| MISSING.to_string(), |h| h.to_hex());
                (key(path), fingerprint)
            })
            .collect();
        Self {
            files,
            ..Self::default()
        }
    }

    /// Attach the output paths and used keywords of a finished build.
    pub fn with_build(mut self, outputs: Vec<PathBuf>, keywords: Vec<String>) -> Self {
        self.outputs = outputs;
        self.keywords = keywords;
        self
    }

    /// Output paths of the recorded build, relative to the output root.
    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    /// Keywords the recorded build linked to.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Recorded paths, in key order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(Path::new)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Same membership as `paths` and every live fingerprint unchanged.
    ///
    /// A missing file never matches, even if it was missing when recorded.
    pub fn matches(&self, paths: &[PathBuf]) -> bool {
        let mut current: Vec<String> = paths.iter().map(|p| key(p)).collect();
        current.sort();
        current.dedup();

        if current.len() != self.files.len() {
            return false;
        }

        current.iter().all(|path| match self.files.get(path) {
            Some(stored) if stored != MISSING => compute_file_hash(Path::new(path))
                .is_some_and(|live| live.to_hex() == *stored),
            _ => false,
        })
    }

    /// Whether any recorded path no longer exists.
    pub fn references_missing(&self) -> bool {
        self.paths().any(|path| !path.exists())
    }
}

#[inline]
fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
