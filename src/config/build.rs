//! `[build]` section configuration.
//!
//! ```toml
//! [build]
//! roots = ["docs"]            # Entity trees (relative to project root)
//! output = "generated"        # Output directory
//! cache = ".docweave/cache"   # Cache root
//! debounce_ms = 50            # Batch debounce window
//! globals = true              # Emit site and search indexes
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigDiagnostics;
use crate::utils::path::normalize_path;

/// Accepted debounce window, in milliseconds.
const DEBOUNCE_RANGE: std::ops::RangeInclusive<u64> = 1..=10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub roots: Vec<PathBuf>,
    pub output: PathBuf,
    pub cache: PathBuf,
    pub debounce_ms: u64,
    pub globals: bool,

    /// Wipe output and cache before building (CLI only).
    #[serde(skip)]
    pub clean: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from("docs")],
            output: PathBuf::from("generated"),
            cache: PathBuf::from(crate::cache::CACHE_DIR),
            debounce_ms: 50,
            globals: true,
            clean: false,
        }
    }
}

impl BuildConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Make every path absolute against `root`.
    pub(super) fn normalize_paths(&mut self, root: &Path) {
        let resolve = |p: &Path| normalize_path(&root.join(p));
        self.roots = self.roots.iter().map(|p| resolve(p.as_path())).collect();
        self.output = resolve(self.output.as_path());
        self.cache = resolve(self.cache.as_path());
    }

    /// Check normalized paths and ranges.
    pub(super) fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.roots.is_empty() {
            diag.error("build.roots", "at least one root is required");
        }
        for root in &self.roots {
            if *root == self.output {
                diag.error_with_hint(
                    "build.output",
                    format!("output `{}` is also an entity root", self.output.display()),
                    "write artifacts to a separate directory",
                );
            }
        }
        if self.roots.iter().any(|root| self.cache.starts_with(root)) {
            diag.error("build.cache", "cache must not live inside an entity root");
        }
        if !DEBOUNCE_RANGE.contains(&self.debounce_ms) {
            diag.error_with_hint(
                "build.debounce_ms",
                format!("{} is out of range", self.debounce_ms),
                format!("use a value in {}..={}", DEBOUNCE_RANGE.start(), DEBOUNCE_RANGE.end()),
            );
        }
    }
}
