//! Values produced by entity builds.

use std::path::PathBuf;

use serde::Serialize;

/// One artifact: a file path relative to the output directory plus its
/// full content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltOutput {
    pub path: PathBuf,
    pub content: String,
}

impl BuiltOutput {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A search index record contributed by an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchEntry {
    pub title: String,
    pub route: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub breadcrumbs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}
