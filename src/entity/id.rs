//! Entity identity.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::utils::path::relative_slash;

/// Stable key of an entity, derived from its source path.
///
/// Cheap to clone; compared and hashed by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(Arc<str>);

impl EntityId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Id of the entity rooted at `path`: the containing directory relative
    /// to `root`, slash separated.
    ///
    /// `docs/guide/intro/page.toml` under root `docs` → `guide/intro`.
    /// A definition at the root itself maps to its file stem.
    pub fn from_source(root: &Path, path: &Path) -> Self {
        let dir = path.parent().unwrap_or(path);
        let id = relative_slash(root, dir);
        if id.is_empty() || dir == root {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Self::new(stem);
        }
        Self::new(id)
    }

    /// Id of a kind that shares a directory with another kind, e.g.
    /// `guide/intro` + `deps` → `guide/intro#deps`.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self::new(format!("{}#{suffix}", self.0))
    }

    /// Id of a generated child: `api` + `Button` → `api/Button`.
    pub fn child(&self, name: &str) -> Self {
        Self::new(format!("{}/{name}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
