//! Collaborators and locations shared by every entity operation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::EntityStore;
use crate::collab::{Compiler, Renderer, SourceParser};

/// Everything an entity needs to load, update and build itself.
///
/// Cloned freely: every field is a path or an `Arc`.
#[derive(Clone)]
pub struct BuildContext {
    /// Project root, base for source-relative paths.
    pub root: PathBuf,
    /// Where artifacts are written.
    pub output_dir: PathBuf,
    /// Where the compiler puts intermediate modules.
    pub compiled_dir: PathBuf,
    pub store: Arc<EntityStore>,
    pub parser: Arc<dyn SourceParser>,
    pub compiler: Arc<dyn Compiler>,
    pub renderer: Arc<dyn Renderer>,
}

impl BuildContext {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }
}
