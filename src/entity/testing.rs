//! Configurable entity and context for unit tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Result, bail};

use super::{BuildContext, BuiltOutput, Entity, EntityCore, EntityId, EntityRef, EntityStore};
use crate::collab::{DefinitionCompiler, TemplateRenderer, TomlSourceParser};
use crate::utils::path::id_to_safe_filename;

#[derive(Debug)]
pub struct TestEntity {
    core: EntityCore,
    keywords: Vec<String>,
    candidates: Vec<EntityId>,
    uses: Vec<String>,
    compilable: bool,
    fail_load: bool,
    fail_update: AtomicBool,
    fail_build: AtomicBool,
    rewrite_on_build: Option<String>,
    builds: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
}

impl TestEntity {
    pub fn new(id: &str) -> Self {
        Self::from_core(EntityCore::new(EntityId::new(id), Vec::new()))
    }

    pub fn generated(id: &str) -> Self {
        Self::from_core(EntityCore::generated(EntityId::new(id), Vec::new()))
    }

    pub fn with_root(id: &str, root: impl Into<PathBuf>) -> Self {
        Self::from_core(EntityCore::new(EntityId::new(id), vec![root.into()]))
    }

    fn from_core(core: EntityCore) -> Self {
        Self {
            core,
            keywords: Vec::new(),
            candidates: Vec::new(),
            uses: Vec::new(),
            compilable: false,
            fail_load: false,
            fail_update: AtomicBool::new(false),
            fail_build: AtomicBool::new(false),
            rewrite_on_build: None,
            builds: Arc::new(AtomicUsize::new(0)),
            updates: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_parent(self, parent: &str) -> Self {
        self.core.set_parent(Some(EntityId::new(parent)));
        self
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| (*k).to_string()).collect();
        self
    }

    pub fn with_candidates(mut self, ids: &[&str]) -> Self {
        self.candidates = ids.iter().map(|id| EntityId::new(*id)).collect();
        self
    }

    /// Keywords recorded as used on every build.
    pub fn using(mut self, keywords: &[&str]) -> Self {
        self.uses = keywords.iter().map(|k| (*k).to_string()).collect();
        self
    }

    pub fn compilable(mut self) -> Self {
        self.compilable = true;
        self
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    /// Overwrite the root file with `content` after the build has read it,
    /// like an editor saving while the build runs.
    pub fn rewriting_source(mut self, content: &str) -> Self {
        self.rewrite_on_build = Some(content.to_string());
        self
    }

    pub fn set_fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_build(&self, fail: bool) {
        self.fail_build.store(fail, Ordering::SeqCst);
    }

    /// Number of `build` calls, shared with the returned handle.
    pub fn builds(&self) -> Arc<AtomicUsize> {
        self.builds.clone()
    }

    pub fn updates(&self) -> Arc<AtomicUsize> {
        self.updates.clone()
    }

    /// Loaded entity behind an `Arc`.
    pub fn loaded(self) -> Arc<Self> {
        let entity = Arc::new(self);
        entity.core.set_load_state(super::BuildState::Done(()));
        entity.core.set_ready(true);
        entity
    }

    /// Loaded entity as a trait object.
    pub fn into_ref(self) -> EntityRef {
        self.loaded()
    }

    pub fn output_name(id: &str) -> PathBuf {
        PathBuf::from(format!("{}.txt", id_to_safe_filename(id)))
    }
}

impl Entity for TestEntity {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn kind(&self) -> &'static str {
        "test"
    }

    fn keywords(&self) -> Vec<String> {
        self.keywords.clone()
    }

    fn compilable(&self) -> bool {
        self.compilable
    }

    fn load_source(&self, _ctx: &BuildContext) -> Result<()> {
        if self.fail_load {
            bail!("load failure");
        }
        Ok(())
    }

    fn update(&self, _ctx: &BuildContext) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_update.load(Ordering::SeqCst) {
            bail!("update failure");
        }
        Ok(())
    }

    fn build(&self, _ctx: &BuildContext) -> Result<Vec<BuiltOutput>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.fail_build.load(Ordering::SeqCst) {
            bail!("build failure");
        }
        for keyword in &self.uses {
            self.core.use_keyword(keyword.clone());
        }
        let content = self
            .root_files()
            .first()
            .and_then(|p| fs::read_to_string(p).ok())
            .unwrap_or_else(|| self.id().to_string());
        if let (Some(rewrite), Some(root)) = (&self.rewrite_on_build, self.root_files().first()) {
            fs::write(root, rewrite)?;
        }
        Ok(vec![BuiltOutput::new(Self::output_name(self.id().as_str()), content)])
    }

    fn build_candidates(&self, _store: &EntityStore) -> Vec<EntityId> {
        self.candidates.clone()
    }
}

/// Context with default collaborators rooted at `root`.
pub fn context(root: &Path) -> BuildContext {
    context_with_store(root, Arc::new(EntityStore::new()))
}

pub fn context_with_store(root: &Path, store: Arc<EntityStore>) -> BuildContext {
    BuildContext {
        root: root.to_path_buf(),
        output_dir: root.join("out"),
        compiled_dir: root.join(".compiled"),
        store,
        parser: Arc::new(TomlSourceParser),
        compiler: Arc::new(DefinitionCompiler),
        renderer: Arc::new(TemplateRenderer::new()),
    }
}
