//! Entity model.
//!
//! An entity is a buildable unit tied to one or more source files. Kinds
//! implement [`Entity`] on top of a shared [`EntityCore`]; the lifecycle
//! operations (load, build, destroy) are provided methods so every kind
//! follows the same protocol.
//!
//! ```text
//! add event → load → update* → build_artifacts* → destroy → collected
//! ```

mod context;
mod core;
mod id;
mod observable;
mod output;
mod state;
mod store;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

pub use self::core::EntityCore;
pub use context::BuildContext;
pub use id::EntityId;
pub use observable::ObservableSet;
pub use output::{BuiltOutput, SearchEntry};
pub use state::BuildState;
pub use store::{EntityStore, KeywordTarget};

use crate::cache::CacheStore;
use crate::error::BuildError;

/// Shared handle to an entity of any kind.
pub type EntityRef = Arc<dyn Entity>;

pub trait Entity: Send + Sync + fmt::Debug {
    /// Shared state.
    fn core(&self) -> &EntityCore;

    /// Short kind name used in logs and search entries.
    fn kind(&self) -> &'static str;

    fn title(&self) -> String {
        self.id().to_string()
    }

    /// Route of the entity's main artifact, if it has one.
    fn route(&self) -> Option<String> {
        None
    }

    /// Sort key among siblings.
    fn order(&self) -> i64 {
        0
    }

    /// Keywords this entity answers to.
    fn keywords(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the entity takes part in the shared compile step.
    fn compilable(&self) -> bool {
        false
    }

    /// Kind-specific gate on top of readiness.
    fn can_be_built(&self) -> bool {
        true
    }

    /// Read the source definition and populate initial state.
    fn load_source(&self, _ctx: &BuildContext) -> Result<()> {
        Ok(())
    }

    /// Refresh in-memory state from the compiled intermediate output.
    fn update(&self, _ctx: &BuildContext) -> Result<()> {
        Ok(())
    }

    /// Produce artifacts. Only called when the entity is ready.
    fn build(&self, ctx: &BuildContext) -> Result<Vec<BuiltOutput>>;

    /// Entities that must be rebuilt when this one changes.
    fn build_candidates(&self, _store: &EntityStore) -> Vec<EntityId> {
        Vec::new()
    }

    /// Non-physical children derived from this entity's current state.
    fn generate_children(&self, _ctx: &BuildContext) -> Result<Vec<EntityRef>> {
        Ok(Vec::new())
    }

    /// Output paths to remove when the entity is collected.
    fn output_paths(&self) -> Vec<PathBuf> {
        self.core().artifact_paths()
    }

    /// Records for the global search index.
    fn search_entries(&self, _store: &EntityStore) -> Vec<SearchEntry> {
        Vec::new()
    }

    // -------------------------------------------------------------------------
    // Provided protocol
    // -------------------------------------------------------------------------

    fn id(&self) -> &EntityId {
        &self.core().id
    }

    fn root_files(&self) -> &[PathBuf] {
        &self.core().root_files
    }

    fn dependencies(&self) -> &ObservableSet<PathBuf> {
        &self.core().dependencies
    }

    fn parent_id(&self) -> Option<EntityId> {
        self.core().parent()
    }

    fn is_physical(&self) -> bool {
        self.core().physical
    }

    fn is_destroyed(&self) -> bool {
        self.core().is_destroyed()
    }

    fn is_ready_for_build(&self) -> bool {
        let core = self.core();
        core.is_ready() && core.is_loaded() && !core.is_destroyed() && self.can_be_built()
    }

    /// `root_files ∪ dependencies`, the fingerprint surface of the cache.
    fn cached_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.root_files().to_vec();
        for dep in self.dependencies().snapshot() {
            if !paths.contains(&dep) {
                paths.push(dep);
            }
        }
        paths
    }

    fn is_cache_valid(&self, cache: &CacheStore) -> bool {
        let paths = self.cached_paths();
        !paths.is_empty() && cache.is_valid(self.id().as_str(), &paths)
    }

    /// Like [`is_cache_valid`](Entity::is_cache_valid), but on a hit also
    /// adopts the recorded output paths and keyword uses, so a skipped
    /// entity can still be collected and still follows its keywords.
    fn reuse_cache(&self, cache: &CacheStore) -> bool {
        let paths = self.cached_paths();
        if paths.is_empty() {
            return false;
        }
        match cache.load(self.id().as_str()) {
            Some(record) if record.matches(&paths) => {
                self.core().restore(record.outputs(), record.keywords());
                true
            }
            _ => false,
        }
    }

    /// Run the load step. A failure leaves the entity in the store with an
    /// `Error` load state: excluded from builds, still watched.
    fn load(&self, ctx: &BuildContext) -> BuildState<()> {
        let state = match self.load_source(ctx) {
            Ok(()) => BuildState::Done(()),
            Err(err) => BuildState::failed(BuildError::load(self.id(), &err)),
        };
        self.core().set_ready(state.is_done());
        self.core().set_load_state(state.clone());
        state
    }

    /// Acknowledge a change in one of the dependency files.
    fn dependencies_changed(&self) {
        if self.core().is_loaded() && !self.is_destroyed() {
            self.core().set_ready(true);
        }
    }

    /// Build artifacts if ready.
    ///
    /// `Pending` when the entity is not ready (nothing to cache), `Done` with
    /// the outputs whose content changed since the last build, `Error` when
    /// the build failed (readiness reset until the next change).
    fn build_artifacts(&self, ctx: &BuildContext) -> BuildState<Vec<BuiltOutput>> {
        self.core().clear_used_keywords();

        if !self.is_ready_for_build() {
            return BuildState::Pending;
        }

        match self.build(ctx) {
            Ok(outputs) => BuildState::Done(self.core().replace_artifacts(outputs)),
            Err(err) => {
                self.core().set_ready(false);
                BuildState::failed(BuildError::build(self.id(), &err))
            }
        }
    }

    /// Mark destroyed, cascading to non-physical children. The store entry
    /// is left for garbage collection.
    fn destroy(&self, store: &EntityStore) {
        if self.is_destroyed() {
            return;
        }
        for child in self.children(store) {
            if !child.is_physical() {
                child.destroy(store);
            }
        }
        self.core().mark_destroyed();
    }

    fn parent(&self, store: &EntityStore) -> Option<EntityRef> {
        self.parent_id().and_then(|id| store.get(&id))
    }

    /// Live children, derived from the store.
    fn children(&self, store: &EntityStore) -> Vec<EntityRef> {
        store.children_of(self.id())
    }

    /// Titles from the root down to the parent, for breadcrumbs.
    fn breadcrumbs(&self, store: &EntityStore) -> Vec<String> {
        let mut crumbs: Vec<String> = store
            .ancestors_of(self.id())
            .iter()
            .map(|e| e.title())
            .collect();
        crumbs.reverse();
        crumbs
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{TestEntity, context};
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_artifacts_pending_until_ready() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let entity = TestEntity::new("a");
        assert!(entity.build_artifacts(&ctx).is_pending());

        let entity = entity.loaded();
        let state = entity.build_artifacts(&ctx);
        assert!(matches!(state, BuildState::Done(ref outputs) if outputs.len() == 1));
    }

    #[test]
    fn test_identical_rebuild_reports_no_changes() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let entity = TestEntity::new("a").loaded();

        assert!(matches!(entity.build_artifacts(&ctx), BuildState::Done(o) if o.len() == 1));
        assert!(matches!(entity.build_artifacts(&ctx), BuildState::Done(o) if o.is_empty()));
    }

    #[test]
    fn test_build_failure_resets_readiness() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let entity = TestEntity::new("a").loaded();
        entity.set_fail_build(true);

        let state = entity.build_artifacts(&ctx);
        assert!(matches!(state.errors(), [BuildError::Build { .. }]));
        assert!(!entity.is_ready_for_build());

        entity.set_fail_build(false);
        entity.dependencies_changed();
        assert!(entity.build_artifacts(&ctx).is_done());
    }

    #[test]
    fn test_load_failure_keeps_entity_unbuildable() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let entity = TestEntity::new("a").failing_load();

        let state = entity.load(&ctx);
        assert!(state.is_error());
        assert!(entity.core().load_state().is_error());

        entity.dependencies_changed();
        assert!(!entity.is_ready_for_build());
    }

    #[test]
    fn test_destroy_cascades_to_generated_children_only() {
        let store = EntityStore::new();
        let api = TestEntity::new("api").into_ref();
        let generated = TestEntity::generated("api/Button").with_parent("api").into_ref();
        let physical = TestEntity::new("api/guide").with_parent("api").into_ref();
        for e in [&api, &generated, &physical] {
            store.add(e.clone());
        }

        api.destroy(&store);
        assert!(api.is_destroyed());
        assert!(generated.is_destroyed());
        assert!(!physical.is_destroyed());
        assert!(!api.is_ready_for_build());
    }

    #[test]
    fn test_cache_requires_paths() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::new(dir.path().join("cache"));
        let entity = TestEntity::new("a").loaded();
        cache.update("a", &[]).unwrap();
        assert!(!entity.is_cache_valid(&cache));

        let file = dir.path().join("a.src");
        std::fs::write(&file, "x").unwrap();
        let entity = TestEntity::with_root("b", &file).loaded();
        assert!(!entity.is_cache_valid(&cache));
        cache.update("b", &entity.cached_paths()).unwrap();
        assert!(entity.is_cache_valid(&cache));

        std::fs::write(&file, "y").unwrap();
        assert!(!entity.is_cache_valid(&cache));
    }

    #[test]
    fn test_cache_hit_restores_outputs_and_keywords() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::new(dir.path().join("cache"));
        let file = dir.path().join("a.src");
        std::fs::write(&file, "x").unwrap();
        let entity = TestEntity::with_root("a", &file).loaded();

        let record = crate::cache::CacheRecord::capture(&entity.cached_paths())
            .with_build(vec![PathBuf::from("a.txt")], vec!["B".to_string()]);
        cache.save("a", &record).unwrap();

        assert!(entity.reuse_cache(&cache));
        assert_eq!(entity.output_paths(), vec![PathBuf::from("a.txt")]);
        assert!(entity.core().uses_keyword("B"));

        std::fs::write(&file, "y").unwrap();
        let fresh = TestEntity::with_root("a", &file).loaded();
        assert!(!fresh.reuse_cache(&cache));
        assert!(fresh.output_paths().is_empty());
    }

    #[test]
    fn test_cached_paths_include_dependencies() {
        let entity = TestEntity::with_root("a", "/x/page.toml");
        entity.dependencies().add([PathBuf::from("/x/body.md"), PathBuf::from("/x/page.toml")]);
        assert_eq!(
            entity.cached_paths(),
            vec![PathBuf::from("/x/page.toml"), PathBuf::from("/x/body.md")]
        );
    }
}
