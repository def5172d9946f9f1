//! State shared by every entity kind.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;
use tokio::sync::watch;

use super::{BuildState, BuiltOutput, EntityId, ObservableSet};

/// Identity, relationships and readiness of one entity.
///
/// Every field uses interior mutability: entities are shared as
/// `Arc<dyn Entity>` between the store, the lifecycle coordinators and
/// the rayon workers of a pass.
#[derive(Debug)]
pub struct EntityCore {
    pub(super) id: EntityId,
    pub(super) root_files: Vec<PathBuf>,
    pub(super) physical: bool,
    pub(super) dependencies: ObservableSet<PathBuf>,
    parent: RwLock<Option<EntityId>>,
    destroyed: AtomicBool,
    ready: AtomicBool,
    load_state: Mutex<BuildState<()>>,
    artifacts: Mutex<Vec<BuiltOutput>>,
    outputs: Mutex<Vec<PathBuf>>,
    used_keywords: Mutex<FxHashSet<String>>,
    destroy_tx: watch::Sender<bool>,
}

impl EntityCore {
    /// Core of an entity backed by real source files.
    pub fn new(id: EntityId, root_files: Vec<PathBuf>) -> Self {
        Self::with_physical(id, root_files, true)
    }

    /// Core of an entity generated by another entity.
    pub fn generated(id: EntityId, root_files: Vec<PathBuf>) -> Self {
        Self::with_physical(id, root_files, false)
    }

    fn with_physical(id: EntityId, mut root_files: Vec<PathBuf>, physical: bool) -> Self {
        // Ordered set: keep first occurrence
        let mut seen = FxHashSet::default();
        root_files.retain(|path| seen.insert(path.clone()));

        let (destroy_tx, _) = watch::channel(false);
        Self {
            id,
            root_files,
            physical,
            dependencies: ObservableSet::new(),
            parent: RwLock::new(None),
            destroyed: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            load_state: Mutex::new(BuildState::Pending),
            artifacts: Mutex::new(Vec::new()),
            outputs: Mutex::new(Vec::new()),
            used_keywords: Mutex::new(FxHashSet::default()),
            destroy_tx,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    // -------------------------------------------------------------------------
    // Parent link
    // -------------------------------------------------------------------------

    pub fn parent(&self) -> Option<EntityId> {
        self.parent.read().clone()
    }

    pub fn set_parent(&self, parent: Option<EntityId>) {
        // A self-link would turn ancestor walks into loops.
        let parent = parent.filter(|p| *p != self.id);
        *self.parent.write() = parent;
    }

    // -------------------------------------------------------------------------
    // Flags
    // -------------------------------------------------------------------------

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub(super) fn mark_destroyed(&self) {
        self.ready.store(false, Ordering::Release);
        self.destroyed.store(true, Ordering::Release);
        self.destroy_tx.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Resolves to `true` once the entity is destroyed.
    pub fn on_destroy(&self) -> watch::Receiver<bool> {
        self.destroy_tx.subscribe()
    }

    // -------------------------------------------------------------------------
    // Load state
    // -------------------------------------------------------------------------

    pub fn load_state(&self) -> BuildState<()> {
        self.load_state.lock().clone()
    }

    pub(super) fn set_load_state(&self, state: BuildState<()>) {
        *self.load_state.lock() = state;
    }

    pub fn is_loaded(&self) -> bool {
        self.load_state.lock().is_done()
    }

    // -------------------------------------------------------------------------
    // Artifacts
    // -------------------------------------------------------------------------

    /// Artifacts of the last build in this process.
    pub fn artifacts(&self) -> Vec<BuiltOutput> {
        self.artifacts.lock().clone()
    }

    /// Output paths the entity owns on disk: the last build's, or the ones
    /// restored from a cache record.
    pub fn artifact_paths(&self) -> Vec<PathBuf> {
        self.outputs.lock().clone()
    }

    /// Store `outputs` as the latest artifacts and return the ones whose
    /// content differs from the previous build.
    pub(super) fn replace_artifacts(&self, outputs: Vec<BuiltOutput>) -> Vec<BuiltOutput> {
        let mut artifacts = self.artifacts.lock();
        let changed = outputs
            .iter()
            .filter(|output| !artifacts.contains(output))
            .cloned()
            .collect();
        *self.outputs.lock() = outputs.iter().map(|o| o.path.clone()).collect();
        *artifacts = outputs;
        changed
    }

    /// Forget artifact contents so the next build reports every output as
    /// changed. Owned paths are kept.
    pub fn discard_artifacts(&self) {
        self.artifacts.lock().clear();
    }

    /// Adopt the output paths and keyword uses of a cached build.
    pub fn restore(&self, outputs: &[PathBuf], keywords: &[String]) {
        *self.outputs.lock() = outputs.to_vec();
        let mut used = self.used_keywords.lock();
        used.clear();
        used.extend(keywords.iter().cloned());
    }

    // -------------------------------------------------------------------------
    // Keywords
    // -------------------------------------------------------------------------

    pub fn use_keyword(&self, keyword: impl Into<String>) {
        self.used_keywords.lock().insert(keyword.into());
    }

    pub fn uses_keyword(&self, keyword: &str) -> bool {
        self.used_keywords.lock().contains(keyword)
    }

    pub fn used_keywords(&self) -> Vec<String> {
        let mut keywords: Vec<_> = self.used_keywords.lock().iter().cloned().collect();
        keywords.sort();
        keywords
    }

    pub(super) fn clear_used_keywords(&self) {
        self.used_keywords.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_files_are_an_ordered_set() {
        let core = EntityCore::new(
            EntityId::new("a"),
            vec!["b.src".into(), "a.src".into(), "b.src".into()],
        );
        assert_eq!(core.root_files, vec![PathBuf::from("b.src"), PathBuf::from("a.src")]);
    }

    #[test]
    fn test_self_parent_is_ignored() {
        let core = EntityCore::new(EntityId::new("a"), vec![]);
        core.set_parent(Some(EntityId::new("a")));
        assert!(core.parent().is_none());
    }

    #[test]
    fn test_replace_artifacts_reports_changes() {
        let core = EntityCore::new(EntityId::new("a"), vec![]);
        let first = vec![BuiltOutput::new("a.html", "1"), BuiltOutput::new("b.html", "x")];
        assert_eq!(core.replace_artifacts(first.clone()).len(), 2);

        let second = vec![BuiltOutput::new("a.html", "2"), BuiltOutput::new("b.html", "x")];
        let changed = core.replace_artifacts(second);
        assert_eq!(changed, vec![BuiltOutput::new("a.html", "2")]);
    }

    #[test]
    fn test_restore_then_rebuild_replaces_owned_paths() {
        let core = EntityCore::new(EntityId::new("a"), vec![]);
        core.restore(&[PathBuf::from("a/index.html")], &["B".to_string()]);
        assert_eq!(core.artifact_paths(), vec![PathBuf::from("a/index.html")]);
        assert!(core.uses_keyword("B"));
        assert!(core.artifacts().is_empty());

        core.replace_artifacts(vec![BuiltOutput::new("moved/index.html", "x")]);
        assert_eq!(core.artifact_paths(), vec![PathBuf::from("moved/index.html")]);

        core.discard_artifacts();
        assert_eq!(core.artifact_paths(), vec![PathBuf::from("moved/index.html")]);
        let changed = core.replace_artifacts(vec![BuiltOutput::new("moved/index.html", "x")]);
        assert_eq!(changed.len(), 1);
    }

    #[test]
    fn test_destroy_signal() {
        let core = EntityCore::new(EntityId::new("a"), vec![]);
        let rx = core.on_destroy();
        core.set_ready(true);
        core.mark_destroyed();
        assert!(*rx.borrow());
        assert!(!core.is_ready());
        assert!(core.is_destroyed());
    }
}
