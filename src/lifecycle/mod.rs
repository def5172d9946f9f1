//! Lifecycle coordinator: file events of one kind → entity events.
//!
//! ```text
//! Created/Modified ─┬─ known, live      → reload same entity   ─┐
//!                   ├─ known, destroyed → replace with new one ─┼→ EntityEvent
//!                   └─ unknown          → create, add, load    ─┤
//! Removed ───────────── known           → destroy (cascade)    ─┘
//! ```
//!
//! Events that arrive before the watcher is ready are collapsed per path
//! and forwarded once, in first-seen order.


use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, watch};

use crate::entities::KindBinding;
use crate::entity::{BuildContext, BuildState, EntityId, EntityRef};
use crate::watcher::{Backlog, ChangeKind, FsEvent, Subscription};

/// Builds an entity for a source path matching the coordinator's pattern.
pub trait EntityFactory: Send + Sync {
    fn create(&self, path: &Path) -> EntityRef;
}

impl<F> EntityFactory for F
where
    F: Fn(&Path) -> EntityRef + Send + Sync,
{
    fn create(&self, path: &Path) -> EntityRef {
        self(path)
    }
}

/// Why an entity entered a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Its root file was added, changed or removed.
    Source,
    /// One of its dependency files changed.
    Dependency,
}

#[derive(Debug, Clone)]
pub struct EntityEvent {
    pub entity: EntityRef,
    pub trigger: Trigger,
}

impl EntityEvent {
    pub fn source(entity: EntityRef) -> Self {
        Self {
            entity,
            trigger: Trigger::Source,
        }
    }

    pub fn dependency(entity: EntityRef) -> Self {
        Self {
            entity,
            trigger: Trigger::Dependency,
        }
    }
}

pub struct LifecycleCoordinator {
    kind: &'static str,
    pattern: String,
    factory: Arc<dyn EntityFactory>,
    ctx: BuildContext,
    /// Root file → id of entities this coordinator created.
    known: Mutex<FxHashMap<PathBuf, EntityId>>,
}

impl LifecycleCoordinator {
    pub fn new(binding: &KindBinding, ctx: BuildContext) -> Self {
        Self {
            kind: binding.kind,
            pattern: binding.pattern.clone(),
            factory: Arc::clone(&binding.factory),
            ctx,
            known: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Apply one file event, returning the entities to emit.
    pub fn apply(&self, event: &FsEvent) -> Vec<EntityRef> {
        match event.kind {
            ChangeKind::Created | ChangeKind::Modified => {
                if event.path.is_dir() {
                    return Vec::new();
                }
                vec![self.upsert(&event.path)]
            }
            ChangeKind::Removed => self.remove(&event.path),
        }
    }

    fn upsert(&self, path: &Path) -> EntityRef {
        let existing = self
            .known
            .lock()
            .get(path)
            .and_then(|id| self.ctx.store.get(id));

        let entity = match existing {
            Some(entity) if !entity.is_destroyed() => {
                crate::debug!(self.kind; "reload `{}`", entity.id());
                entity
            }
            _ => {
                let entity = self.factory.create(path);
                crate::debug!(self.kind; "add `{}`", entity.id());
                self.ctx.store.add(entity.clone());
                self.known.lock().insert(path.to_path_buf(), entity.id().clone());
                entity
            }
        };

        if let BuildState::Error(errors) = entity.load(&self.ctx) {
            errors.iter().for_each(crate::error::report);
        }
        entity
    }

    /// Destroy entities rooted at `path`, or anywhere below it when a
    /// directory was removed.
    fn remove(&self, path: &Path) -> Vec<EntityRef> {
        let ids: Vec<EntityId> = {
            let mut known = self.known.lock();
            let paths: Vec<PathBuf> = known
                .keys()
                .filter(|p| p.as_path() == path || p.starts_with(path))
                .cloned()
                .collect();
            paths.iter().filter_map(|p| known.remove(p)).collect()
        };

        ids.iter()
            .filter_map(|id| self.ctx.store.get(id))
            .filter(|entity| !entity.is_destroyed())
            .map(|entity| {
                crate::debug!(self.kind; "destroy `{}`", entity.id());
                entity.destroy(&self.ctx.store);
                entity
            })
            .collect()
    }

    /// Forward watcher events until the subscription or the receiver ends.
    pub async fn run(
        self: Arc<Self>,
        mut subscription: Subscription,
        mut ready: watch::Receiver<bool>,
        tx: mpsc::Sender<EntityEvent>,
    ) {
        let mut backlog = Backlog::new();
        while !*ready.borrow() {
            tokio::select! {
                event = subscription.recv() => match event {
                    Some(event) => backlog.push(event),
                    None => return,
                },
                changed = ready.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
        while let Some(event) = subscription.try_recv() {
            backlog.push(event);
        }

        crate::debug!(self.kind; "ready with {} buffered events", backlog.len());
        for event in backlog.drain() {
            if !self.forward(&event, &tx).await {
                return;
            }
        }

        while let Some(event) = subscription.recv().await {
            if !self.forward(&event, &tx).await {
                return;
            }
        }
    }

    async fn forward(&self, event: &FsEvent, tx: &mpsc::Sender<EntityEvent>) -> bool {
        for entity in self.apply(event) {
            if tx.send(EntityEvent::source(entity)).await.is_err() {
                return false;
            }
        }
        true
    }
}
