//! Per-entity dependency subscriptions.
//!
//! Each live entity gets one task that watches its dependency files (and
//! root files) and feeds dependency events back into the collector.
//! Tasks are held in an explicit map so a resubscription aborts the
//! previous one.

use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::entity::{EntityId, EntityRef, EntityStore};
use crate::lifecycle::EntityEvent;
use crate::watcher::{FsEvent, Watcher};

pub(super) struct Subscriptions {
    watcher: Arc<Watcher>,
    tx: mpsc::Sender<EntityEvent>,
    tasks: FxHashMap<EntityId, JoinHandle<()>>,
}

impl Subscriptions {
    pub(super) fn new(watcher: Arc<Watcher>, tx: mpsc::Sender<EntityEvent>) -> Self {
        Self {
            watcher,
            tx,
            tasks: FxHashMap::default(),
        }
    }

    /// Replace the subscription of every given entity.
    pub(super) fn refresh(&mut self, entities: &[EntityRef]) {
        for entity in entities {
            self.subscribe(entity.clone());
        }
    }

    pub(super) fn subscribe(&mut self, entity: EntityRef) {
        if let Some(previous) = self.tasks.remove(entity.id()) {
            previous.abort();
        }
        if entity.is_destroyed() {
            return;
        }
        let id = entity.id().clone();
        let task = tokio::spawn(follow(entity, self.watcher.clone(), self.tx.clone()));
        self.tasks.insert(id, task);
    }

    /// Drop finished tasks and tasks of entities no longer live in `store`.
    pub(super) fn prune(&mut self, store: &EntityStore) {
        self.tasks.retain(|id, task| {
            let live = store.get(id).is_some_and(|e| !e.is_destroyed());
            if !live {
                task.abort();
            }
            live && !task.is_finished()
        });
    }

    pub(super) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(super) fn abort_all(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.abort_all();
    }
}

/// Watch one entity until it is destroyed, one of its physical root files
/// changes, or the collector goes away.
async fn follow(entity: EntityRef, watcher: Arc<Watcher>, tx: mpsc::Sender<EntityEvent>) {
    let mut destroyed = entity.core().on_destroy();
    let mut dependencies = entity.dependencies().changes();

    loop {
        if *destroyed.borrow() {
            return;
        }
        dependencies.borrow_and_update();

        let roots = entity.root_files().to_vec();
        let mut paths = entity.dependencies().snapshot();
        paths.extend(roots.iter().cloned());
        let mut subscription = watcher.watch(&paths);

        loop {
            tokio::select! {
                _ = destroyed.changed() => return,
                changed = dependencies.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    crate::debug!("watch"; "resubscribe `{}`", entity.id());
                    break;
                }
                event = subscription.recv() => {
                    let Some(event) = event else { return };
                    let Some(event) = classify(&entity, &roots, &event) else { return };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        }
        watcher.unsubscribe(&subscription);
    }
}

/// A root-file change ends the subscription of a physical entity (its
/// coordinator handles it) and is a source change for a generated one.
fn classify(entity: &EntityRef, roots: &[PathBuf], event: &FsEvent) -> Option<EntityEvent> {
    let is_root = roots.iter().any(|root| event.path == *root);
    match (is_root, entity.is_physical()) {
        (true, true) => None,
        (true, false) => Some(EntityEvent::source(entity.clone())),
        (false, _) => Some(EntityEvent::dependency(entity.clone())),
    }
}
