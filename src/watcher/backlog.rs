use std::path::PathBuf;

use rustc_hash::FxHashMap;

use super::types::{ChangeKind, FsEvent};

/// Per-path collapse of file events, in first-seen order.
///
/// Used to hold events that arrive before the watcher is ready.
#[derive(Debug, Default)]
pub struct Backlog {
    changes: FxHashMap<PathBuf, ChangeKind>,
    order: Vec<PathBuf>,
}

impl Backlog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event, applying dedup rules:
    /// - Remove + Create/Modify → Create/Modify (file was restored)
    /// - Modify + Remove → Remove (file was deleted)
    /// - Create + Remove → dropped (appeared then vanished)
    /// - otherwise: first event wins
    pub fn push(&mut self, event: FsEvent) {
        let FsEvent { path, kind } = event;

        let Some(&existing) = self.changes.get(&path) else {
            self.order.push(path.clone());
            self.changes.insert(path, kind);
            return;
        };

        match (existing, kind) {
            (ChangeKind::Removed, ChangeKind::Created | ChangeKind::Modified) => {
                crate::debug!("watch"; "restore {}->{}: {}", existing.label(), kind.label(), path.display());
                self.changes.insert(path, kind);
            }
            (ChangeKind::Modified, ChangeKind::Removed) => {
                crate::debug!("watch"; "upgrade modified->removed: {}", path.display());
                self.changes.insert(path, ChangeKind::Removed);
            }
            (ChangeKind::Created, ChangeKind::Removed) => {
                crate::debug!("watch"; "discard created+removed: {}", path.display());
                self.changes.remove(&path);
                self.order.retain(|p| *p != path);
            }
            _ => {}
        }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Take collapsed events in first-seen order.
    pub fn drain(&mut self) -> Vec<FsEvent> {
        let mut changes = std::mem::take(&mut self.changes);
        std::mem::take(&mut self.order)
            .into_iter()
            .filter_map(|path| {
                let kind = changes.remove(&path)?;
                Some(FsEvent { path, kind })
            })
            .collect()
    }
}
