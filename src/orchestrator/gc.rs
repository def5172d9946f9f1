//! Garbage collection of destroyed entities.

use std::path::PathBuf;

use anyhow::Result;
use rustc_hash::FxHashSet;

use crate::cache::CacheStore;
use crate::collab::OutputWriter;
use crate::entity::EntityStore;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GcReport {
    pub collected: usize,
    pub removed: usize,
}

/// Remove outputs of destroyed entities, then delete them from the store.
///
/// Paths still produced by a live entity are kept. Entities that were
/// replaced before collection only lose outputs their replacement no longer
/// produces; a replacement that has not built yet (cache hit) inherits them.
pub fn collect_garbage(
    store: &EntityStore,
    cache: &CacheStore,
    writer: &dyn OutputWriter,
) -> Result<GcReport> {
    let all = store.as_vec();
    let live: FxHashSet<PathBuf> = all
        .iter()
        .filter(|e| !e.is_destroyed())
        .flat_map(|e| e.output_paths())
        .collect();

    let mut report = GcReport::default();

    for entity in all.iter().filter(|e| e.is_destroyed()) {
        let paths: Vec<PathBuf> = entity
            .output_paths()
            .into_iter()
            .filter(|p| !live.contains(p))
            .collect();
        report.removed += writer.remove(&paths)?;
        if let Err(e) = cache.remove(entity.id().as_str()) {
            crate::debug!("gc"; "cache record of `{}`: {}", entity.id(), e);
        }
        if store.delete(entity.id()) {
            report.collected += 1;
            crate::debug!("gc"; "collected `{}`", entity.id());
        }
    }

    for evicted in store.take_evicted() {
        let inherited = store
            .get(evicted.id())
            .is_some_and(|replacement| replacement.core().artifacts().is_empty());
        if inherited {
            continue;
        }
        let paths: Vec<PathBuf> = evicted
            .output_paths()
            .into_iter()
            .filter(|p| !live.contains(p))
            .collect();
        report.removed += writer.remove(&paths)?;
        report.collected += 1;
    }

    Ok(report)
}
