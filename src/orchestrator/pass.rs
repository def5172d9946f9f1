//! One build pass over a batch.
//!
//! ```text
//! Compiling → Updating → CandidateExpansion → Building → Emitting → Idle
//! ```
//!
//! Every step is best-effort: per-entity failures are logged and recorded
//! in the [`PassReport`], never propagated.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use super::batch::Batch;
use super::{candidates, gc};
use crate::cache::{CacheRecord, CacheStore};
use crate::collab::{CompileEntry, OutputWriter};
use crate::entity::{BuildContext, BuildState, BuiltOutput, EntityId, EntityRef};
use crate::error::{BuildError, report as report_error};
use crate::global::GlobalArtifact;
use crate::lifecycle::Trigger;
use crate::logger::ProgressLine;

/// Where the orchestrator is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Collecting,
    Compiling,
    Updating,
    CandidateExpansion,
    Building,
    Emitting,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Collecting => "collecting",
            Self::Compiling => "compiling",
            Self::Updating => "updating",
            Self::CandidateExpansion => "candidate expansion",
            Self::Building => "building",
            Self::Emitting => "emitting",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Summary of one pass.
#[derive(Debug, Default)]
pub struct PassReport {
    /// Entities whose build finished, in candidate order.
    pub built: Vec<EntityId>,
    /// Files actually written.
    pub written: usize,
    /// Files removed: outputs an entity no longer produces plus outputs of
    /// collected entities.
    pub removed: usize,
    /// Destroyed entities deleted from the store.
    pub collected: usize,
    /// Changed entities dropped because their cache was valid.
    pub skipped: usize,
    pub errors: Vec<BuildError>,
    /// Live entities of the batch, for dependency subscriptions.
    pub touched: Vec<EntityRef>,
}

impl PassReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut parts = vec![format!("built {}", self.built.len())];
        if self.written > 0 {
            parts.push(format!("wrote {}", self.written));
        }
        if self.removed > 0 {
            parts.push(format!("removed {}", self.removed));
        }
        if self.skipped > 0 {
            parts.push(format!("{} cached", self.skipped));
        }
        parts.join(", ")
    }
}

/// A successful build waiting to be written.
struct Built<'a> {
    entity: &'a EntityRef,
    /// Fingerprints taken before the build read its sources.
    record: CacheRecord,
    changed: Vec<BuiltOutput>,
    /// Paths owned before the build that it no longer produces.
    dropped: Vec<PathBuf>,
}

pub struct PassRunner {
    ctx: BuildContext,
    cache: Arc<CacheStore>,
    writer: Arc<dyn OutputWriter>,
    globals: Vec<Box<dyn GlobalArtifact>>,
    keywords: FxHashMap<String, String>,
    phase: Mutex<Phase>,
}

impl PassRunner {
    pub fn new(
        ctx: BuildContext,
        cache: Arc<CacheStore>,
        writer: Arc<dyn OutputWriter>,
        globals: Vec<Box<dyn GlobalArtifact>>,
        keywords: FxHashMap<String, String>,
    ) -> Self {
        Self {
            ctx,
            cache,
            writer,
            globals,
            keywords,
            phase: Mutex::new(Phase::Idle),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    pub(super) fn enter(&self, phase: Phase) {
        crate::debug!("pass"; "{}", phase);
        *self.phase.lock() = phase;
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    /// Run one pass. Strictly sequential with respect to other passes.
    pub fn run(&self, batch: Batch) -> PassReport {
        let mut report = PassReport::default();

        self.enter(Phase::Compiling);
        self.compile(&mut report);

        self.enter(Phase::Updating);
        let mut changed: Vec<EntityRef> = batch.entities().cloned().collect();
        self.update(&batch, &mut changed, &mut report);

        self.enter(Phase::CandidateExpansion);
        self.ctx.store.update_keyword_map(&self.keywords);
        let before = changed.len();
        changed.retain(|entity| entity.is_destroyed() || !entity.reuse_cache(&self.cache));
        report.skipped = before - changed.len();
        let destroyed = self.ctx.store.as_vec().iter().any(|e| e.is_destroyed());
        let candidates = candidates::resolve(&changed, &self.ctx.store);
        crate::debug!("pass"; "{} changed, {} candidates", changed.len(), candidates.len());

        self.enter(Phase::Building);
        let built = self.build(&candidates, &mut report);
        let globals = if !self.globals.is_empty() && (!report.built.is_empty() || destroyed) {
            self.build_globals(&mut report)
        } else {
            Vec::new()
        };

        self.enter(Phase::Emitting);
        self.emit(built, &globals, &mut report);

        report.touched = changed_live(&batch, &changed);
        self.enter(Phase::Idle);
        report
    }

    /// One combined compile of every live compilable entity.
    fn compile(&self, report: &mut PassReport) {
        let entries: Vec<CompileEntry> = self
            .ctx
            .store
            .as_vec()
            .iter()
            .filter(|e| e.compilable() && !e.is_destroyed() && e.core().is_loaded())
            .filter_map(|e| Some(CompileEntry::new(e.id().clone(), e.root_files().first()?)))
            .collect();
        if entries.is_empty() {
            return;
        }

        if let Err(err) = self.ctx.compiler.compile(&entries, &self.ctx.compiled_dir) {
            let error = BuildError::compile(&err);
            report_error(&error);
            report.errors.push(error);
        }
    }

    /// Refresh source-triggered entities and sync their generated children.
    fn update(&self, batch: &Batch, changed: &mut Vec<EntityRef>, report: &mut PassReport) {
        for item in batch.items() {
            if item.trigger == Trigger::Dependency {
                item.entity.dependencies_changed();
            }
        }

        let sources: Vec<&EntityRef> = batch
            .items()
            .iter()
            .filter(|item| item.trigger == Trigger::Source)
            .map(|item| &item.entity)
            .filter(|e| !e.is_destroyed() && e.core().is_loaded())
            .collect();

        let results: Vec<(&EntityRef, Option<BuildError>)> = sources
            .par_iter()
            .map(|entity| {
                let error = entity.update(&self.ctx).err().map(|err| {
                    entity.core().set_ready(false);
                    BuildError::update(entity.id(), &err)
                });
                (*entity, error)
            })
            .collect();

        for (entity, error) in results {
            if let Some(error) = error {
                report_error(&error);
                report.errors.push(error);
                continue;
            }
            match entity.generate_children(&self.ctx) {
                Ok(children) => self.sync_children(entity, children, changed, report),
                Err(err) => {
                    let error = BuildError::update(entity.id(), &err);
                    report_error(&error);
                    report.errors.push(error);
                }
            }
        }
    }

    /// Register freshly generated children, replacing the previous
    /// generation, and destroy the ones that are no longer generated.
    fn sync_children(
        &self,
        parent: &EntityRef,
        children: Vec<EntityRef>,
        changed: &mut Vec<EntityRef>,
        report: &mut PassReport,
    ) {
        let store = &self.ctx.store;
        let wanted: FxHashSet<EntityId> = children.iter().map(|c| c.id().clone()).collect();

        for stale in store.children_of(parent.id()) {
            if !stale.is_physical() && !wanted.contains(stale.id()) {
                crate::debug!("pass"; "drop generated `{}`", stale.id());
                stale.destroy(store);
                changed.push(stale);
            }
        }

        for child in children {
            if let Some(previous) = store.get(child.id())
                && !previous.is_destroyed()
            {
                previous.destroy(store);
            }
            store.add(child.clone());
            if let BuildState::Error(errors) = child.load(&self.ctx) {
                errors.iter().for_each(report_error);
                report.errors.extend(errors);
            }
            changed.push(child);
        }
    }

    /// Build candidates in parallel.
    ///
    /// Each entity's cache record is captured before its build reads the
    /// sources; an edit landing mid-build then invalidates the record
    /// instead of being vouched for.
    fn build<'a>(&self, candidates: &'a [EntityRef], report: &mut PassReport) -> Vec<Built<'a>> {
        let progress = ProgressLine::new(&[("build", candidates.len())]);
        let results: Vec<_> = candidates
            .par_iter()
            .map(|entity| {
                let record = CacheRecord::capture(&entity.cached_paths());
                let previous = entity.output_paths();
                let state = entity.build_artifacts(&self.ctx);
                progress.inc("build");
                (entity, record, previous, state)
            })
            .collect();
        progress.finish();

        let mut built = Vec::new();
        for (entity, record, previous, state) in results {
            match state {
                BuildState::Pending => {}
                BuildState::Done(changed) => {
                    let current = entity.output_paths();
                    let dropped = previous
                        .into_iter()
                        .filter(|path| !current.contains(path))
                        .collect();
                    report.built.push(entity.id().clone());
                    built.push(Built {
                        entity,
                        record,
                        changed,
                        dropped,
                    });
                }
                BuildState::Error(errors) => {
                    errors.iter().for_each(report_error);
                    report.errors.extend(errors);
                }
            }
        }
        built
    }

    fn build_globals(&self, report: &mut PassReport) -> Vec<(&'static str, Vec<BuiltOutput>)> {
        let mut outputs = Vec::new();
        for global in &self.globals {
            match global.build(&self.ctx.store) {
                Ok(built) => outputs.push((global.name(), built)),
                Err(err) => {
                    let error = BuildError::global(global.name(), &err);
                    report_error(&error);
                    report.errors.push(error);
                }
            }
        }
        outputs
    }

    /// Write outputs entity by entity, record the cache of every entity
    /// whose outputs landed, remove dropped outputs, then collect garbage.
    fn emit(
        &self,
        built: Vec<Built<'_>>,
        globals: &[(&'static str, Vec<BuiltOutput>)],
        report: &mut PassReport,
    ) {
        let mut dropped = Vec::new();
        for item in built {
            let id = item.entity.id();
            match self.writer.write(&item.changed) {
                Ok(written) => {
                    report.written += written;
                    let record = item
                        .record
                        .with_build(item.entity.output_paths(), item.entity.core().used_keywords());
                    if let Err(e) = self.cache.save(id.as_str(), &record) {
                        crate::log!("cache"; "failed to record `{}`: {}", id, e);
                    }
                    dropped.extend(item.dropped);
                }
                Err(err) => {
                    // Rewrite everything on the next attempt.
                    item.entity.core().discard_artifacts();
                    if let Err(e) = self.cache.remove(id.as_str()) {
                        crate::debug!("cache"; "record of `{}`: {}", id, e);
                    }
                    let error = BuildError::write(id, &err);
                    report_error(&error);
                    report.errors.push(error);
                }
            }
        }

        for (name, outputs) in globals {
            match self.writer.write(outputs) {
                Ok(written) => report.written += written,
                Err(err) => {
                    let error = BuildError::global(*name, &err);
                    report_error(&error);
                    report.errors.push(error);
                }
            }
        }

        if !dropped.is_empty() {
            let mut owned: FxHashSet<PathBuf> = self
                .ctx
                .store
                .as_vec()
                .iter()
                .filter(|e| !e.is_destroyed())
                .flat_map(|e| e.output_paths())
                .collect();
            owned.extend(globals.iter().flat_map(|(_, o)| o.iter().map(|o| o.path.clone())));
            dropped.retain(|path| !owned.contains(path));
            match self.writer.remove(&dropped) {
                Ok(removed) => report.removed += removed,
                Err(e) => crate::log!("error"; "removing dropped outputs: {:#}", e),
            }
        }

        match gc::collect_garbage(&self.ctx.store, &self.cache, self.writer.as_ref()) {
            Ok(gc) => {
                report.removed += gc.removed;
                report.collected = gc.collected;
            }
            Err(e) => crate::log!("gc"; "{:#}", e),
        }
    }
}

/// Live entities of the batch plus generated children, deduplicated.
fn changed_live(batch: &Batch, changed: &[EntityRef]) -> Vec<EntityRef> {
    let mut seen = FxHashSet::default();
    batch
        .entities()
        .chain(changed.iter())
        .filter(|e| !e.is_destroyed() && seen.insert(e.id().clone()))
        .cloned()
        .collect()
}
