//! Build orchestrator.
//!
//! Wires the watcher, one lifecycle coordinator per entity kind, the batch
//! collector and the pass runner together:
//!
//! ```text
//! Watcher ──► LifecycleCoordinator (per kind) ──┐
//!    ▲                                           ├─► Collector ──► PassRunner
//!    └──────── dependency subscriptions ◄────────┘       (one batch at a time)
//! ```

mod batch;
mod candidates;
mod gc;
mod pass;
mod subscriptions;


use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

pub use batch::Batch;
pub use gc::GcReport;
pub use pass::{PassReport, PassRunner, Phase};

use crate::cache::CacheStore;
use crate::collab::{DefinitionCompiler, FsOutputWriter, TemplateRenderer, TomlSourceParser};
use crate::entity::{BuildContext, EntityStore};
use crate::error::FatalError;
use crate::lifecycle::{EntityEvent, LifecycleCoordinator};
use crate::watcher::{Backlog, Watcher};
use subscriptions::Subscriptions;

/// Default debounce window of the batch collector.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Capacity of the entity event channel.
const EVENT_CAPACITY: usize = 1024;

/// Capacity of the batch channel. Batches queued during a pass are merged.
const BATCH_CAPACITY: usize = 16;

/// Everything the orchestrator needs to know about a project.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Project root.
    pub root: PathBuf,
    /// Entity trees.
    pub roots: Vec<PathBuf>,
    pub output: PathBuf,
    pub cache: PathBuf,
    pub debounce: Duration,
    /// Emit the site and search indexes.
    pub globals: bool,
    /// External keyword targets.
    pub keywords: FxHashMap<String, String>,
}

impl Settings {
    pub fn new(root: impl Into<PathBuf>, roots: Vec<PathBuf>) -> Self {
        let root = root.into();
        Self {
            output: root.join("generated"),
            cache: root.join(crate::cache::CACHE_DIR),
            root,
            roots,
            debounce: DEFAULT_DEBOUNCE,
            globals: true,
            keywords: FxHashMap::default(),
        }
    }

    /// Intermediate modules live next to the cache.
    pub fn compiled_dir(&self) -> PathBuf {
        match self.cache.parent() {
            Some(parent) => parent.join("compiled"),
            None => self.cache.join("compiled"),
        }
    }
}

pub struct Orchestrator {
    settings: Settings,
    watcher: Arc<Watcher>,
    runner: Arc<PassRunner>,
    coordinators: Vec<Arc<LifecycleCoordinator>>,
}

impl Orchestrator {
    /// Set up collaborators for `settings`.
    ///
    /// An output root that cannot be written is fatal. Stale cache records
    /// are dropped here, once per process.
    pub fn new(settings: Settings, watcher: Arc<Watcher>) -> Result<Self, FatalError> {
        ensure_writable(&settings.output)
            .map_err(|e| FatalError::OutputRoot(settings.output.clone(), e))?;

        let cache = Arc::new(CacheStore::new(&settings.cache));
        if let Err(e) = cache.invalidate_if_stale() {
            crate::log!("cache"; "failed to check records: {}", e);
        }

        let ctx = BuildContext {
            root: settings.root.clone(),
            output_dir: settings.output.clone(),
            compiled_dir: settings.compiled_dir(),
            store: Arc::new(EntityStore::new()),
            parser: Arc::new(TomlSourceParser),
            compiler: Arc::new(DefinitionCompiler),
            renderer: Arc::new(TemplateRenderer::new()),
        };

        let coordinators = crate::entities::bindings(&settings.roots)
            .iter()
            .map(|binding| Arc::new(LifecycleCoordinator::new(binding, ctx.clone())))
            .collect();

        let globals = if settings.globals {
            crate::global::defaults()
        } else {
            Vec::new()
        };
        let runner = PassRunner::new(
            ctx,
            cache,
            Arc::new(FsOutputWriter::new(&settings.output)),
            globals,
            settings.keywords.clone(),
        );

        Ok(Self {
            settings,
            watcher,
            runner: Arc::new(runner),
            coordinators,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &EntityStore {
        self.runner.context().store()
    }

    pub fn phase(&self) -> Phase {
        self.runner.phase()
    }

    /// Scan the roots once and run a single pass over everything found.
    pub fn build_once(&self) -> Result<PassReport> {
        self.runner.enter(Phase::Collecting);
        let mut subscriptions = Vec::with_capacity(self.coordinators.len());
        for coordinator in &self.coordinators {
            let subscription = self
                .watcher
                .on_pattern(coordinator.pattern())
                .with_context(|| format!("invalid pattern `{}`", coordinator.pattern()))?;
            subscriptions.push((coordinator, subscription));
        }

        let scanned = self.watcher.initial_scan();
        crate::debug!("build"; "scanned {} files", scanned);

        let mut batch = Batch::new();
        for (coordinator, mut subscription) in subscriptions {
            let mut backlog = Backlog::new();
            while let Some(event) = subscription.try_recv() {
                backlog.push(event);
            }
            for event in backlog.drain() {
                for entity in coordinator.apply(&event) {
                    batch.push(EntityEvent::source(entity));
                }
            }
            self.watcher.unsubscribe(&subscription);
        }

        Ok(self.runner.run(batch))
    }

    /// Rebuild continuously until `shutdown` resolves.
    ///
    /// Shutdown closes the watcher, then drains the pipeline: batches still
    /// queued are built before returning.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let (batch_tx, mut batch_rx) = mpsc::channel(BATCH_CAPACITY);

        for coordinator in &self.coordinators {
            let subscription = self
                .watcher
                .on_pattern(coordinator.pattern())
                .with_context(|| format!("invalid pattern `{}`", coordinator.pattern()))?;
            tokio::spawn(Arc::clone(coordinator).run(
                subscription,
                self.watcher.ready_signal(),
                event_tx.clone(),
            ));
        }

        let mut subscriptions = Subscriptions::new(Arc::clone(&self.watcher), event_tx);
        let collector = tokio::spawn(batch::run_collector(event_rx, batch_tx, self.settings.debounce));

        let watcher = Arc::clone(&self.watcher);
        tokio::task::spawn_blocking(move || watcher.initial_scan());

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                batch = batch_rx.recv() => {
                    let Some(batch) = batch else { break };
                    let report = self.run_pass(batch, &mut batch_rx).await?;
                    subscriptions.prune(self.store());
                    subscriptions.refresh(&report.touched);
                    crate::debug!("watch"; "{} dependency subscriptions", subscriptions.len());
                    show_status(&report);
                }
            }
        }

        crate::log!("watch"; "shutting down");
        self.watcher.close();
        subscriptions.abort_all();
        drop(subscriptions);

        while let Some(batch) = batch_rx.recv().await {
            let report = self.run_pass(batch, &mut batch_rx).await?;
            show_status(&report);
        }
        collector.await.context("batch collector panicked")?;
        Ok(())
    }

    /// Run one pass on the blocking pool, folding in batches that queued up
    /// meanwhile.
    async fn run_pass(
        &self,
        mut batch: Batch,
        queued: &mut mpsc::Receiver<Batch>,
    ) -> Result<PassReport> {
        self.runner.enter(Phase::Collecting);
        while let Ok(more) = queued.try_recv() {
            batch.merge(more);
        }
        crate::debug!("watch"; "pass over {} entities", batch.len());
        let runner = Arc::clone(&self.runner);
        tokio::task::spawn_blocking(move || runner.run(batch))
            .await
            .context("build pass panicked")
    }
}

/// Create `dir` and prove a file can be written into it.
fn ensure_writable(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let probe = dir.join(".docweave-probe");
    fs::write(&probe, b"")?;
    fs::remove_file(&probe)
}

fn show_status(report: &PassReport) {
    if !report.is_ok() {
        let detail: Vec<String> = report.errors.iter().map(ToString::to_string).collect();
        crate::logger::status_error(
            &format!("{} error(s), {}", report.errors.len(), report.summary()),
            &detail.join("\n"),
        );
    } else if report.built.is_empty() && report.removed == 0 {
        crate::logger::status_unchanged("nothing to rebuild");
    } else {
        crate::logger::status_success(&report.summary());
    }
}
