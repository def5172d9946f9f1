//! File watcher.
//!
//! Normalizes filesystem notifications and fans them out to filtered
//! subscriptions. Implements the "Watcher-First" pattern: OS watches are
//! attached before the initial scan, so no change between scan and watch
//! is lost.
//!
//! Architecture:
//! ```text
//! notify thread → normalize → Hub → Subscription (pattern | paths | all)
//!                              ↑
//!         initial scan ────────┘  (Created per file, then ready)
//! ```
//!
//! A detached watcher has no OS backend; events are fed with
//! [`Watcher::inject`]. One-shot builds and tests use it.

// Per-path collapse of events buffered before readiness.
mod backlog;
// Event fan-out to subscribers.
mod hub;
// Glob matching.
mod pattern;
// Watch target attach/re-attach lifecycle.
mod roots;
// Initial directory scan.
mod scan;
// Shared fs event types.
mod types;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Sender, TryRecvError};
use notify::RecommendedWatcher;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::watch;

pub use backlog::Backlog;
pub use hub::Subscription;
pub use pattern::GlobPattern;
pub use types::{ChangeKind, FsEvent};

use hub::{Filter, Hub};
use roots::WatchRoots;

use crate::error::FatalError;
use crate::utils::path::normalize_path;

/// Poll interval of the backend thread.
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How often missing watch targets are retried.
const MAINTAIN_INTERVAL: Duration = Duration::from_secs(1);

enum Control {
    Watch(Vec<PathBuf>),
    Close,
}

pub struct Watcher {
    roots: Vec<PathBuf>,
    hub: Arc<Hub>,
    ready_tx: watch::Sender<bool>,
    scanned: AtomicBool,
    closed: AtomicBool,
    control: Option<Sender<Control>>,
    backend: Mutex<Option<JoinHandle<()>>>,
}

impl Watcher {
    /// Attach OS watches on `roots` and start the backend thread.
    ///
    /// Missing roots are tolerated and attached once they appear. Failing to
    /// create the backend is fatal.
    pub fn start(roots: Vec<PathBuf>) -> Result<Self, FatalError> {
        let roots: Vec<PathBuf> = roots.iter().map(|r| normalize_path(r)).collect();
        let first = roots.first().cloned().unwrap_or_default();

        // notify does not support async; bridge through a sync channel
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut backend = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })
        .map_err(|e| FatalError::Watcher(first.clone(), e))?;

        let mut watch_roots = WatchRoots::new(roots.clone());
        watch_roots
            .attach_existing(&mut backend)
            .map_err(|e| FatalError::Watcher(first, e))?;

        let hub = Arc::new(Hub::default());
        let (control_tx, control_rx) = channel::unbounded();
        let thread_hub = Arc::clone(&hub);
        let handle = std::thread::spawn(move || {
            run_backend(backend, watch_roots, notify_rx, control_rx, thread_hub);
        });

        Ok(Self::with_backend(roots, hub, Some(control_tx), Some(handle)))
    }

    /// Watcher without an OS backend.
    pub fn detached(roots: Vec<PathBuf>) -> Self {
        let roots = roots.iter().map(|r| normalize_path(r)).collect();
        Self::with_backend(roots, Arc::new(Hub::default()), None, None)
    }

    fn with_backend(
        roots: Vec<PathBuf>,
        hub: Arc<Hub>,
        control: Option<Sender<Control>>,
        backend: Option<JoinHandle<()>>,
    ) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            roots,
            hub,
            ready_tx,
            scanned: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            control,
            backend: Mutex::new(backend),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    // -------------------------------------------------------------------------
    // Readiness
    // -------------------------------------------------------------------------

    /// Emit `Created` for every existing file under the roots, then signal
    /// readiness. Only the first call scans; returns the number of files.
    pub fn initial_scan(&self) -> usize {
        if self.scanned.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let started = Instant::now();
        let files = scan::scan_files(&self.roots);
        for path in &files {
            self.dispatch(FsEvent::new(path.clone(), ChangeKind::Created));
        }
        crate::debug!("watch"; "scanned {} files in {:?}", files.len(), started.elapsed());
        self.ready_tx.send_replace(true);
        files.len()
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Resolves once the initial scan has completed.
    pub async fn ready(&self) {
        let mut rx = self.ready_tx.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Receiver of the readiness flag, for tasks that outlive a borrow.
    pub fn ready_signal(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    // -------------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------------

    /// Events for files matching `pattern`.
    pub fn on_pattern(&self, pattern: &str) -> Result<Subscription, regex::Error> {
        Ok(self.hub.subscribe(Filter::Pattern(GlobPattern::new(pattern)?)))
    }

    /// Events for exactly `paths` (or anything below a directory path).
    pub fn on_change(&self, paths: &[PathBuf]) -> Subscription {
        let paths: FxHashSet<PathBuf> = paths.iter().map(|p| normalize_path(p)).collect();
        self.hub.subscribe(Filter::Paths(paths))
    }

    /// Every event.
    pub fn on_any(&self) -> Subscription {
        self.hub.subscribe(Filter::All)
    }

    /// Add `paths` to the OS watch set and subscribe to them.
    pub fn watch(&self, paths: &[PathBuf]) -> Subscription {
        let normalized: Vec<PathBuf> = paths.iter().map(|p| normalize_path(p)).collect();
        if let Some(control) = &self.control
            && !self.is_closed()
        {
            let _ = control.send(Control::Watch(normalized.clone()));
        }
        self.hub.subscribe(Filter::Paths(normalized.into_iter().collect()))
    }

    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.hub.unsubscribe(subscription.id());
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.len()
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Feed an event by hand.
    pub fn inject(&self, path: impl Into<PathBuf>, kind: ChangeKind) {
        self.dispatch(FsEvent::new(normalize_path(&path.into()), kind));
    }

    fn dispatch(&self, event: FsEvent) {
        if self.is_closed() || types::is_ignored(&event.path) {
            return;
        }
        self.hub.dispatch(&event);
    }

    // -------------------------------------------------------------------------
    // Shutdown
    // -------------------------------------------------------------------------

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Release OS handles and end every subscription. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(control) = &self.control {
            let _ = control.send(Control::Close);
        }
        if let Some(handle) = self.backend.lock().take() {
            let _ = handle.join();
        }
        self.hub.close();
        crate::debug!("watch"; "closed");
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_backend(
    mut backend: RecommendedWatcher,
    mut roots: WatchRoots,
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    control_rx: channel::Receiver<Control>,
    hub: Arc<Hub>,
) {
    use std::sync::mpsc::RecvTimeoutError;

    let mut last_maintain = Instant::now();
    loop {
        loop {
            match control_rx.try_recv() {
                Ok(Control::Watch(paths)) => roots.add(&mut backend, paths),
                Ok(Control::Close) | Err(TryRecvError::Disconnected) => return,
                Err(TryRecvError::Empty) => break,
            }
        }

        match notify_rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) => dispatch_notify(&hub, &event),
            Ok(Err(e)) => crate::log!("watch"; "notify error: {}", e),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }

        if last_maintain.elapsed() >= MAINTAIN_INTERVAL {
            // Ensure watch targets remain attached.
            roots.maintain(&mut backend);
            last_maintain = Instant::now();
        }
    }
}

fn dispatch_notify(hub: &Hub, event: &notify::Event) {
    let Some(kind) = ChangeKind::from_notify(&event.kind) else {
        return;
    };
    crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

    for path in &event.paths {
        if types::is_ignored(path) {
            continue;
        }
        hub.dispatch(&FsEvent::new(normalize_path(path), kind));
    }
}
