//! Fan-out of normalized events to filtered subscribers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::mpsc;

use super::pattern::GlobPattern;
use super::types::{ChangeKind, FsEvent};

#[derive(Debug)]
pub(super) enum Filter {
    All,
    Pattern(GlobPattern),
    Paths(FxHashSet<PathBuf>),
}

impl Filter {
    fn accepts(&self, event: &FsEvent) -> bool {
        match self {
            Self::All => true,
            Self::Pattern(glob) => {
                glob.matches(&event.path)
                    // A removed directory may have held matching files.
                    || (event.kind == ChangeKind::Removed
                        && event.path.starts_with(glob.base())
                        && event.path.extension().is_none())
            }
            Self::Paths(paths) => paths.iter().any(|p| {
                event.path == *p
                    || event.path.starts_with(p)
                    || (event.kind == ChangeKind::Removed && p.starts_with(&event.path))
            }),
        }
    }
}

struct Subscriber {
    id: u64,
    filter: Filter,
    tx: mpsc::UnboundedSender<FsEvent>,
}

/// Receiving end of a watcher subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<FsEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event; `None` once the watcher is closed.
    pub async fn recv(&mut self) -> Option<FsEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<FsEvent> {
        self.rx.try_recv().ok()
    }
}

#[derive(Default)]
pub(super) struct Hub {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl Hub {
    pub(super) fn subscribe(&self, filter: Filter) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(Subscriber { id, filter, tx });
        Subscription { id, rx }
    }

    pub(super) fn dispatch(&self, event: &FsEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| !sub.tx.is_closed());
        for sub in subscribers.iter() {
            if sub.filter.accepts(event) {
                let _ = sub.tx.send(event.clone());
            }
        }
    }

    pub(super) fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().retain(|sub| sub.id != id);
    }

    /// Drop every sender so receivers observe the end of the stream.
    pub(super) fn close(&self) {
        self.subscribers.lock().clear();
    }

    pub(super) fn len(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| !sub.tx.is_closed());
        subscribers.len()
    }
}
