//! A set that announces its mutations.
//!
//! Entities keep their discovered dependency files here; the orchestrator
//! holds a receiver per live entity and re-subscribes the watcher whenever
//! the set changes.

use std::collections::BTreeSet;

use parking_lot::RwLock;
use tokio::sync::watch;

#[derive(Debug)]
pub struct ObservableSet<T> {
    items: RwLock<BTreeSet<T>>,
    tx: watch::Sender<Vec<T>>,
}

impl<T: Ord + Clone> ObservableSet<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self {
            items: RwLock::new(BTreeSet::new()),
            tx,
        }
    }

    /// Insert items. Notifies only if something was new.
    pub fn add(&self, items: impl IntoIterator<Item = T>) -> bool {
        let mut set = self.items.write();
        let mut changed = false;
        for item in items {
            changed |= set.insert(item);
        }
        self.publish_if(changed, &set)
    }

    /// Remove items. Notifies only if something was removed.
    pub fn remove<'a>(&self, items: impl IntoIterator<Item = &'a T>) -> bool
    where
        T: 'a,
    {
        let mut set = self.items.write();
        let mut changed = false;
        for item in items {
            changed |= set.remove(item);
        }
        self.publish_if(changed, &set)
    }

    /// Replace the whole content. Notifies only if membership differs.
    pub fn replace(&self, items: impl IntoIterator<Item = T>) -> bool {
        let next: BTreeSet<T> = items.into_iter().collect();
        let mut set = self.items.write();
        if *set == next {
            return false;
        }
        *set = next;
        self.publish_if(true, &set)
    }

    pub fn clear(&self) -> bool {
        let mut set = self.items.write();
        let changed = !set.is_empty();
        set.clear();
        self.publish_if(changed, &set)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.read().contains(item)
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.items.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Receiver of membership snapshots. The current snapshot is readable
    /// immediately through `borrow()`.
    pub fn changes(&self) -> watch::Receiver<Vec<T>> {
        self.tx.subscribe()
    }

    fn publish_if(&self, changed: bool, set: &BTreeSet<T>) -> bool {
        if changed {
            self.tx.send_replace(set.iter().cloned().collect());
        }
        changed
    }
}

impl<T: Ord + Clone> Default for ObservableSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_reports_change_once() {
        let set = ObservableSet::new();
        assert!(set.add(["a", "b"]));
        assert!(!set.add(["a"]));
        assert_eq!(set.snapshot(), vec!["a", "b"]);
    }

    #[test]
    fn test_receiver_sees_mutation() {
        let set = ObservableSet::new();
        let mut rx = set.changes();
        assert!(!rx.has_changed().unwrap());

        set.add([1, 2]);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), vec![1, 2]);

        set.add([2]);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_replace_same_membership_is_silent() {
        let set = ObservableSet::new();
        set.add(["x", "y"]);
        let mut rx = set.changes();

        assert!(!set.replace(["y", "x"]));
        assert!(!rx.has_changed().unwrap());

        assert!(set.replace(["z"]));
        assert_eq!(*rx.borrow_and_update(), vec!["z"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let set = ObservableSet::new();
        set.add([1, 2, 3]);
        assert!(set.remove([&2]));
        assert!(!set.remove([&9]));
        assert_eq!(set.len(), 2);
        assert!(set.clear());
        assert!(!set.clear());
        assert!(set.is_empty());
    }
}
