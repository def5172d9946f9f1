use std::path::PathBuf;

use notify::{RecursiveMode, Watcher as _};
use rustc_hash::FxHashSet;

/// Watch-target consistency manager.
///
/// Responsibility:
/// - Attach existing roots (recursive) at startup
/// - Attach extra paths added at runtime; a missing path is covered by its
///   parent directory, or stays pending when that is missing too
/// - Re-attach targets that were removed and recreated
pub(super) struct WatchRoots {
    roots: Vec<PathBuf>,
    extra: FxHashSet<PathBuf>,
    attached: FxHashSet<PathBuf>,
}

impl WatchRoots {
    pub(super) fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            extra: FxHashSet::default(),
            attached: FxHashSet::default(),
        }
    }

    pub(super) fn attach_existing(&mut self, watcher: &mut impl notify::Watcher) -> notify::Result<()> {
        for path in &self.roots {
            if !path.exists() {
                continue;
            }
            watcher.watch(path, RecursiveMode::Recursive)?;
            self.attached.insert(path.clone());
        }
        Ok(())
    }

    /// Add paths outside the recursive roots.
    pub(super) fn add(&mut self, watcher: &mut impl notify::Watcher, paths: Vec<PathBuf>) {
        for path in paths {
            if self.roots.iter().any(|root| path.starts_with(root)) {
                continue;
            }
            if self.extra.insert(path.clone()) {
                self.attach_extra(watcher, &path);
            }
        }
    }

    fn attach_extra(&mut self, watcher: &mut impl notify::Watcher, path: &PathBuf) {
        let target = if path.exists() {
            path.clone()
        } else {
            match path.parent() {
                Some(parent) if parent.exists() => parent.to_path_buf(),
                _ => return,
            }
        };
        if self.attached.contains(&target) {
            return;
        }
        match watcher.watch(&target, RecursiveMode::NonRecursive) {
            Ok(()) => {
                crate::debug!("watch"; "watching {}", target.display());
                self.attached.insert(target);
            }
            Err(e) => crate::debug!("watch"; "cannot watch {}: {}", target.display(), e),
        }
    }

    pub(super) fn maintain(&mut self, watcher: &mut impl notify::Watcher) {
        // Drop stale handles for targets that no longer exist.
        self.attached.retain(|path| path.exists());

        for path in &self.roots {
            if self.attached.contains(path) || !path.exists() {
                continue;
            }
            if watcher.watch(path, RecursiveMode::Recursive).is_ok() {
                self.attached.insert(path.clone());
                crate::debug!("watch"; "re-attached watch: {}", path.display());
            }
        }

        let extra: Vec<_> = self.extra.iter().cloned().collect();
        for path in extra {
            self.attach_extra(watcher, &path);
        }
    }
}
