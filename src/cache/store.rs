//! Cache store: validity checks and persistence of per-entity records.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::record::{CACHE_VERSION, CacheRecord};
use crate::utils::path::id_to_safe_filename;

/// Version marker file name
const VERSION_FILE: &str = "VERSION";

/// Record file extension
const RECORD_EXT: &str = "json";

/// Persisted fingerprint records, one file per entity id.
///
/// Writers of distinct ids touch disjoint files. Writers of the same id are
/// serialized through a per-id lock, and every write is a temp file + rename,
/// so a reader never sees a torn record.
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `id`'s cached output is still valid for `paths`.
    ///
    /// False when no record exists, when membership differs, or when any
    /// fingerprint differs (a missing file included).
    pub fn is_valid(&self, id: &str, paths: &[PathBuf]) -> bool {
        self.load(id).is_some_and(|record| record.matches(paths))
    }

    /// Fingerprint `paths` and persist them as `id`'s record.
    pub fn update(&self, id: &str, paths: &[PathBuf]) -> io::Result<()> {
        self.save(id, &CacheRecord::capture(paths))
    }

    /// Persist a record captured earlier, typically before the build that
    /// it vouches for.
    pub fn save(&self, id: &str, record: &CacheRecord) -> io::Result<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock();

        self.ensure_root()?;

        let json = serde_json::to_string_pretty(&record).map_err(io::Error::other)?;

        let target = self.record_path(id);
        let tmp = target.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &target)?;

        crate::debug!("cache"; "updated `{}` ({} paths)", id, record.len());
        Ok(())
    }

    /// Read `id`'s record, if present and parseable.
    pub fn load(&self, id: &str) -> Option<CacheRecord> {
        let content = fs::read_to_string(self.record_path(id)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Drop `id`'s record.
    pub fn remove(&self, id: &str) -> io::Result<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock();

        match fs::remove_file(self.record_path(id)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Drop stale records. Run once at process start.
    ///
    /// If the persisted format version differs from [`CACHE_VERSION`] every
    /// record is dropped; otherwise records that fail to parse or reference
    /// paths that no longer exist are dropped. Returns the number dropped.
    pub fn invalidate_if_stale(&self) -> io::Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }

        let version = fs::read_to_string(self.root.join(VERSION_FILE)).unwrap_or_default();
        if version.trim() != version_marker() {
            let dropped = self.record_files()?.len();
            self.clear()?;
            crate::debug!("cache"; "version changed, dropped {} records", dropped);
            return Ok(dropped);
        }

        let mut dropped = 0;
        for file in self.record_files()? {
            let stale = fs::read_to_string(&file)
                .ok()
                .and_then(|content| serde_json::from_str::<CacheRecord>(&content).ok())
                .is_none_or(|record| record.references_missing());

            if stale {
                fs::remove_file(&file)?;
                dropped += 1;
            }
        }

        if dropped > 0 {
            crate::debug!("cache"; "dropped {} stale records", dropped);
        }
        Ok(dropped)
    }

    /// Remove the whole cache directory.
    pub fn clear(&self) -> io::Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Private
    // -------------------------------------------------------------------------

    fn record_path(&self, id: &str) -> PathBuf {
        self.root
            .join(format!("{}.{RECORD_EXT}", id_to_safe_filename(id)))
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(id.to_string()).or_default().value())
    }

    fn ensure_root(&self) -> io::Result<()> {
        let version_path = self.root.join(VERSION_FILE);
        if version_path.exists() {
            return Ok(());
        }
        fs::create_dir_all(&self.root)?;
        fs::write(version_path, version_marker())
    }

    fn record_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == RECORD_EXT) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

fn version_marker() -> String {
    format!("{CACHE_VERSION}:{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, CacheStore, PathBuf) {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));
        let file = dir.path().join("a.src");
        fs::write(&file, "first").unwrap();
        (dir, store, file)
    }

    #[test]
    fn test_no_record_is_invalid() {
        let (_dir, store, file) = setup();
        assert!(!store.is_valid("page/a", &[file]));
    }

    #[test]
    fn test_update_then_valid() {
        let (_dir, store, file) = setup();
        store.update("page/a", std::slice::from_ref(&file)).unwrap();
        assert!(store.is_valid("page/a", &[file]));
    }

    #[test]
    fn test_content_change_invalidates() {
        let (_dir, store, file) = setup();
        store.update("page/a", std::slice::from_ref(&file)).unwrap();

        fs::write(&file, "second").unwrap();
        assert!(!store.is_valid("page/a", &[file]));
    }

    #[test]
    fn test_membership_change_invalidates() {
        let (dir, store, file) = setup();
        store.update("page/a", std::slice::from_ref(&file)).unwrap();

        let extra = dir.path().join("b.md");
        fs::write(&extra, "dep").unwrap();
        assert!(!store.is_valid("page/a", &[file.clone(), extra]));
        assert!(!store.is_valid("page/a", &[]));
    }

    #[test]
    fn test_missing_file_invalidates() {
        let (_dir, store, file) = setup();
        store.update("page/a", std::slice::from_ref(&file)).unwrap();

        fs::remove_file(&file).unwrap();
        assert!(!store.is_valid("page/a", &[file]));
    }

    #[test]
    fn test_saved_snapshot_predates_later_edit() {
        let (_dir, store, file) = setup();
        let record = CacheRecord::capture(std::slice::from_ref(&file));
        fs::write(&file, "edited during build").unwrap();
        store.save("page/a", &record).unwrap();
        assert!(!store.is_valid("page/a", std::slice::from_ref(&file)));
    }

    #[test]
    fn test_record_keeps_outputs_and_keywords() {
        let (_dir, store, file) = setup();
        let record = CacheRecord::capture(std::slice::from_ref(&file))
            .with_build(vec![PathBuf::from("a/index.html")], vec!["B".to_string()]);
        store.save("page/a", &record).unwrap();

        let loaded = store.load("page/a").unwrap();
        assert_eq!(loaded.outputs(), [PathBuf::from("a/index.html")]);
        assert_eq!(loaded.keywords(), ["B".to_string()]);
    }

    #[test]
    fn test_ids_that_flatten_alike_are_independent() {
        let (_dir, store, file) = setup();
        store.update("a/b", std::slice::from_ref(&file)).unwrap();
        assert!(!store.is_valid("a_b", std::slice::from_ref(&file)));
        store.update("a_b", std::slice::from_ref(&file)).unwrap();
        store.remove("a_b").unwrap();
        assert!(store.is_valid("a/b", std::slice::from_ref(&file)));
    }

    #[test]
    fn test_ids_are_independent() {
        let (_dir, store, file) = setup();
        store.update("page/a", std::slice::from_ref(&file)).unwrap();
        assert!(!store.is_valid("page/b", &[file]));
    }

    #[test]
    fn test_invalidate_drops_records_with_missing_paths() {
        let (dir, store, file) = setup();
        let other = dir.path().join("b.src");
        fs::write(&other, "b").unwrap();
        store.update("a", std::slice::from_ref(&file)).unwrap();
        store.update("b", std::slice::from_ref(&other)).unwrap();

        fs::remove_file(&other).unwrap();
        assert_eq!(store.invalidate_if_stale().unwrap(), 1);
        assert!(store.load("a").is_some());
        assert!(store.load("b").is_none());
    }

    #[test]
    fn test_invalidate_drops_everything_on_version_change() {
        let (_dir, store, file) = setup();
        store.update("a", std::slice::from_ref(&file)).unwrap();
        fs::write(store.root().join(VERSION_FILE), "0:old").unwrap();

        assert_eq!(store.invalidate_if_stale().unwrap(), 1);
        assert!(!store.is_valid("a", &[file]));
    }

    #[test]
    fn test_invalidate_without_store_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("nothing"));
        assert_eq!(store.invalidate_if_stale().unwrap(), 0);
    }

    #[test]
    fn test_concurrent_updates_for_distinct_ids() {
        use rayon::prelude::*;

        let (_dir, store, file) = setup();
        let ids: Vec<String> = (0..16).map(|i| format!("page/{i}")).collect();
        ids.par_iter()
            .for_each(|id| store.update(id, std::slice::from_ref(&file)).unwrap());

        assert!(ids.iter().all(|id| store.is_valid(id, std::slice::from_ref(&file))));
    }
}
