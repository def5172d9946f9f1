use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use super::types::is_ignored;
use crate::utils::path::normalize_path;

/// Every file under `roots`, sorted. Missing roots are skipped.
pub(super) fn scan_files(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = roots
        .iter()
        .filter(|root| root.is_dir())
        .flat_map(|root| walk(root))
        .collect();
    files.sort();
    files.dedup();
    files
}

fn walk(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .skip_hidden(true)
        .sort(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path())
        .filter(|path| !is_ignored(path))
        .map(|path| normalize_path(&path))
        .collect()
}
