//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Find `config_name` by walking up from `start`.
///
/// ```text
/// /home/user/site/docs/guide/   ← start
/// /home/user/site/docweave.toml ← found
/// ```
pub fn find_config_file(start: &Path, config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}
