//! `clean`: remove everything a build produced.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::cache::CacheStore;
use crate::config::ProjectConfig;
use crate::log;

/// Remove output directory, cache records and compiled modules.
pub fn clean_project(config: &ProjectConfig) -> Result<()> {
    let settings = config.settings();
    remove_dir(&settings.output)?;
    CacheStore::new(&settings.cache)
        .clear()
        .with_context(|| format!("failed to clear cache `{}`", settings.cache.display()))?;
    remove_dir(&settings.compiled_dir())?;
    log!("clean"; "removed {}", settings.output.display());
    Ok(())
}

fn remove_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("failed to remove `{}`", dir.display()))?;
    }
    Ok(())
}
