//! `build`: one scan and one pass, without OS watching.

use std::sync::Arc;

use anyhow::Result;

use crate::config::ProjectConfig;
use crate::log;
use crate::orchestrator::{Orchestrator, PassReport};
use crate::watcher::Watcher;

/// Build the project once.
///
/// Per-entity failures are reported and leave the exit status alone; only
/// fatal errors (unwritable output, invalid setup) propagate.
pub fn build_project(config: &ProjectConfig) -> Result<PassReport> {
    if config.build.clean {
        super::clean::clean_project(config)?;
    }

    let settings = config.settings();
    let watcher = Arc::new(Watcher::detached(settings.roots.clone()));
    let orchestrator = Orchestrator::new(settings, watcher)?;
    let report = orchestrator.build_once()?;

    if report.is_ok() {
        log!("build"; "{}", report.summary());
    } else {
        log!("build"; "{}, {} error(s)", report.summary(), report.errors.len());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_FILE;
    use crate::entities::fixture::write;
    use tempfile::TempDir;

    fn project() -> (TempDir, ProjectConfig) {
        let dir = tempfile::Builder::new().prefix("site").tempdir().unwrap();
        let root = dir.path();
        write(root, CONFIG_FILE, "[build]\nroots = [\"docs\"]\noutput = \"out\"\n");
        write(root, "docs/intro/index.md", "# Intro");
        write(root, "docs/intro/page.toml", "title = \"Intro\"\nbody = \"index.md\"");
        let config = ProjectConfig::from_path(&root.join(CONFIG_FILE)).unwrap();
        (dir, config)
    }

    #[test]
    fn test_build_then_clean() {
        let (_dir, config) = project();
        let report = build_project(&config).unwrap();
        assert!(report.is_ok());
        assert!(config.build.output.join("intro/index.html").exists());
        assert!(config.build.output.join("index.json").exists());
        assert!(config.build.cache.exists());

        super::super::clean::clean_project(&config).unwrap();
        assert!(!config.build.output.exists());
        assert!(!config.build.cache.exists());
        assert!(!config.settings().compiled_dir().exists());
    }

    #[test]
    fn test_clean_flag_forces_full_rebuild() {
        let (_dir, mut config) = project();
        build_project(&config).unwrap();
        assert!(build_project(&config).unwrap().built.is_empty());

        config.build.clean = true;
        let report = build_project(&config).unwrap();
        assert_eq!(report.built.len(), 1);
    }
}
