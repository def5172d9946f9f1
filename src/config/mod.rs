//! Project configuration management for `docweave.toml`.
//!
//! | Section      | Purpose                                         |
//! |--------------|-------------------------------------------------|
//! | `[build]`    | Entity roots, output, cache, debounce, globals |
//! | `[keywords]` | External keyword targets (`Rust = "https://…"`)  |
//!
//! The file is located by searching upward from the working directory; its
//! parent is the project root and every configured path is resolved
//! against it.

mod build;
mod error;
mod util;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use build::BuildConfig;
pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError};

use crate::orchestrator::Settings;
use util::find_config_file;

/// Default config file name.
pub const CONFIG_FILE: &str = "docweave.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root, parent of the config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub build: BuildConfig,

    /// Keyword → external URL.
    #[serde(default)]
    pub keywords: BTreeMap<String, String>,
}

impl ProjectConfig {
    /// Locate `config_name` upward from `start`, parse and validate it.
    pub fn load(start: &Path, config_name: &Path) -> Result<Self, ConfigError> {
        let path = find_config_file(start, config_name)
            .ok_or_else(|| ConfigError::NotFound(config_name.to_path_buf()))?;
        Self::from_path(&path)
    }

    /// Parse and validate the config at `path`.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (mut config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            print_unknown_fields_warning(&ignored, path);
        }

        let path = crate::utils::path::normalize_path(path);
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.finalize(path, root);
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn finalize(&mut self, config_path: PathBuf, root: PathBuf) {
        self.build.normalize_paths(&root);
        self.config_path = config_path;
        self.root = root;
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();
        self.build.validate(&mut diag);
        for (keyword, url) in &self.keywords {
            if url.trim().is_empty() {
                diag.error("keywords", format!("keyword `{keyword}` has an empty target"));
            }
        }
        diag.into_result()
    }

    /// Orchestrator settings for this project.
    pub fn settings(&self) -> Settings {
        Settings {
            root: self.root.clone(),
            roots: self.build.roots.clone(),
            output: self.build.output.clone(),
            cache: self.build.cache.clone(),
            debounce: self.build.debounce(),
            globals: self.build.globals,
            keywords: self
                .keywords
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

fn print_unknown_fields_warning(fields: &[String], path: &Path) {
    let display_path = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_else(|| path.to_string_lossy());
    crate::log!("warning"; "unknown fields in {}, ignoring:", display_path);
    for field in fields {
        eprintln!("- {}", field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "");
        let config = ProjectConfig::from_path(&path).unwrap();

        let root = crate::utils::path::normalize_path(dir.path());
        assert_eq!(config.root, root);
        assert_eq!(config.build.roots, vec![root.join("docs")]);
        assert_eq!(config.build.output, root.join("generated"));
        assert_eq!(config.build.debounce_ms, 50);
        assert!(config.build.globals);
    }

    #[test]
    fn test_full_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[build]
roots = ["guides", "reference"]
output = "site"
debounce_ms = 120
globals = false

[keywords]
Rust = "https://www.rust-lang.org"
"#,
        );
        let config = ProjectConfig::from_path(&path).unwrap();
        assert_eq!(config.build.roots.len(), 2);
        assert!(config.build.roots[1].ends_with("reference"));

        let settings = config.settings();
        assert_eq!(settings.debounce.as_millis(), 120);
        assert!(!settings.globals);
        assert_eq!(
            settings.keywords.get("Rust").map(String::as_str),
            Some("https://www.rust-lang.org")
        );
    }

    #[test]
    fn test_unknown_fields_are_collected() {
        let (_, ignored) =
            ProjectConfig::parse_with_ignored("[build]\nroots = [\"docs\"]\nminify = true\n")
                .unwrap();
        assert_eq!(ignored, vec!["build.minify"]);
    }

    #[test]
    fn test_validation_errors() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "[build]\nroots = [\"docs\"]\noutput = \"docs\"\ndebounce_ms = 0\n",
        );
        let Err(ConfigError::Diagnostics(diag)) = ProjectConfig::from_path(&path) else {
            panic!("expected validation failure");
        };
        let fields: Vec<&str> = diag.errors().iter().map(|d| d.field).collect();
        assert_eq!(fields, vec!["build.output", "build.debounce_ms"]);
    }

    #[test]
    fn test_empty_roots_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[build]\nroots = []\n");
        assert!(matches!(
            ProjectConfig::from_path(&path),
            Err(ConfigError::Diagnostics(_))
        ));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[build\n");
        assert!(matches!(ProjectConfig::from_path(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_load_searches_upward() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "");
        let nested = dir.path().join("docs/guide");
        fs::create_dir_all(&nested).unwrap();

        let config = ProjectConfig::load(&nested, Path::new(CONFIG_FILE)).unwrap();
        assert_eq!(config.root, crate::utils::path::normalize_path(dir.path()));
        assert!(matches!(
            ProjectConfig::load(dir.path(), Path::new("missing-docweave.toml")),
            Err(ConfigError::NotFound(_))
        ));
    }
}
