//! Entity source definitions.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use toml::{Table, Value};

/// Keys whose values name files the entity depends on.
const SINGLE_FILE_KEYS: &[&str] = &["body"];
const FILE_LIST_KEYS: &[&str] = &["assets"];

/// Parsed definition of one entity source file.
#[derive(Debug, Clone)]
pub struct Definition {
    /// The definition file itself.
    pub path: PathBuf,
    pub table: Table,
    /// Files referenced by the definition, resolved against its directory.
    pub dependencies: Vec<PathBuf>,
}

impl Definition {
    pub fn from_table(path: impl Into<PathBuf>, table: Table) -> Self {
        let path = path.into();
        let mut definition = Self {
            path,
            table,
            dependencies: Vec::new(),
        };
        definition.dependencies = definition.discover_dependencies();
        definition
    }

    /// Directory containing the definition.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new(""))
    }

    /// Resolve a definition-relative path.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        crate::utils::path::resolve_path(Path::new(relative), self.dir())
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.table.get(key).and_then(Value::as_str)
    }

    pub fn require_str(&self, key: &str) -> Result<&str> {
        match self.table.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
            Some(Value::String(_)) => bail!("`{key}` must not be empty"),
            Some(other) => bail!("`{key}` must be a string, found {}", other.type_str()),
            None => bail!("missing required field `{key}`"),
        }
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.table.get(key).and_then(Value::as_integer)
    }

    /// A string or an array of strings, as a list.
    pub fn str_list(&self, key: &str) -> Result<Vec<String>> {
        str_list(self.table.get(key), key)
    }

    /// Array of tables under `key`; absent means empty.
    pub fn tables(&self, key: &str) -> Result<Vec<&Table>> {
        match self.table.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_table()
                        .ok_or_else(|| anyhow!("`{key}` must be an array of tables"))
                })
                .collect(),
            Some(other) => bail!("`{key}` must be an array of tables, found {}", other.type_str()),
        }
    }

    fn discover_dependencies(&self) -> Vec<PathBuf> {
        let mut deps = Vec::new();
        for key in SINGLE_FILE_KEYS {
            if let Some(file) = self.str(key) {
                deps.push(self.resolve(file));
            }
        }
        for key in FILE_LIST_KEYS {
            if let Ok(files) = self.str_list(key) {
                deps.extend(files.iter().map(|f| self.resolve(f)));
            }
        }
        deps.sort();
        deps.dedup();
        deps
    }
}

pub(super) fn str_list(value: Option<&Value>, key: &str) -> Result<Vec<String>> {
    match value {
        None => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("`{key}` must contain only strings"))
            })
            .collect(),
        Some(other) => bail!("`{key}` must be a string or array, found {}", other.type_str()),
    }
}

/// Reads an entity source file into a [`Definition`].
pub trait SourceParser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<Definition>;
}

/// Definitions written as TOML tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlSourceParser;

impl SourceParser for TomlSourceParser {
    fn parse(&self, path: &Path) -> Result<Definition> {
        let content =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let table: Table =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Definition::from_table(path, table))
    }
}
