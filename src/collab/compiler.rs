//! The shared pre-compile step.
//!
//! All compilable entities of a batch are compiled in one call; each entity
//! then reads its own intermediate module during `update`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use serde_json::Value;

use crate::entity::EntityId;
use crate::utils::path::id_to_safe_filename;

/// One source handed to the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileEntry {
    pub id: EntityId,
    pub source: PathBuf,
}

impl CompileEntry {
    pub fn new(id: EntityId, source: impl Into<PathBuf>) -> Self {
        Self {
            id,
            source: source.into(),
        }
    }
}

pub trait Compiler: Send + Sync {
    /// Compile `entries` into `out_dir`. Must be idempotent.
    fn compile(&self, entries: &[CompileEntry], out_dir: &Path) -> Result<()>;

    /// Read the intermediate module produced for `entry`.
    fn load_output(&self, entry: &CompileEntry, out_dir: &Path) -> Result<Value>;
}

/// Compiles TOML definitions into JSON modules, one file per entity.
///
/// Entries are compiled in parallel. A failing entry does not stop the
/// others; the call reports every failure at the end.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefinitionCompiler;

impl DefinitionCompiler {
    fn module_path(id: &EntityId, out_dir: &Path) -> PathBuf {
        out_dir.join(format!("{}.json", id_to_safe_filename(id.as_str())))
    }

    fn compile_one(entry: &CompileEntry, out_dir: &Path) -> Result<()> {
        let content = fs::read_to_string(&entry.source)
            .with_context(|| format!("reading {}", entry.source.display()))?;
        let table: toml::Table = toml::from_str(&content)
            .with_context(|| format!("parsing {}", entry.source.display()))?;
        let json = serde_json::to_string_pretty(&table)?;

        let target = Self::module_path(&entry.id, out_dir);
        if fs::read_to_string(&target).is_ok_and(|existing| existing == json) {
            return Ok(());
        }
        fs::write(&target, json).with_context(|| format!("writing {}", target.display()))?;
        Ok(())
    }
}

impl Compiler for DefinitionCompiler {
    fn compile(&self, entries: &[CompileEntry], out_dir: &Path) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(out_dir)
            .with_context(|| format!("creating {}", out_dir.display()))?;

        let failures: Vec<String> = entries
            .par_iter()
            .filter_map(|entry| {
                Self::compile_one(entry, out_dir)
                    .err()
                    .map(|err| format!("{}: {err:#}", entry.id))
            })
            .collect();

        if !failures.is_empty() {
            bail!("{} of {} entries failed: {}", failures.len(), entries.len(), failures.join("; "));
        }
        Ok(())
    }

    fn load_output(&self, entry: &CompileEntry, out_dir: &Path) -> Result<Value> {
        let path = Self::module_path(&entry.id, out_dir);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("no compiled module for `{}`", entry.id))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }
}
