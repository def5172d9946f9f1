//! Artifact writing.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::entity::BuiltOutput;

pub trait OutputWriter: Send + Sync {
    /// Write `outputs`, returning how many files actually changed on disk.
    fn write(&self, outputs: &[BuiltOutput]) -> Result<usize>;

    /// Remove `paths` if present, returning how many files were removed.
    /// Paths that could never have been written are ignored.
    fn remove(&self, paths: &[PathBuf]) -> Result<usize>;
}

/// Writes artifacts below an output directory.
///
/// Output paths are relative to the root. Content identical to the file on
/// disk is not rewritten.
#[derive(Debug, Clone)]
pub struct FsOutputWriter {
    root: PathBuf,
}

impl FsOutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target(&self, relative: &Path) -> Result<PathBuf> {
        let escapes = relative.components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        if escapes {
            bail!("output path `{}` escapes the output directory", relative.display());
        }
        Ok(self.root.join(relative))
    }

    /// Remove empty directories between `dir` and the root.
    fn prune_empty(&self, mut dir: Option<&Path>) {
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            if fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
    }
}

impl OutputWriter for FsOutputWriter {
    fn write(&self, outputs: &[BuiltOutput]) -> Result<usize> {
        let mut written = 0;
        for output in outputs {
            let target = self.target(&output.path)?;
            if fs::read_to_string(&target).is_ok_and(|existing| existing == output.content) {
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(&target, &output.content)
                .with_context(|| format!("writing {}", target.display()))?;
            crate::debug!("write"; "{}", output.path.display());
            written += 1;
        }
        Ok(written)
    }

    fn remove(&self, paths: &[PathBuf]) -> Result<usize> {
        let mut removed = 0;
        for path in paths {
            let Ok(target) = self.target(path) else {
                crate::debug!("remove"; "skipping `{}`", path.display());
                continue;
            };
            match fs::remove_file(&target) {
                Ok(()) => {
                    removed += 1;
                    self.prune_empty(target.parent());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("removing {}", target.display()));
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_skips_identical_content() {
        let dir = TempDir::new().unwrap();
        let writer = FsOutputWriter::new(dir.path());
        let outputs = vec![BuiltOutput::new("guide/intro.html", "<p>1</p>")];

        assert_eq!(writer.write(&outputs).unwrap(), 1);
        assert_eq!(writer.write(&outputs).unwrap(), 0);
        assert_eq!(
            fs::read_to_string(dir.path().join("guide/intro.html")).unwrap(),
            "<p>1</p>"
        );
    }

    #[test]
    fn test_remove_is_idempotent_and_prunes() {
        let dir = TempDir::new().unwrap();
        let writer = FsOutputWriter::new(dir.path());
        writer.write(&[BuiltOutput::new("a/b/c.html", "x")]).unwrap();

        let paths = vec![PathBuf::from("a/b/c.html")];
        assert_eq!(writer.remove(&paths).unwrap(), 1);
        assert_eq!(writer.remove(&paths).unwrap(), 0);
        assert!(!dir.path().join("a").exists());
        assert!(dir.path().exists());
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let writer = FsOutputWriter::new(dir.path());
        assert!(writer.write(&[BuiltOutput::new("../x.html", "x")]).is_err());
        assert_eq!(writer.remove(&[PathBuf::from("../x.html")]).unwrap(), 0);
    }
}
