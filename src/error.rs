//! Error taxonomy of the build engine.
//!
//! [`BuildError`] values are recoverable: they are logged with the entity id
//! and the pipeline continues. [`FatalError`] aborts the run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::entity::EntityId;

/// Recoverable, per-entity or per-batch failures.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    /// Source definition missing required fields or not parseable.
    #[error("failed to load `{id}`: {message}")]
    Load { id: EntityId, message: String },

    /// Content refresh from the compiled intermediate failed.
    #[error("failed to update `{id}`: {message}")]
    Update { id: EntityId, message: String },

    /// Artifact construction failed.
    #[error("failed to build `{id}`: {message}")]
    Build { id: EntityId, message: String },

    /// Artifacts were built but could not be written.
    #[error("failed to write `{id}`: {message}")]
    Write { id: EntityId, message: String },

    /// A global artifact failed to build or write.
    #[error("global `{name}` failed: {message}")]
    Global { name: &'static str, message: String },

    /// The shared pre-compile step failed for the whole batch.
    #[error("compilation failed: {message}")]
    Compile { message: String },
}

impl BuildError {
    pub fn load(id: &EntityId, err: &anyhow::Error) -> Self {
        Self::Load {
            id: id.clone(),
            message: format!("{err:#}"),
        }
    }

    pub fn update(id: &EntityId, err: &anyhow::Error) -> Self {
        Self::Update {
            id: id.clone(),
            message: format!("{err:#}"),
        }
    }

    pub fn build(id: &EntityId, err: &anyhow::Error) -> Self {
        Self::Build {
            id: id.clone(),
            message: format!("{err:#}"),
        }
    }

    pub fn write(id: &EntityId, err: &anyhow::Error) -> Self {
        Self::Write {
            id: id.clone(),
            message: format!("{err:#}"),
        }
    }

    pub fn global(name: &'static str, err: &anyhow::Error) -> Self {
        Self::Global {
            name,
            message: format!("{err:#}"),
        }
    }

    pub fn compile(err: &anyhow::Error) -> Self {
        Self::Compile {
            message: format!("{err:#}"),
        }
    }

    /// Entity the error belongs to, if it is entity scoped.
    pub fn entity_id(&self) -> Option<&EntityId> {
        match self {
            Self::Load { id, .. }
            | Self::Update { id, .. }
            | Self::Build { id, .. }
            | Self::Write { id, .. } => Some(id),
            Self::Global { .. } | Self::Compile { .. } => None,
        }
    }

    /// Short label used as the log module.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Load { .. } => "load",
            Self::Update { .. } => "update",
            Self::Build { .. } => "build",
            Self::Write { .. } => "write",
            Self::Global { .. } => "global",
            Self::Compile { .. } => "compile",
        }
    }
}

/// Failures that abort the run.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("failed to set up file watcher for `{0}`")]
    Watcher(PathBuf, #[source] notify::Error),

    #[error("output directory `{0}` is not writable")]
    OutputRoot(PathBuf, #[source] io::Error),
}

/// Log a recoverable error under its stage prefix.
pub fn report(error: &BuildError) {
    crate::log!(error.stage(); "{}", error);
}
