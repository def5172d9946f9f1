//! Outcome of one execution of a discrete, named build step.

use crate::error::BuildError;

/// Tagged state of a build step. Callers branch on it instead of
/// propagating errors, so one failing entity never stops a batch.
#[derive(Debug, Clone, Default)]
pub enum BuildState<T> {
    /// The step has not produced a result yet.
    #[default]
    Pending,
    /// The step finished with a result.
    Done(T),
    /// The step failed with one or more errors.
    Error(Vec<BuildError>),
}

impl<T> BuildState<T> {
    pub fn failed(error: BuildError) -> Self {
        Self::Error(vec![error])
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Errors carried by an `Error` state; empty otherwise.
    pub fn errors(&self) -> &[BuildError] {
        match self {
            Self::Error(errors) => errors,
            Self::Pending | Self::Done(_) => &[],
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> BuildState<U> {
        match self {
            Self::Pending => BuildState::Pending,
            Self::Done(value) => BuildState::Done(f(value)),
            Self::Error(errors) => BuildState::Error(errors),
        }
    }

    /// The result if done, `fallback` for pending and error states.
    pub fn unwrap_or(self, fallback: T) -> T {
        match self {
            Self::Done(value) => value,
            Self::Pending | Self::Error(_) => fallback,
        }
    }
}
