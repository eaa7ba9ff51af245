//! Build and storage failures

use std::time::Duration;
use thiserror::Error;

/// Why a path could not be generated.
///
/// `Clone` because one build's outcome is handed to every request waiting
/// on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The content source could not be reached
    #[error("transport error: {0}")]
    Transport(String),

    /// The content source has nothing for this path
    #[error("not found: {0}")]
    NotFound(String),

    /// The build ran past its time budget
    #[error("building {path} exceeded {budget:?}")]
    BuildTimeout { path: String, budget: Duration },

    /// The build failed for another reason
    #[error("build failed: {0}")]
    Build(String),

    /// The render store failed
    #[error("storage error: {0}")]
    Storage(String),
}

impl GenerationError {
    /// Whether the next request should try the build again
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

impl From<anyhow::Error> for GenerationError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }
}
