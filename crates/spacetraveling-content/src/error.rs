// File: spacetraveling-content/src/error.rs
// Purpose: Failures raised while talking to the content source

use thiserror::Error;

/// Errors returned by content sources and the pagination engine.
///
/// The variants carry rendered messages rather than the underlying error
/// values so that a failed fetch can be cloned into every caller waiting on
/// it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    /// The content source could not be reached, or answered with a
    /// non-success status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The requested identifier has no entry.
    #[error("no '{type_name}' entry with identifier '{id}'")]
    NotFound { type_name: String, id: String },

    /// The payload was readable but did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A cursor that does not point at the configured content source.
    #[error("cursor does not belong to the configured content source: {0}")]
    InvalidCursor(String),
}

impl ContentError {
    pub fn not_found(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            type_name: type_name.into(),
            id: id.into(),
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Short category name, used as a structured log field.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::NotFound { .. } => "not_found",
            Self::MalformedResponse(_) => "malformed_response",
            Self::InvalidCursor(_) => "invalid_cursor",
        }
    }
}

impl From<reqwest::Error> for ContentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ContentError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ContentError>;
