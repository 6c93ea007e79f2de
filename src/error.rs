use std::io;

use generation::GenerationError;
use session_store::SessionStoreError;
use thiserror::Error;

/// Reasons one compose request is aborted.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("session '{session_id}' was not found")]
    SessionNotFound { session_id: String },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("session '{session_id}' already has a request in flight")]
    SessionBusy { session_id: String },

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("storage failure: {0}")]
    Persistence(#[source] SessionStoreError),

    #[error("failed to deliver stream record: {0}")]
    Delivery(#[source] io::Error),
}

impl ComposeError {
    /// True when the generative call stopped because the caller cancelled it.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Generation(error) if error.is_cancelled())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound { .. })
    }
}

impl From<SessionStoreError> for ComposeError {
    fn from(error: SessionStoreError) -> Self {
        match error {
            SessionStoreError::SessionNotFound { session_id } => {
                Self::SessionNotFound { session_id }
            }
            other => Self::Persistence(other),
        }
    }
}

/// Title generation failure. Logged by the orchestrator, never returned.
#[derive(Debug, Error)]
pub enum TitleError {
    #[error("title generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("model returned an empty title")]
    Empty,

    #[error("failed to store title: {0}")]
    Persistence(#[from] SessionStoreError),
}
