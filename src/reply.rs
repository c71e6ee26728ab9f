use thiserror::Error;

use crate::state::FALLBACK_REPLY;

/// Why a completion attempt produced no answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("credential missing")]
    MissingCredential,

    #[error("service error (HTTP {status})")]
    Service { status: u16 },

    #[error("network failure: {0}")]
    Network(String),
}

impl CompletionError {
    /// HTTP status carried by the failure, if the service answered at all.
    pub fn code(&self) -> Option<u16> {
        match self {
            CompletionError::Service { status } => Some(*status),
            _ => None,
        }
    }
}

/// Normalized outcome of one completion attempt. Never a raw transport error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Failed(CompletionError),
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Text(_))
    }

    /// The text to show in the transcript for this outcome.
    pub fn into_text(self) -> String {
        match self {
            Reply::Text(text) if !text.trim().is_empty() => text,
            _ => FALLBACK_REPLY.to_string(),
        }
    }
}
