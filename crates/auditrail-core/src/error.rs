//! Error types for the audit crates.

use thiserror::Error;

use crate::event::Event;

/// Errors that can occur while recording or querying audit events.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Required fields were empty after defaulting.
    ///
    /// Carries the partially-defaulted event so the caller can inspect what
    /// was rejected.
    #[error("invalid event: missing required fields ({})", .missing.join(", "))]
    InvalidEvent {
        missing: Vec<&'static str>,
        event: Box<Event>,
    },

    /// The underlying medium failed or was unreachable.
    #[error("{backend} storage unavailable: {message}")]
    StorageUnavailable {
        backend: &'static str,
        message: String,
    },

    /// An event could not be encoded for (or decoded from) the medium.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation's deadline passed before it completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A backend was constructed with invalid settings.
    #[error("invalid storage configuration: {0}")]
    Configuration(String),
}

/// Coarse classification of an [`AuditError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidEvent,
    StorageUnavailable,
    Cancelled,
    DeadlineExceeded,
    Configuration,
}

impl ErrorKind {
    /// Whether the caller has to fix its input rather than try again.
    pub fn is_client_error(self) -> bool {
        matches!(self, Self::InvalidEvent)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEvent => write!(f, "INVALID_EVENT"),
            Self::StorageUnavailable => write!(f, "STORAGE_UNAVAILABLE"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::DeadlineExceeded => write!(f, "DEADLINE_EXCEEDED"),
            Self::Configuration => write!(f, "CONFIGURATION"),
        }
    }
}

impl AuditError {
    /// Wrap a medium failure from the named backend.
    pub fn storage(backend: &'static str, err: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable {
            backend,
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEvent { .. } => ErrorKind::InvalidEvent,
            Self::StorageUnavailable { .. } | Self::Serialization(_) => {
                ErrorKind::StorageUnavailable
            }
            Self::Cancelled => ErrorKind::Cancelled,
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// The rejected event, for [`AuditError::InvalidEvent`].
    pub fn rejected_event(&self) -> Option<&Event> {
        match self {
            Self::InvalidEvent { event, .. } => Some(event),
            _ => None,
        }
    }
}
