//! Error types for session lifecycle operations

use thiserror::Error;

use crate::session::SessionId;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while creating, accessing, or terminating sessions.
///
/// `UnknownSession`, `ExpiredSession`, and `StoppedSession` form the
/// invalid-session family. `ReplacedSession` is not a failure so much as a
/// signal: the manager auto-recreated a session in place of an invalid one
/// and is handing the caller the new id. A [`SessionHandle`](crate::manager::SessionHandle)
/// absorbs that signal before it ever reaches an end caller.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session with the given id exists in the store
    #[error("There is no session with id [{session_id}]")]
    UnknownSession { session_id: SessionId },

    /// Session found but its idle time exceeded its timeout
    #[error("Session with id [{session_id}] has expired")]
    ExpiredSession { session_id: SessionId },

    /// Session found but it was already explicitly stopped
    #[error("Session with id [{session_id}] has been stopped")]
    StoppedSession { session_id: SessionId },

    /// Session was invalid and the manager transparently created a replacement
    #[error("Session with id [{old_id}] is invalid and was replaced by [{new_id}]")]
    ReplacedSession { old_id: SessionId, new_id: SessionId },

    /// The originating host is not allowed to start sessions
    #[error("Host [{host}] is not authorized to start sessions")]
    HostUnauthorized { host: String },

    /// Underlying session store failure
    #[error("Session store error: {message}")]
    Storage { message: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SessionError {
    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for the invalid-session family (unknown, expired, or stopped).
    pub fn is_invalid(&self) -> bool {
        matches!(
            self,
            Self::UnknownSession { .. } | Self::ExpiredSession { .. } | Self::StoppedSession { .. }
        )
    }

    /// True when this error marks a session found but no longer usable
    /// (expired or stopped), i.e. a candidate for auto-recreation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ExpiredSession { .. } | Self::StoppedSession { .. }
        )
    }
}
