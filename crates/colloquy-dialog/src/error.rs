//! Error types for the dialog engine.
//!
//! | Error | Raised when | Effect on the turn |
//! |-------|-------------|--------------------|
//! | [`StructureError`] | a dialog, thread or step is missing | turn aborted, last checkpoint kept |
//! | [`HandlerError`] | a user hook, handler or render function failed | turn aborted, last checkpoint kept |
//! | [`StorageError`] | the session store failed | surfaced to the caller |
//! | [`AdapterError`] | delivery failed | surfaced to the caller |

use colloquy_core::AdapterError;
use thiserror::Error;

use crate::handler::BoxError;

// =============================================================================
// Structure Errors
// =============================================================================

/// The dialog graph does not contain what control flow asked for.
#[derive(Debug, Clone, Error)]
pub enum StructureError {
    /// No dialog with this name is registered.
    #[error("dialog '{dialog}' is not registered")]
    UnknownDialog {
        /// Missing dialog.
        dialog: String,
    },

    /// A goto or a persisted frame names an undefined thread.
    #[error("dialog '{dialog}' has no thread '{thread}'")]
    UnknownThread {
        /// Dialog being executed.
        dialog: String,
        /// Missing thread.
        thread: String,
    },

    /// A dialog with this name is already registered.
    #[error("dialog '{dialog}' is already registered")]
    DuplicateDialog {
        /// Duplicate dialog name.
        dialog: String,
    },

    /// One drive loop ran more steps than allowed, usually a goto cycle
    /// without any question.
    #[error("dialog '{dialog}' exceeded {limit} steps in a single turn")]
    StepLimitExceeded {
        /// Dialog on top of the stack when the limit was hit.
        dialog: String,
        /// Configured limit.
        limit: usize,
    },
}

// =============================================================================
// Handler Errors
// =============================================================================

/// A user-supplied function failed, with the position it failed at.
#[derive(Debug, Error)]
#[error("handler failed in {conversation} at {dialog}/{thread}#{step}: {source}")]
pub struct HandlerError {
    /// Storage key of the conversation.
    pub conversation: String,
    /// Dialog being executed.
    pub dialog: String,
    /// Thread being executed.
    pub thread: String,
    /// Step index within the thread.
    pub step: usize,
    /// Error returned by the handler.
    #[source]
    pub source: BoxError,
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors raised by a session store.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// A stored session could not be encoded or decoded.
    #[error("failed to (de)serialize session '{key}': {reason}")]
    Serialization {
        /// Storage key.
        key: String,
        /// Reason for failure.
        reason: String,
    },

    /// The backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Creates a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Creates a serialization error.
    pub fn serialization(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Serialization {
            key: key.into(),
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

// =============================================================================
// Dialog Errors
// =============================================================================

/// Errors surfaced by the dialog engine.
#[derive(Debug, Error)]
pub enum DialogError {
    /// Structural problem in the dialog graph.
    #[error(transparent)]
    Structure(#[from] StructureError),

    /// A user handler failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// The session store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Delivery of an activity failed.
    #[error(transparent)]
    Delivery(#[from] AdapterError),

    /// Another turn holds this conversation and the policy rejects waiting.
    #[error("conversation '{0}' is busy with another turn")]
    Busy(String),
}

/// Result type for dialog engine operations.
pub type DialogResult<T> = Result<T, DialogError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
