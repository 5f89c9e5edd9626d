//! Runtime error types.

use colloquy_dialog::{BoxError, DialogError};
use thiserror::Error;

use crate::config::ConfigError;

/// Returned by a trigger filter when a message does **not** match.
///
/// The controller recognises this error and moves on to the next trigger.
/// All other errors are treated as genuine failures.
#[derive(Debug, Clone, Error)]
#[error("message skipped by trigger filter")]
pub struct TriggerSkipped;

/// Errors that can occur while routing a message.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The dialog engine failed.
    #[error(transparent)]
    Dialog(#[from] DialogError),

    /// Configuration was unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A trigger handler failed.
    #[error("trigger handler failed: {0}")]
    Trigger(#[source] BoxError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
