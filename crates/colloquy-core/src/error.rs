//! Error types for the Colloquy core layer.

use thiserror::Error;

// =============================================================================
// Adapter Errors
// =============================================================================

/// Errors that can occur while an adapter delivers an activity.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// The platform rejected or failed to accept the activity.
    #[error("delivery to '{platform}' failed: {reason}")]
    DeliveryFailed {
        /// Platform the activity was addressed to.
        platform: String,
        /// Reason for failure.
        reason: String,
    },

    /// The activity uses a feature the platform cannot express.
    #[error("'{platform}' does not support {feature}")]
    Unsupported {
        /// Platform name.
        platform: String,
        /// The unsupported feature.
        feature: &'static str,
    },

    /// Internal adapter error.
    #[error("adapter error: {0}")]
    Internal(String),
}

impl AdapterError {
    /// Creates a delivery failure.
    pub fn delivery(platform: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            platform: platform.into(),
            reason: reason.into(),
        }
    }

    /// Creates an internal adapter error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<std::io::Error> for AdapterError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;
