//! Adapter capability.
//!
//! An adapter is the bridge between the framework and one messaging
//! platform. The dialog engine only ever asks it to deliver a rendered
//! [`Activity`]; receiving and normalizing platform payloads happens before
//! the engine is involved.
//!
//! # Example
//!
//! ```rust,ignore
//! struct ConsoleAdapter;
//!
//! #[async_trait]
//! impl Adapter for ConsoleAdapter {
//!     fn name(&self) -> &str {
//!         "console"
//!     }
//!
//!     async fn send(
//!         &self,
//!         activity: &Activity,
//!         _reference: &ConversationReference,
//!     ) -> AdapterResult<DeliveryReceipt> {
//!         println!("{}", activity.text_or_empty());
//!         Ok(DeliveryReceipt::new("console"))
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AdapterResult;
use crate::message::Activity;
use crate::reference::ConversationReference;

/// Acknowledgement returned by a platform after delivering an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Platform that accepted the activity.
    pub platform: String,
    /// Platform-assigned message id, when the platform returns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl DeliveryReceipt {
    /// Creates a receipt without a message id.
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            id: None,
        }
    }

    /// Attaches the platform message id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Outbound delivery capability of a platform adapter.
///
/// Implementations must deliver activities in the order `send` is awaited;
/// the engine issues sends sequentially and never batches them.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Platform name, used in logs and receipts.
    fn name(&self) -> &str;

    /// Delivers a rendered activity to the referenced conversation.
    async fn send(
        &self,
        activity: &Activity,
        reference: &ConversationReference,
    ) -> AdapterResult<DeliveryReceipt>;
}

/// A shared adapter trait object.
pub type BoxedAdapter = Arc<dyn Adapter>;
