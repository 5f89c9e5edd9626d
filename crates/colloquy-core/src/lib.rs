//! # Colloquy Core
//!
//! Foundation types shared by every layer of the Colloquy framework.
//!
//! Platform adapters translate their native payloads into the normalized
//! shapes defined here and deliver rendered output back to the platform:
//!
//! - **Inbound**: [`IncomingMessage`] carries the text, event type and
//!   optional resolved intent of a user message.
//! - **Outbound**: [`Activity`] is the rendered content the bot emits.
//! - **Identity**: [`ConversationReference`] identifies a platform
//!   conversation and derives the key used to persist dialog state.
//! - **Delivery**: the [`Adapter`] trait is the only capability the dialog
//!   engine needs from a platform.
//!
//! ```text
//! ┌──────────┐  IncomingMessage  ┌────────────┐  Activity  ┌──────────┐
//! │ Platform │──────────────────▶│   Engine   │───────────▶│ Adapter  │
//! └──────────┘                   └────────────┘            └──────────┘
//! ```

pub mod adapter;
pub mod error;
pub mod message;
pub mod reference;

pub use adapter::{Adapter, BoxedAdapter, DeliveryReceipt};
pub use error::{AdapterError, AdapterResult};
pub use message::{Activity, IncomingMessage, QuickReply};
pub use reference::ConversationReference;

/// Prelude for common imports.
pub mod prelude {
    pub use super::adapter::{Adapter, BoxedAdapter, DeliveryReceipt};
    pub use super::error::{AdapterError, AdapterResult};
    pub use super::message::{Activity, IncomingMessage, QuickReply};
    pub use super::reference::ConversationReference;
}
