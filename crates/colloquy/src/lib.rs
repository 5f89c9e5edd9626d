//! # Colloquy
//!
//! A conversational bot framework built around multi-turn dialogs whose
//! state survives between messages.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐     ┌────────────┐     ┌──────────────┐     ┌─────────┐
//! │ Adapter │────▶│ Controller │────▶│ DialogEngine │────▶│ Storage │
//! │ (inbox) │     │ (triggers) │     │    (turns)   │     │         │
//! └─────────┘     └────────────┘     └──────────────┘     └─────────┘
//!      ▲                                    │
//!      └────────────── send ────────────────┘
//! ```
//!
//! - **Adapter**: delivers rendered activities to a platform
//! - **Controller**: routes each message to interrupts, the active dialog or triggers
//! - **DialogEngine**: runs dialog steps until a question suspends them
//! - **Storage**: keeps one session per conversation between turns
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use colloquy::prelude::*;
//!
//! let mut onboarding = Conversation::new("onboarding");
//! onboarding
//!     .ask("What is your name?", Answer::capture("name"))
//!     .say("Nice to meet you, {{vars.name}}!");
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.logging);
//!
//! let mut controller =
//!     Controller::from_config(&config, DialogSet::new().with(onboarding)?, adapter)?;
//! controller.trigger(hears(["hello"]).handler(|ctx: Arc<TriggerContext>| async move {
//!     ctx.begin_dialog("onboarding", Vars::new());
//!     Ok(())
//! }));
//! controller.run(inbox).await;
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use colloquy_core as core;
pub use colloquy_dialog as dialog;
pub use colloquy_runtime as runtime;

pub use colloquy_dialog::vars;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use colloquy::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Platform types
    pub use colloquy_core::{
        Activity, Adapter, AdapterError, AdapterResult, BoxedAdapter, ConversationReference,
        DeliveryReceipt, IncomingMessage, QuickReply,
    };

    // Dialog authoring
    pub use colloquy_dialog::BoxError;
    pub use colloquy_dialog::prelude::*;

    // Routing and setup
    pub use colloquy_runtime::prelude::*;
    pub use colloquy_runtime::{FileStorage, TriggerSkipped};
}
