//! Colloquy Runtime - routing, configuration and logging for Colloquy bots.
//!
//! This crate provides:
//! - The [`Controller`] routing inbound messages to interrupts, the active
//!   dialog and trigger handlers
//! - Trigger builders on top of `tower` ([`hears`], [`on`], [`on_intent`])
//! - Layered configuration (`figment`) and logging (`tracing-subscriber`)
//! - [`FileStorage`], a filesystem session store
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//!
//! ```ignore
//! use colloquy_runtime::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let mut controller = Controller::from_config(&config, dialogs(), adapter())?;
//!     controller.trigger(hears(["hello"]).handler(|ctx: Arc<TriggerContext>| async move {
//!         ctx.begin_dialog("onboarding", Vars::new());
//!         Ok(())
//!     }));
//!
//!     controller.run(inbox).await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod storage;
pub mod trigger;

// Re-exports
pub use config::{ColloquyConfig, ConfigError, ConfigLoader, ConfigResult, load_config};
pub use controller::Controller;
pub use error::{RuntimeError, RuntimeResult, TriggerSkipped};
pub use logging::{LoggingBuilder, SpanEvents};
pub use storage::FileStorage;
pub use trigger::{
    BoxedTrigger, HandlerService, ServiceBuilderExt, TriggerBuilder, TriggerContext,
    TriggerPredicate, hears, hears_regex, on, on_intent, when,
};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{ColloquyConfig, ConfigLoader, load_config};
    pub use crate::controller::Controller;
    pub use crate::error::{RuntimeError, RuntimeResult};
    pub use crate::logging;
    pub use crate::trigger::{
        ServiceBuilderExt, TriggerContext, hears, hears_regex, on, on_intent, when,
    };
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
