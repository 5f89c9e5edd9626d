//! # Colloquy Dialog
//!
//! Multi-turn dialog engine.
//!
//! A dialog ([`Conversation`]) is a set of named threads, each an ordered
//! list of steps, plus lifecycle hooks. The engine executes steps until a
//! question suspends the dialog, persists a [`DialogSession`] holding the
//! program counter and variables, and resumes from it when the reply arrives,
//! possibly in another process.
//!
//! ```rust,ignore
//! use colloquy_dialog::prelude::*;
//!
//! let mut onboarding = Conversation::new("onboarding");
//! onboarding
//!     .ask("What is your name?", Answer::capture("name"))
//!     .say("Nice to meet you, {{vars.name}}!");
//!
//! let dialogs = DialogSet::new().with(onboarding)?;
//! let engine = DialogEngine::new(dialogs, adapter, Arc::new(MemoryStorage::new()));
//!
//! engine.begin_dialog(&reference, "onboarding", Vars::new()).await?;
//! engine.continue_dialog(&IncomingMessage::text(reference, "Ann")).await?;
//! ```
//!
//! ## Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`vars`] / [`template`] | variable store and `{{vars.NAME}}` interpolation |
//! | [`content`] | message templates with render-time functions |
//! | [`step`] / [`thread`] / [`hooks`] | the dialog graph |
//! | [`conversation`] / [`registry`] | authoring surface and dialog registry |
//! | [`context`] | what handlers see and request |
//! | [`session`] / [`storage`] / [`lock`] | persisted state and per-key serialization |
//! | [`engine`] | turns and the step interpreter |

pub mod content;
pub mod context;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod handler;
pub mod hooks;
mod interpreter;
pub mod lock;
pub mod registry;
pub mod session;
pub mod step;
pub mod storage;
pub mod template;
pub mod thread;
pub mod vars;

pub use content::{MessageTemplate, RenderContext};
pub use context::DialogContext;
pub use conversation::Conversation;
pub use engine::{DialogEngine, DialogOptions, NoMatchPolicy, Turn, TurnReport};
pub use error::{DialogError, DialogResult, HandlerError, StorageError, StorageResult, StructureError};
pub use handler::{BoxError, BoxFuture, HandlerResult};
pub use hooks::HookRegistry;
pub use lock::ConcurrencyPolicy;
pub use registry::DialogSet;
pub use session::{DialogOutcome, DialogResults, DialogSession, Frame, SessionStatus};
pub use step::{Action, Answer, Condition, Question, Rule, Rules, Step};
pub use storage::{BoxedStorage, MemoryStorage, Storage};
pub use thread::{DEFAULT_THREAD, ThreadTable};
pub use vars::Vars;

#[doc(hidden)]
pub use serde_json::json as __json;

/// Prelude for common imports.
pub mod prelude {
    pub use super::content::{MessageTemplate, RenderContext};
    pub use super::context::DialogContext;
    pub use super::conversation::Conversation;
    pub use super::engine::{DialogEngine, DialogOptions, NoMatchPolicy, TurnReport};
    pub use super::error::{DialogError, DialogResult};
    pub use super::handler::HandlerResult;
    pub use super::lock::ConcurrencyPolicy;
    pub use super::registry::DialogSet;
    pub use super::session::{DialogOutcome, DialogResults, SessionStatus};
    pub use super::step::{Action, Answer, Rules};
    pub use super::storage::{MemoryStorage, Storage};
    pub use super::vars::Vars;
    pub use crate::vars;
}
