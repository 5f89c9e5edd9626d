//! Dialog engine and turns.
//!
//! [`DialogEngine`] owns the dialog registry and the adapter and storage
//! collaborators. All work happens inside a [`Turn`]: opening one acquires
//! the conversation's lock and loads its session, every operation on it
//! checkpoints progress to storage, and dropping it releases the lock.
//!
//! ```rust,ignore
//! let engine = DialogEngine::new(dialogs, adapter, Arc::new(MemoryStorage::new()));
//!
//! // One-shot helpers open and finish a turn internally.
//! engine.begin_dialog(&reference, "onboarding", Vars::new()).await?;
//! let report = engine.continue_dialog(&message).await?;
//!
//! // Or drive a turn by hand.
//! let mut turn = engine.turn(&reference).await?;
//! if !turn.continue_dialog(&message).await? {
//!     turn.begin_dialog("fallback", Vars::new()).await?;
//! }
//! let report = turn.finish();
//! ```

use std::sync::Arc;

use colloquy_core::{Activity, BoxedAdapter, ConversationReference, IncomingMessage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::DialogResult;
use crate::lock::{ConcurrencyPolicy, TurnGuard, TurnLocks};
use crate::registry::DialogSet;
use crate::session::{DialogResults, DialogSession, SessionStatus};
use crate::storage::BoxedStorage;
use crate::vars::Vars;

/// Default for [`DialogOptions::max_steps_per_turn`].
pub const DEFAULT_MAX_STEPS_PER_TURN: usize = 1000;

/// What to do with a reply that matches no rule of a rule list without a
/// default rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoMatchPolicy {
    /// Emit the question again.
    #[default]
    Reprompt,
    /// Stay suspended silently.
    Wait,
}

/// Engine tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogOptions {
    /// Maximum steps one drive loop may execute.
    pub max_steps_per_turn: usize,
    /// Behavior on concurrent turns for one conversation.
    pub concurrency: ConcurrencyPolicy,
    /// Behavior on unmatched replies.
    pub no_match: NoMatchPolicy,
}

impl Default for DialogOptions {
    fn default() -> Self {
        Self {
            max_steps_per_turn: DEFAULT_MAX_STEPS_PER_TURN,
            concurrency: ConcurrencyPolicy::default(),
            no_match: NoMatchPolicy::default(),
        }
    }
}

/// Outcome of one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReport {
    /// Activities delivered during the turn, in order.
    pub sent: Vec<Activity>,
    /// Session status after the turn. [`SessionStatus::Ended`] when no
    /// session remains.
    pub status: SessionStatus,
    /// Dialogs that ended during the turn, innermost first.
    pub results: Vec<DialogResults>,
}

impl TurnReport {
    pub(crate) fn new() -> Self {
        Self {
            sent: Vec::new(),
            status: SessionStatus::Ended,
            results: Vec::new(),
        }
    }

    /// Texts of the delivered activities.
    pub fn texts(&self) -> Vec<&str> {
        self.sent.iter().map(Activity::text_or_empty).collect()
    }
}

/// The dialog engine.
#[derive(Clone)]
pub struct DialogEngine {
    dialogs: Arc<DialogSet>,
    adapter: BoxedAdapter,
    storage: BoxedStorage,
    locks: TurnLocks,
    options: DialogOptions,
}

impl DialogEngine {
    /// Creates an engine with default options.
    pub fn new(dialogs: DialogSet, adapter: BoxedAdapter, storage: BoxedStorage) -> Self {
        Self {
            dialogs: Arc::new(dialogs),
            adapter,
            storage,
            locks: TurnLocks::new(),
            options: DialogOptions::default(),
        }
    }

    /// Replaces the engine options.
    pub fn with_options(mut self, options: DialogOptions) -> Self {
        self.options = options;
        self
    }

    /// Registered dialogs.
    pub fn dialogs(&self) -> &DialogSet {
        &self.dialogs
    }

    /// Delivery adapter.
    pub fn adapter(&self) -> &BoxedAdapter {
        &self.adapter
    }

    /// Session storage.
    pub fn storage(&self) -> &BoxedStorage {
        &self.storage
    }

    /// Engine options.
    pub fn options(&self) -> &DialogOptions {
        &self.options
    }

    /// Opens a turn for `reference`, waiting for or rejecting a running one
    /// according to [`DialogOptions::concurrency`].
    pub async fn turn(&self, reference: &ConversationReference) -> DialogResult<Turn<'_>> {
        let key = reference.storage_key();
        let guard = self.locks.acquire(&key, self.options.concurrency).await?;
        let session = self.storage.load(&key).await?;
        debug!(
            conversation = %key,
            active = session.as_ref().is_some_and(DialogSession::is_active),
            "Turn opened"
        );
        Ok(Turn {
            engine: self,
            reference: reference.clone(),
            key,
            session,
            message: None,
            report: TurnReport::new(),
            _guard: guard,
        })
    }

    /// Starts `dialog` for `reference` in a turn of its own.
    pub async fn begin_dialog(
        &self,
        reference: &ConversationReference,
        dialog: &str,
        vars: Vars,
    ) -> DialogResult<TurnReport> {
        let mut turn = self.turn(reference).await?;
        turn.begin_dialog(dialog, vars).await?;
        Ok(turn.finish())
    }

    /// Feeds `message` to the conversation's active dialog in a turn of its
    /// own. Returns `None` when the dialog did not take the message; see
    /// [`Turn::continue_dialog`].
    pub async fn continue_dialog(&self, message: &IncomingMessage) -> DialogResult<Option<TurnReport>> {
        let mut turn = self.turn(&message.reference).await?;
        if turn.continue_dialog(message).await? {
            Ok(Some(turn.finish()))
        } else {
            Ok(None)
        }
    }

    /// Ends every dialog of `reference` and clears its session.
    pub async fn cancel_all_dialogs(&self, reference: &ConversationReference) -> DialogResult<TurnReport> {
        let mut turn = self.turn(reference).await?;
        turn.cancel_all_dialogs().await?;
        Ok(turn.finish())
    }

    /// Loads the stored session of `reference` without opening a turn.
    pub async fn session(&self, reference: &ConversationReference) -> DialogResult<Option<DialogSession>> {
        Ok(self.storage.load(&reference.storage_key()).await?)
    }
}

impl std::fmt::Debug for DialogEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogEngine")
            .field("dialogs", &self.dialogs.len())
            .field("adapter", &self.adapter.name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to one conversation for the duration of a turn.
///
/// The session held by a turn is always the last state durably written to
/// storage; when an operation fails, the turn keeps that checkpoint and the
/// error is returned.
pub struct Turn<'e> {
    pub(crate) engine: &'e DialogEngine,
    pub(crate) reference: ConversationReference,
    pub(crate) key: String,
    pub(crate) session: Option<DialogSession>,
    pub(crate) message: Option<IncomingMessage>,
    pub(crate) report: TurnReport,
    _guard: TurnGuard,
}

impl Turn<'_> {
    /// Conversation this turn serves.
    pub fn reference(&self) -> &ConversationReference {
        &self.reference
    }

    /// Storage key of the conversation.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last committed session.
    pub fn session(&self) -> Option<&DialogSession> {
        self.session.as_ref()
    }

    /// Returns `true` while a dialog is running or waiting for a reply.
    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(DialogSession::is_active)
    }

    /// Report accumulated so far.
    pub fn report(&self) -> &TurnReport {
        &self.report
    }

    /// Starts `dialog` with `vars`. An already active dialog becomes its
    /// caller and resumes once it ends.
    pub async fn begin_dialog(&mut self, dialog: &str, vars: Vars) -> DialogResult<()> {
        let mut session = self
            .session
            .clone()
            .filter(DialogSession::is_active)
            .unwrap_or_else(|| DialogSession::new(self.reference.clone()));
        self.push_dialog(&mut session, dialog, vars, None)?;
        self.drive(&mut session).await
    }

    /// Feeds `message` to the active dialog.
    ///
    /// Returns `false` without touching the session when no dialog is
    /// active, when `message` is not a user message, or when the reply
    /// matched no rule and [`NoMatchPolicy::Wait`] keeps the question
    /// pending. The caller may then route the message elsewhere.
    pub async fn continue_dialog(&mut self, message: &IncomingMessage) -> DialogResult<bool> {
        if !message.is_message() {
            return Ok(false);
        }
        let Some(mut session) = self.session.clone().filter(DialogSession::is_active) else {
            return Ok(false);
        };
        self.message = Some(message.clone());

        match session.status {
            SessionStatus::WaitingForInput => {
                if !self.resume(&mut session, message).await? {
                    return Ok(false);
                }
            }
            // A previous turn failed mid-drive: pick up from its checkpoint,
            // then answer the question it stops at with this message.
            SessionStatus::Active => {
                warn!(conversation = %self.key, "Resuming interrupted turn from checkpoint");
                self.drive(&mut session).await?;
                if session.status != SessionStatus::WaitingForInput
                    || !self.resume(&mut session, message).await?
                {
                    return Ok(true);
                }
            }
            SessionStatus::Ended => return Ok(false),
        }
        self.drive(&mut session).await?;
        Ok(true)
    }

    /// Ends every dialog without running hooks and clears the session.
    pub async fn cancel_all_dialogs(&mut self) -> DialogResult<()> {
        if self.session.is_some() {
            self.engine.storage.delete(&self.key).await?;
            self.session = None;
            info!(conversation = %self.key, "Dialogs canceled");
        }
        Ok(())
    }

    /// Closes the turn, releasing the conversation lock.
    pub fn finish(mut self) -> TurnReport {
        self.report.status = self
            .session
            .as_ref()
            .map(|session| session.status)
            .unwrap_or(SessionStatus::Ended);
        debug!(
            conversation = %self.key,
            sent = self.report.sent.len(),
            status = ?self.report.status,
            "Turn finished"
        );
        std::mem::replace(&mut self.report, TurnReport::new())
    }
}

impl std::fmt::Debug for Turn<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Turn")
            .field("key", &self.key)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
