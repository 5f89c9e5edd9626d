//! Handler context.
//!
//! Every hook and handler receives an `Arc<DialogContext>`. The context
//! exposes the message being processed and the current dialog's variables,
//! and collects the control-flow requests a handler makes (`goto_thread`,
//! `complete`, `begin_dialog`, ...). The interpreter applies those requests
//! after the handler returns; nothing a handler does mutates the session
//! directly.
//!
//! ```rust,ignore
//! convo.ask("Shipping or pickup?", Answer::handler(|reply, ctx: Arc<DialogContext>| async move {
//!     if reply.contains("ship") {
//!         ctx.set_var("delivery", "shipping");
//!         ctx.begin_dialog("address", Vars::new());
//!     } else {
//!         ctx.goto_thread("pickup");
//!     }
//!     Ok(())
//! }));
//! ```

use colloquy_core::{Activity, BoxedAdapter, ConversationReference, DeliveryReceipt, IncomingMessage};
use parking_lot::Mutex;
use serde_json::Value;

use crate::content::MessageTemplate;
use crate::error::{DialogResult, HandlerError};
use crate::step::Action;
use crate::vars::Vars;

/// How a requested dialog relates to the requesting one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildMode {
    /// Run as a nested call and return to the caller.
    Begin,
    /// Replace the requesting dialog.
    Replace,
}

/// A dialog requested by a handler.
#[derive(Debug, Clone)]
pub struct ChildCall {
    /// Dialog to start.
    pub dialog: String,
    /// Initial variables.
    pub vars: Vars,
    /// Call or replace.
    pub mode: ChildMode,
}

/// Everything a handler asked for, collected after it returned.
#[derive(Debug, Default)]
pub struct ContextEffects {
    /// Variables after the handler ran.
    pub vars: Vars,
    /// Names passed to [`DialogContext::set_var`], first write order.
    pub changed: Vec<String>,
    /// Requested transition, last call wins.
    pub transition: Option<Action>,
    /// Requested dialog, last call wins.
    pub child: Option<ChildCall>,
    /// Activities sent through [`DialogContext::say`].
    pub sent: Vec<Activity>,
    /// Set by [`DialogContext::cancel_all_dialogs`].
    pub cancel: bool,
}

/// Where in the dialog graph a handler runs.
#[derive(Debug, Clone)]
pub(crate) struct Position {
    pub conversation: String,
    pub dialog: String,
    pub thread: String,
    pub step: usize,
}

/// Context passed to hooks and handlers.
pub struct DialogContext {
    reference: ConversationReference,
    message: Option<IncomingMessage>,
    position: Position,
    adapter: BoxedAdapter,
    state: Mutex<ContextEffects>,
}

impl DialogContext {
    pub(crate) fn new(
        reference: ConversationReference,
        message: Option<IncomingMessage>,
        position: Position,
        adapter: BoxedAdapter,
        vars: Vars,
    ) -> Self {
        Self {
            reference,
            message,
            position,
            adapter,
            state: Mutex::new(ContextEffects {
                vars,
                ..ContextEffects::default()
            }),
        }
    }

    // ─── Inputs ───────────────────────────────────────────────────────────────

    /// Conversation being served.
    pub fn reference(&self) -> &ConversationReference {
        &self.reference
    }

    /// The inbound message of this turn, if the turn was started by one.
    pub fn message(&self) -> Option<&IncomingMessage> {
        self.message.as_ref()
    }

    /// Text of the inbound message, or `""`.
    pub fn text(&self) -> &str {
        self.message.as_ref().map(|m| m.text.as_str()).unwrap_or_default()
    }

    /// Name of the running dialog.
    pub fn dialog_name(&self) -> &str {
        &self.position.dialog
    }

    /// Name of the running thread.
    pub fn thread_name(&self) -> &str {
        &self.position.thread
    }

    /// The adapter delivering this conversation's activities.
    pub fn adapter(&self) -> &BoxedAdapter {
        &self.adapter
    }

    // ─── Variables ────────────────────────────────────────────────────────────

    /// Snapshot of the variable store.
    pub fn vars(&self) -> Vars {
        self.state.lock().vars.clone()
    }

    /// Value of one variable.
    pub fn var(&self, name: &str) -> Option<Value> {
        self.state.lock().vars.get(name).cloned()
    }

    /// Stores `value` under `name`.
    pub fn set_var(&self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let mut state = self.state.lock();
        if !state.changed.contains(&name) {
            state.changed.push(name.clone());
        }
        state.vars.set(name, value);
    }

    // ─── Control flow ─────────────────────────────────────────────────────────

    /// Requests a control-flow action.
    pub fn transition(&self, action: impl Into<Action>) {
        self.state.lock().transition = Some(action.into());
    }

    /// Jumps to step 0 of `thread`.
    pub fn goto_thread(&self, thread: impl Into<String>) {
        self.transition(Action::Goto(thread.into()));
    }

    /// Continues with the next step.
    pub fn next(&self) {
        self.transition(Action::Next);
    }

    /// Re-prompts the current question, or reruns the previous step.
    pub fn repeat(&self) {
        self.transition(Action::Repeat);
    }

    /// Ends the dialog as completed.
    pub fn complete(&self) {
        self.transition(Action::Complete);
    }

    /// Ends the dialog as stopped.
    pub fn stop(&self) {
        self.transition(Action::Stop);
    }

    /// Ends the dialog as timed out.
    pub fn timeout(&self) {
        self.transition(Action::Timeout);
    }

    /// Starts `dialog` as a nested call once this handler's transition has
    /// been applied. The child's variables are merged back on completion.
    pub fn begin_dialog(&self, dialog: impl Into<String>, vars: Vars) {
        self.state.lock().child = Some(ChildCall {
            dialog: dialog.into(),
            vars,
            mode: ChildMode::Begin,
        });
    }

    /// Replaces the running dialog with `dialog`.
    pub fn replace_dialog(&self, dialog: impl Into<String>, vars: Vars) {
        self.state.lock().child = Some(ChildCall {
            dialog: dialog.into(),
            vars,
            mode: ChildMode::Replace,
        });
    }

    /// Ends every dialog of the conversation without running hooks.
    pub fn cancel_all_dialogs(&self) {
        self.state.lock().cancel = true;
    }

    // ─── Output ───────────────────────────────────────────────────────────────

    /// Renders `message` against the current variables and delivers it now.
    pub async fn say(&self, message: impl Into<MessageTemplate>) -> DialogResult<DeliveryReceipt> {
        let template: MessageTemplate = message.into();
        let vars = self.vars();
        let activity = template
            .render(&vars)
            .await
            .map_err(|source| self.handler_error(source))?;
        let receipt = self.adapter.send(&activity, &self.reference).await?;
        self.state.lock().sent.push(activity);
        Ok(receipt)
    }

    pub(crate) fn handler_error(&self, source: crate::handler::BoxError) -> HandlerError {
        HandlerError {
            conversation: self.position.conversation.clone(),
            dialog: self.position.dialog.clone(),
            thread: self.position.thread.clone(),
            step: self.position.step,
            source,
        }
    }

    /// Drains the collected effects.
    pub(crate) fn take_effects(&self) -> ContextEffects {
        let mut state = self.state.lock();
        let vars = state.vars.clone();
        std::mem::replace(
            &mut *state,
            ContextEffects {
                vars,
                ..ContextEffects::default()
            },
        )
    }
}

impl std::fmt::Debug for DialogContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogContext")
            .field("reference", &self.reference)
            .field("dialog", &self.position.dialog)
            .field("thread", &self.position.thread)
            .field("step", &self.position.step)
            .finish_non_exhaustive()
    }
}
