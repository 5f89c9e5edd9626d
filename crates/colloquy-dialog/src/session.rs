//! Dialog session: the persisted continuation of a conversation.
//!
//! A session is the only state that survives between turns. It records the
//! dialog stack (one [`Frame`] per active dialog, innermost last), each frame's
//! program counter and variables, and whether the conversation is waiting for
//! a reply. The interpreter reloads it at the start of every turn and saves or
//! deletes it at the end, so any process instance can serve the next turn.

use serde::{Deserialize, Serialize};

use colloquy_core::ConversationReference;

use crate::thread::DEFAULT_THREAD;
use crate::vars::Vars;

/// Execution status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Steps are being executed.
    Active,
    /// Suspended on a question.
    WaitingForInput,
    /// The outermost dialog has ended.
    Ended,
}

/// One dialog on the stack, with its program counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Dialog name.
    pub dialog: String,
    /// Current thread.
    pub thread: String,
    /// Index of the next step to run in `thread`.
    pub step: usize,
    /// The dialog's variable store.
    #[serde(default)]
    pub vars: Vars,
    /// Set when control just moved into `thread` and its `before` hooks
    /// have not run yet.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub entering: bool,
    /// Variable of the calling frame that receives this dialog's results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_key: Option<String>,
}

impl Frame {
    /// Creates a frame at step 0 of the default thread.
    pub fn new(dialog: impl Into<String>, vars: Vars) -> Self {
        Self {
            dialog: dialog.into(),
            thread: DEFAULT_THREAD.to_string(),
            step: 0,
            vars,
            entering: true,
            result_key: None,
        }
    }

    /// Moves to step 0 of `thread`, marking it as freshly entered.
    pub fn enter(&mut self, thread: impl Into<String>) {
        self.thread = thread.into();
        self.step = 0;
        self.entering = true;
    }
}

/// Persisted state of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogSession {
    /// Conversation the session belongs to.
    pub reference: ConversationReference,
    /// Dialog stack, innermost dialog last.
    pub stack: Vec<Frame>,
    /// Execution status.
    pub status: SessionStatus,
}

impl DialogSession {
    /// Creates an empty session for `reference`.
    pub fn new(reference: ConversationReference) -> Self {
        Self {
            reference,
            stack: Vec::new(),
            status: SessionStatus::Active,
        }
    }

    /// Storage key of the session.
    pub fn key(&self) -> String {
        self.reference.storage_key()
    }

    /// The innermost frame.
    pub fn top(&self) -> Option<&Frame> {
        self.stack.last()
    }

    /// The innermost frame, mutably.
    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.stack.last_mut()
    }

    /// Variables of the innermost dialog.
    pub fn vars(&self) -> Option<&Vars> {
        self.top().map(|frame| &frame.vars)
    }

    /// Returns `true` while at least one dialog is running or waiting.
    pub fn is_active(&self) -> bool {
        self.status != SessionStatus::Ended && !self.stack.is_empty()
    }
}

/// How a dialog ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogOutcome {
    /// Reached the end of a thread or a `complete`/`end` action.
    Completed,
    /// Ended by a `stop` action.
    Stopped,
    /// Ended by a `timeout` action.
    TimedOut,
}

/// Final state of an ended dialog, passed to `after` hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogResults {
    /// Dialog that ended.
    pub dialog: String,
    /// How it ended.
    pub outcome: DialogOutcome,
    /// Its final variable store.
    pub vars: Vars,
}
