//! Step definitions.
//!
//! A thread is an ordered list of [`Step`]s. Steps are a closed sum type;
//! the interpreter matches on them exhaustively.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;

use crate::content::MessageTemplate;
use crate::context::DialogContext;
use crate::handler::{
    AnswerFn, HandlerResult, HookFn, PredicateFn, answer_fn, predicate_fn,
};
use crate::template::render_str;
use crate::vars::Vars;

// ============================================================================
// Action
// ============================================================================

/// Control-flow instruction, used both as a step and as a handler's choice
/// of what happens next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Continue with the following step.
    Next,
    /// Go back and run the previous step (or re-prompt, from an answer handler).
    Repeat,
    /// Jump to step 0 of the named thread.
    Goto(String),
    /// End the dialog successfully.
    Complete,
    /// End the dialog as stopped.
    Stop,
    /// End the dialog as timed out.
    Timeout,
}

impl Action {
    /// Returns `true` for actions that end the dialog.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Stop | Self::Timeout)
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    /// Parses the action keywords; any other string names a thread.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "next" => Self::Next,
            "repeat" => Self::Repeat,
            "complete" | "end" => Self::Complete,
            "stop" => Self::Stop,
            "timeout" => Self::Timeout,
            thread => Self::Goto(thread.to_string()),
        })
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(action) => action,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next => f.write_str("next"),
            Self::Repeat => f.write_str("repeat"),
            Self::Goto(thread) => write!(f, "goto:{thread}"),
            Self::Complete => f.write_str("complete"),
            Self::Stop => f.write_str("stop"),
            Self::Timeout => f.write_str("timeout"),
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

/// When a rule fires.
#[derive(Clone)]
pub enum Condition {
    /// Case-insensitive substring of the reply. The pattern is interpolated
    /// against the variable store first; an empty pattern never matches.
    Pattern(String),
    /// Regular-expression test on the reply.
    Regex(Regex),
    /// Asynchronous predicate over the reply.
    Predicate(PredicateFn),
    /// Fires only when no other rule matched.
    Default,
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(p) => f.debug_tuple("Pattern").field(p).finish(),
            Self::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::Default => f.write_str("Default"),
        }
    }
}

/// A condition paired with the handler it triggers.
#[derive(Clone)]
pub struct Rule {
    /// Matching condition.
    pub condition: Condition,
    /// Handler run when the condition matches.
    pub handler: AnswerFn,
}

/// Ordered rule list of a question.
///
/// Rules are tested in declaration order and the first match wins. A
/// [`Condition::Default`] rule only fires when nothing else matched,
/// wherever it was declared.
#[derive(Clone, Default)]
pub struct Rules {
    key: Option<String>,
    rules: Vec<Rule>,
}

impl Rules {
    /// Creates an empty rule list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also stores the raw reply under `key`.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Adds a substring rule.
    pub fn pattern<F, Fut>(self, pattern: impl Into<String>, handler: F) -> Self
    where
        F: Fn(String, Arc<DialogContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.rule(Condition::Pattern(pattern.into()), answer_fn(handler))
    }

    /// Adds a regular-expression rule.
    pub fn regex<F, Fut>(self, regex: Regex, handler: F) -> Self
    where
        F: Fn(String, Arc<DialogContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.rule(Condition::Regex(regex), answer_fn(handler))
    }

    /// Adds a predicate rule.
    pub fn predicate<P, PFut, F, Fut>(self, predicate: P, handler: F) -> Self
    where
        P: Fn(String, Vars) -> PFut + Send + Sync + 'static,
        PFut: Future<Output = bool> + Send + 'static,
        F: Fn(String, Arc<DialogContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.rule(
            Condition::Predicate(predicate_fn(predicate)),
            answer_fn(handler),
        )
    }

    /// Adds the fallback rule.
    pub fn default_rule<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(String, Arc<DialogContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.rule(Condition::Default, answer_fn(handler))
    }

    /// Adds a prebuilt rule.
    pub fn rule(mut self, condition: Condition, handler: AnswerFn) -> Self {
        self.rules.push(Rule { condition, handler });
        self
    }

    /// Key the raw reply is stored under, if any.
    pub fn store_key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Picks the rule that handles `reply`.
    ///
    /// Predicates are awaited one at a time, in order, and evaluation stops at
    /// the first match.
    pub async fn select(&self, reply: &str, vars: &Vars) -> Option<&Rule> {
        let lowered = reply.to_lowercase();
        for rule in &self.rules {
            let matched = match &rule.condition {
                Condition::Default => false,
                Condition::Pattern(pattern) => {
                    let pattern = render_str(pattern, vars).to_lowercase();
                    !pattern.is_empty() && lowered.contains(&pattern)
                }
                Condition::Regex(regex) => regex.is_match(reply),
                Condition::Predicate(predicate) => {
                    predicate(reply.to_string(), vars.clone()).await
                }
            };
            if matched {
                return Some(rule);
            }
        }
        self.rules
            .iter()
            .find(|rule| matches!(rule.condition, Condition::Default))
    }
}

// ============================================================================
// Answer / Question
// ============================================================================

/// How a question consumes its reply.
#[derive(Clone)]
pub enum Answer {
    /// Store the raw reply under `key` and/or run a single handler.
    Capture {
        /// Variable receiving the raw reply.
        key: Option<String>,
        /// Completion handler.
        handler: Option<AnswerFn>,
    },
    /// Route the reply through an ordered rule list.
    Rules(Rules),
}

impl Answer {
    /// Stores the raw reply under `key`.
    pub fn capture(key: impl Into<String>) -> Self {
        Self::Capture {
            key: Some(key.into()),
            handler: None,
        }
    }

    /// Runs `handler` with the reply.
    pub fn handler<F, Fut>(handler: F) -> Self
    where
        F: Fn(String, Arc<DialogContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::Capture {
            key: None,
            handler: Some(answer_fn(handler)),
        }
    }

    /// Stores the raw reply under `key`, then runs `handler`.
    pub fn capture_with<F, Fut>(key: impl Into<String>, handler: F) -> Self
    where
        F: Fn(String, Arc<DialogContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::Capture {
            key: Some(key.into()),
            handler: Some(answer_fn(handler)),
        }
    }

    /// Starts an empty rule list.
    pub fn rules() -> Rules {
        Rules::new()
    }

    /// Variable receiving the raw reply, if any.
    pub fn store_key(&self) -> Option<&str> {
        match self {
            Self::Capture { key, .. } => key.as_deref(),
            Self::Rules(rules) => rules.store_key(),
        }
    }
}

impl From<Rules> for Answer {
    fn from(rules: Rules) -> Self {
        Self::Rules(rules)
    }
}

/// A prompt and the way its reply is handled.
#[derive(Clone)]
pub struct Question {
    /// Line emitted before suspending.
    pub prompt: MessageTemplate,
    /// Reply handling.
    pub answer: Answer,
}

// ============================================================================
// Step
// ============================================================================

/// One node of a thread.
#[derive(Clone)]
pub enum Step {
    /// Emit a line and continue.
    Say(MessageTemplate),
    /// Emit a line and suspend until the user replies.
    Ask(Question),
    /// Follow a control-flow instruction.
    Action(Action),
    /// Run a handler that chooses the next action (defaults to `next`).
    Invoke(HookFn),
    /// Run another dialog as a nested call, then continue here.
    ///
    /// With a `key` the child's variables are stored under it as an object;
    /// without one they are merged into this dialog's variables.
    BeginDialog {
        /// Dialog to call.
        dialog: String,
        /// Variable receiving the child's results.
        key: Option<String>,
    },
    /// Replace this dialog with another one.
    GotoDialog(String),
}

impl Step {
    /// Short kind name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Say(_) => "say",
            Self::Ask(_) => "ask",
            Self::Action(_) => "action",
            Self::Invoke(_) => "invoke",
            Self::BeginDialog { .. } => "begin_dialog",
            Self::GotoDialog(_) => "goto_dialog",
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Say(line) => f.debug_tuple("Say").field(line).finish(),
            Self::Ask(q) => f
                .debug_struct("Ask")
                .field("prompt", &q.prompt)
                .field("key", &q.answer.store_key())
                .finish_non_exhaustive(),
            Self::Action(action) => f.debug_tuple("Action").field(action).finish(),
            Self::Invoke(_) => f.write_str("Invoke(..)"),
            Self::BeginDialog { dialog, key } => f
                .debug_struct("BeginDialog")
                .field("dialog", dialog)
                .field("key", key)
                .finish(),
            Self::GotoDialog(dialog) => f.debug_tuple("GotoDialog").field(dialog).finish(),
        }
    }
}
