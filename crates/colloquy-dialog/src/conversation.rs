//! Dialog definitions.
//!
//! A [`Conversation`] is authored with a mutable builder API and frozen once
//! it is added to a [`DialogSet`](crate::registry::DialogSet).
//!
//! # Example
//!
//! ```rust,ignore
//! let mut onboarding = Conversation::new("onboarding");
//! onboarding
//!     .ask("What is your name?", Answer::capture("name"))
//!     .say("Nice to meet you, {{vars.name}}!")
//!     .add_action("colors", DEFAULT_THREAD);
//!
//! onboarding.add_question(
//!     "Favorite color?",
//!     Answer::rules()
//!         .pattern("blue", |_, ctx| async move { ctx.goto_thread("blue"); Ok(()) })
//!         .default_rule(|_, ctx| async move { ctx.repeat(); Ok(()) }),
//!     "colors",
//! );
//!
//! onboarding.after(|results, _ctx| async move {
//!     tracing::info!(vars = ?results.vars, "onboarding finished");
//!     Ok(())
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::content::MessageTemplate;
use crate::context::DialogContext;
use crate::handler::{HandlerResult, after_fn, change_fn, hook_fn};
use crate::hooks::HookRegistry;
use crate::session::DialogResults;
use crate::step::{Action, Answer, Question, Step};
use crate::thread::{DEFAULT_THREAD, ThreadTable};

/// A named dialog: threads of steps plus lifecycle hooks.
#[derive(Debug, Clone)]
pub struct Conversation {
    name: String,
    threads: ThreadTable,
    hooks: HookRegistry,
}

impl Conversation {
    /// Creates an empty dialog.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            threads: ThreadTable::new(),
            hooks: HookRegistry::new(),
        }
    }

    /// Unique dialog name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The thread table.
    pub fn threads(&self) -> &ThreadTable {
        &self.threads
    }

    /// Steps of `name`, if the thread is defined.
    pub fn thread(&self, name: &str) -> Option<&[Step]> {
        self.threads.get_thread(name)
    }

    /// The hook registry.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    // ─── Default-thread shortcuts ───────────────────────────────────────────

    /// Appends a line to the default thread.
    pub fn say(&mut self, message: impl Into<MessageTemplate>) -> &mut Self {
        self.add_message(message, DEFAULT_THREAD)
    }

    /// Appends a question to the default thread.
    pub fn ask(&mut self, message: impl Into<MessageTemplate>, answer: impl Into<Answer>) -> &mut Self {
        self.add_question(message, answer, DEFAULT_THREAD)
    }

    // ─── Thread authoring ───────────────────────────────────────────────────

    /// Appends a line to `thread`.
    pub fn add_message(&mut self, message: impl Into<MessageTemplate>, thread: &str) -> &mut Self {
        self.add_step(Step::Say(message.into()), thread)
    }

    /// Appends a question to `thread`.
    pub fn add_question(
        &mut self,
        message: impl Into<MessageTemplate>,
        answer: impl Into<Answer>,
        thread: &str,
    ) -> &mut Self {
        self.add_step(
            Step::Ask(Question {
                prompt: message.into(),
                answer: answer.into(),
            }),
            thread,
        )
    }

    /// Appends a control-flow action to `thread`.
    ///
    /// Strings parse as action keywords (`"next"`, `"complete"`, ...) or
    /// thread names.
    pub fn add_action(&mut self, action: impl Into<Action>, thread: &str) -> &mut Self {
        self.add_step(Step::Action(action.into()), thread)
    }

    /// Appends a step that runs `handler` and follows the action it chooses.
    pub fn add_invoke<F, Fut>(&mut self, handler: F, thread: &str) -> &mut Self
    where
        F: Fn(Arc<DialogContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.add_step(Step::Invoke(hook_fn(handler)), thread)
    }

    /// Appends a nested call to `dialog`.
    ///
    /// With `key`, the child's final variables are stored under it.
    pub fn add_child_dialog(
        &mut self,
        dialog: impl Into<String>,
        key: Option<&str>,
        thread: &str,
    ) -> &mut Self {
        self.add_step(
            Step::BeginDialog {
                dialog: dialog.into(),
                key: key.map(str::to_string),
            },
            thread,
        )
    }

    /// Appends a step replacing this dialog with `dialog`.
    pub fn add_goto_dialog(&mut self, dialog: impl Into<String>, thread: &str) -> &mut Self {
        self.add_step(Step::GotoDialog(dialog.into()), thread)
    }

    /// Appends a prebuilt step to `thread`.
    pub fn add_step(&mut self, step: Step, thread: &str) -> &mut Self {
        self.threads.push_step(thread, step);
        self
    }

    /// Defines `name` with `steps`, replacing any previous definition.
    pub fn add_thread(&mut self, name: impl Into<String>, steps: Vec<Step>) -> &mut Self {
        self.threads.add_thread(name, steps);
        self
    }

    // ─── Hooks ──────────────────────────────────────────────────────────────

    /// Runs `hook` every time control enters `thread`.
    pub fn before<F, Fut>(&mut self, thread: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn(Arc<DialogContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.hooks.register_before(thread, hook_fn(hook));
        self
    }

    /// Runs `hook` once the dialog has ended.
    pub fn after<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(DialogResults, Arc<DialogContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.hooks.register_after(after_fn(hook));
        self
    }

    /// Runs `hook` when a reply handler changes `variable`.
    pub fn on_change<F, Fut>(&mut self, variable: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn(Value, Arc<DialogContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.hooks.register_on_change(variable, change_fn(hook));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_fills_threads_in_order() {
        let mut convo = Conversation::new("survey");
        convo
            .ask("name?", Answer::capture("name"))
            .say("hi {{vars.name}}")
            .add_action("details", DEFAULT_THREAD)
            .add_message("tell me more", "details")
            .add_child_dialog("address", Some("address"), "details");

        let default = convo.threads().get_thread(DEFAULT_THREAD).unwrap();
        let kinds: Vec<_> = default.iter().map(Step::kind).collect();
        assert_eq!(kinds, ["ask", "say", "action"]);
        assert!(matches!(&default[2], Step::Action(Action::Goto(t)) if t == "details"));

        let details = convo.threads().get_thread("details").unwrap();
        assert!(matches!(
            &details[1],
            Step::BeginDialog { dialog, key: Some(k) } if dialog == "address" && k == "address"
        ));
    }

    #[test]
    fn test_hooks_registered() {
        let mut convo = Conversation::new("hooks");
        convo
            .before("default", |_ctx| async { Ok(()) })
            .after(|_results, _ctx| async { Ok(()) })
            .on_change("name", |_value, _ctx| async { Ok(()) });
        assert!(convo.hooks().has_before("default"));
        assert_eq!(convo.hooks().after().len(), 1);
        assert_eq!(convo.hooks().on_change(&["name".to_string()]).len(), 1);
    }
}
