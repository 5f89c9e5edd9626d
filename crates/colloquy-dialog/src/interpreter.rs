//! Step interpreter.
//!
//! The drive loop executes steps of the innermost dialog until it reaches a
//! question (the only suspension point) or the dialog stack empties. Progress
//! is checkpointed to storage after every step, so the session a turn leaves
//! behind after an error is the state before the failing step.

use std::sync::Arc;

use colloquy_core::{Activity, IncomingMessage};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::content::MessageTemplate;
use crate::context::{ChildCall, ChildMode, ContextEffects, DialogContext, Position};
use crate::conversation::Conversation;
use crate::engine::{NoMatchPolicy, Turn};
use crate::error::{DialogError, DialogResult, HandlerError, StructureError};
use crate::handler::BoxError;
use crate::session::{DialogOutcome, DialogResults, DialogSession, Frame, SessionStatus};
use crate::step::{Action, Answer, Step};
use crate::vars::Vars;

/// Where a control-flow request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// A `before` hook of the thread being entered.
    Before,
    /// An action or invoke step.
    Step,
    /// A reply handler of the suspended question.
    Answer,
}

/// Control-flow requests left after a handler's variables were absorbed.
#[derive(Debug, Default)]
struct Requests {
    transition: Option<Action>,
    child: Option<ChildCall>,
    cancel: bool,
}

impl Turn<'_> {
    // ─── Drive loop ───────────────────────────────────────────────────────────

    /// Runs steps until the dialog suspends or the stack empties.
    pub(crate) async fn drive(&mut self, session: &mut DialogSession) -> DialogResult<()> {
        let limit = self.engine.options().max_steps_per_turn;
        let mut executed = 0usize;
        session.status = SessionStatus::Active;

        loop {
            let Some(frame) = session.top().cloned() else {
                return self.close(session).await;
            };
            if executed >= limit {
                return Err(StructureError::StepLimitExceeded {
                    dialog: frame.dialog.clone(),
                    limit,
                }
                .into());
            }
            executed += 1;

            let convo = self.engine.dialogs().require(&frame.dialog)?;
            let steps = convo
                .threads()
                .get_thread(&frame.thread)
                .ok_or_else(|| StructureError::UnknownThread {
                    dialog: frame.dialog.clone(),
                    thread: frame.thread.clone(),
                })?;

            if frame.entering {
                self.enter_thread(session, &convo, &frame).await?;
                if session.stack.is_empty() {
                    return self.close(session).await;
                }
                self.commit(session).await?;
                continue;
            }

            let Some(step) = steps.get(frame.step) else {
                debug!(
                    conversation = %self.key,
                    dialog = %frame.dialog,
                    thread = %frame.thread,
                    "Reached end of thread"
                );
                self.end_dialog(session, DialogOutcome::Completed).await?;
                if session.stack.is_empty() {
                    return self.close(session).await;
                }
                self.commit(session).await?;
                continue;
            };

            debug!(
                conversation = %self.key,
                dialog = %frame.dialog,
                thread = %frame.thread,
                step = frame.step,
                kind = step.kind(),
                "Executing step"
            );

            match step {
                Step::Say(line) => {
                    let activity = self.render(&frame, line).await?;
                    self.deliver(activity).await?;
                    advance(session);
                }
                Step::Ask(question) => {
                    let activity = self.render(&frame, &question.prompt).await?;
                    self.deliver(activity).await?;
                    session.status = SessionStatus::WaitingForInput;
                    self.commit(session).await?;
                    debug!(conversation = %self.key, dialog = %frame.dialog, "Waiting for reply");
                    return Ok(());
                }
                Step::Action(action) => {
                    self.apply_action(session, &convo, action.clone(), Origin::Step)
                        .await?;
                }
                Step::Invoke(handler) => {
                    let ctx = self.context(&frame);
                    handler(ctx.clone())
                        .await
                        .map_err(|source| ctx.handler_error(source))?;
                    let requests = self.absorb(session, ctx.take_effects());
                    self.apply_requests(session, &convo, requests, Origin::Step, Some(Action::Next))
                        .await?;
                }
                Step::BeginDialog { dialog, key } => {
                    advance(session);
                    self.push_dialog(session, dialog, Vars::new(), key.clone())?;
                }
                Step::GotoDialog(dialog) => {
                    self.engine.dialogs().require(dialog)?;
                    session.stack.pop();
                    self.push_dialog(session, dialog, Vars::new(), frame.result_key.clone())?;
                }
            }

            if session.stack.is_empty() {
                return self.close(session).await;
            }
            self.commit(session).await?;
        }
    }

    /// Runs the `before` hooks of the frame's thread and clears its
    /// entering flag.
    async fn enter_thread(
        &mut self,
        session: &mut DialogSession,
        convo: &Arc<Conversation>,
        frame: &Frame,
    ) -> DialogResult<()> {
        if let Some(top) = session.top_mut() {
            top.entering = false;
        }
        let hooks = convo.hooks().before(&frame.thread);
        debug!(
            conversation = %self.key,
            dialog = %frame.dialog,
            thread = %frame.thread,
            hooks = hooks.len(),
            "Entering thread"
        );
        if hooks.is_empty() {
            return Ok(());
        }

        let mut entered = frame.clone();
        entered.entering = false;
        let ctx = self.context(&entered);
        for hook in hooks {
            hook(ctx.clone())
                .await
                .map_err(|source| ctx.handler_error(source))?;
        }
        let requests = self.absorb(session, ctx.take_effects());
        self.apply_requests(session, convo, requests, Origin::Before, None)
            .await
    }

    // ─── Replies ──────────────────────────────────────────────────────────────

    /// Consumes `message` as the reply to the suspended question.
    ///
    /// Returns `false` when the dialog stays suspended.
    pub(crate) async fn resume(
        &mut self,
        session: &mut DialogSession,
        message: &IncomingMessage,
    ) -> DialogResult<bool> {
        let Some(frame) = session.top().cloned() else {
            return Ok(true);
        };
        let convo = self.engine.dialogs().require(&frame.dialog)?;
        let steps = convo
            .threads()
            .get_thread(&frame.thread)
            .ok_or_else(|| StructureError::UnknownThread {
                dialog: frame.dialog.clone(),
                thread: frame.thread.clone(),
            })?;
        let Some(Step::Ask(question)) = steps.get(frame.step) else {
            warn!(
                conversation = %self.key,
                dialog = %frame.dialog,
                thread = %frame.thread,
                step = frame.step,
                "Suspended step is not a question, resuming drive"
            );
            session.status = SessionStatus::Active;
            return Ok(true);
        };

        let reply = message.text.clone();
        let ctx = self.context(&frame);
        match &question.answer {
            Answer::Capture { key, handler } => {
                if let Some(key) = key {
                    ctx.set_var(key.as_str(), reply.clone());
                }
                if let Some(handler) = handler {
                    handler(reply, ctx.clone())
                        .await
                        .map_err(|source| ctx.handler_error(source))?;
                }
            }
            Answer::Rules(rules) => {
                if let Some(key) = rules.store_key() {
                    ctx.set_var(key, reply.clone());
                }
                let vars = ctx.vars();
                let selected = rules.select(&reply, &vars).await;
                match selected {
                    Some(rule) => {
                        (rule.handler)(reply, ctx.clone())
                            .await
                            .map_err(|source| ctx.handler_error(source))?;
                    }
                    None => match self.engine.options().no_match {
                        NoMatchPolicy::Reprompt => {
                            warn!(
                                conversation = %self.key,
                                dialog = %frame.dialog,
                                thread = %frame.thread,
                                "No rule matched reply, asking again"
                            );
                            ctx.repeat();
                        }
                        NoMatchPolicy::Wait => {
                            warn!(
                                conversation = %self.key,
                                dialog = %frame.dialog,
                                thread = %frame.thread,
                                "No rule matched reply, still waiting"
                            );
                            return Ok(false);
                        }
                    },
                }
            }
        }

        let effects = ctx.take_effects();
        let changed = effects.changed.clone();
        let mut requests = self.absorb(session, effects);
        if !requests.cancel {
            self.notify_changes(session, &convo, &changed, &mut requests)
                .await?;
        }

        session.status = SessionStatus::Active;
        self.apply_requests(session, &convo, requests, Origin::Answer, Some(Action::Next))
            .await?;
        Ok(true)
    }

    /// Runs `on_change` hooks for the variables a reply handler set.
    async fn notify_changes(
        &mut self,
        session: &mut DialogSession,
        convo: &Arc<Conversation>,
        changed: &[String],
        requests: &mut Requests,
    ) -> DialogResult<()> {
        let hooks = convo.hooks().on_change(changed);
        if hooks.is_empty() {
            return Ok(());
        }
        let Some(frame) = session.top().cloned() else {
            return Ok(());
        };

        let ctx = self.context(&frame);
        for (variable, hook) in hooks {
            let value = ctx.var(&variable).unwrap_or(Value::Null);
            debug!(conversation = %self.key, variable = %variable, "Variable changed");
            hook(value, ctx.clone())
                .await
                .map_err(|source| ctx.handler_error(source))?;
        }

        let later = self.absorb(session, ctx.take_effects());
        requests.cancel |= later.cancel;
        if later.transition.is_some() {
            requests.transition = later.transition;
        }
        if later.child.is_some() {
            requests.child = later.child;
        }
        Ok(())
    }

    // ─── Control flow ─────────────────────────────────────────────────────────

    async fn apply_requests(
        &mut self,
        session: &mut DialogSession,
        convo: &Arc<Conversation>,
        requests: Requests,
        origin: Origin,
        default: Option<Action>,
    ) -> DialogResult<()> {
        if requests.cancel {
            self.cancel(session);
            return Ok(());
        }

        let depth = session.stack.len();
        if let Some(action) = requests.transition.or(default) {
            self.apply_action(session, convo, action, origin).await?;
        }

        if let Some(child) = requests.child {
            if child.mode == ChildMode::Replace && session.stack.len() == depth {
                self.engine.dialogs().require(&child.dialog)?;
                let replaced = session.stack.pop();
                let result_key = replaced.and_then(|frame| frame.result_key);
                self.push_dialog(session, &child.dialog, child.vars, result_key)?;
            } else {
                self.push_dialog(session, &child.dialog, child.vars, None)?;
            }
        }
        Ok(())
    }

    async fn apply_action(
        &mut self,
        session: &mut DialogSession,
        convo: &Arc<Conversation>,
        action: Action,
        origin: Origin,
    ) -> DialogResult<()> {
        match action {
            Action::Next => {
                if origin != Origin::Before {
                    advance(session);
                }
            }
            Action::Repeat => {
                if origin == Origin::Step {
                    if let Some(top) = session.top_mut() {
                        top.step = top.step.saturating_sub(1);
                    }
                }
            }
            Action::Goto(thread) => {
                if !convo.threads().contains(&thread) {
                    return Err(StructureError::UnknownThread {
                        dialog: convo.name().to_string(),
                        thread,
                    }
                    .into());
                }
                let Some(top) = session.top_mut() else {
                    return Ok(());
                };
                if origin == Origin::Before && top.thread == thread {
                    return Ok(());
                }
                debug!(
                    conversation = %self.key,
                    dialog = %top.dialog,
                    from = %top.thread,
                    to = %thread,
                    "Goto thread"
                );
                top.enter(thread);
            }
            Action::Complete => self.end_dialog(session, DialogOutcome::Completed).await?,
            Action::Stop => self.end_dialog(session, DialogOutcome::Stopped).await?,
            Action::Timeout => self.end_dialog(session, DialogOutcome::TimedOut).await?,
        }
        Ok(())
    }

    /// Pushes a new frame for `dialog`.
    pub(crate) fn push_dialog(
        &mut self,
        session: &mut DialogSession,
        dialog: &str,
        vars: Vars,
        result_key: Option<String>,
    ) -> DialogResult<()> {
        self.engine.dialogs().require(dialog)?;

        let mut seeded = Vars::new();
        seeded.set("user", self.reference.user_id.clone());
        seeded.set("channel", self.reference.conversation_id.clone());
        seeded.merge(&vars);

        let mut frame = Frame::new(dialog, seeded);
        frame.result_key = result_key;
        session.stack.push(frame);
        session.status = SessionStatus::Active;
        info!(
            conversation = %self.key,
            dialog = %dialog,
            depth = session.stack.len(),
            "Dialog started"
        );
        Ok(())
    }

    /// Pops the innermost dialog, hands its variables to the caller and runs
    /// its `after` hooks.
    async fn end_dialog(&mut self, session: &mut DialogSession, outcome: DialogOutcome) -> DialogResult<()> {
        let Some(frame) = session.stack.pop() else {
            return Ok(());
        };
        info!(
            conversation = %self.key,
            dialog = %frame.dialog,
            outcome = ?outcome,
            depth = session.stack.len(),
            "Dialog ended"
        );

        if let Some(caller) = session.top_mut() {
            match &frame.result_key {
                Some(key) => caller.vars.set(key.as_str(), frame.vars.clone().into_value()),
                None => caller.vars.merge(&frame.vars),
            }
        }

        let results = DialogResults {
            dialog: frame.dialog.clone(),
            outcome,
            vars: frame.vars.clone(),
        };
        self.report.results.push(results.clone());

        let convo = self.engine.dialogs().require(&frame.dialog)?;
        let hooks = convo.hooks().after();
        if hooks.is_empty() {
            return Ok(());
        }

        let ctx = self.context(&frame);
        for hook in hooks {
            hook(results.clone(), ctx.clone())
                .await
                .map_err(|source| ctx.handler_error(source))?;
        }
        let effects = ctx.take_effects();
        self.report.sent.extend(effects.sent);
        if effects.cancel {
            self.cancel(session);
        } else if let Some(child) = effects.child {
            self.push_dialog(session, &child.dialog, child.vars, None)?;
        }
        Ok(())
    }

    fn cancel(&mut self, session: &mut DialogSession) {
        info!(
            conversation = %self.key,
            depth = session.stack.len(),
            "Dialogs canceled"
        );
        session.stack.clear();
        session.status = SessionStatus::Ended;
    }

    // ─── Effects ──────────────────────────────────────────────────────────────

    /// Stores a handler's variables in the innermost frame and collects the
    /// activities it sent.
    fn absorb(&mut self, session: &mut DialogSession, effects: ContextEffects) -> Requests {
        if let Some(top) = session.top_mut() {
            top.vars = effects.vars;
        }
        self.report.sent.extend(effects.sent);
        Requests {
            transition: effects.transition,
            child: effects.child,
            cancel: effects.cancel,
        }
    }

    fn context(&self, frame: &Frame) -> Arc<DialogContext> {
        Arc::new(DialogContext::new(
            self.reference.clone(),
            self.message.clone(),
            Position {
                conversation: self.key.clone(),
                dialog: frame.dialog.clone(),
                thread: frame.thread.clone(),
                step: frame.step,
            },
            self.engine.adapter().clone(),
            frame.vars.clone(),
        ))
    }

    async fn render(&self, frame: &Frame, line: &MessageTemplate) -> DialogResult<Activity> {
        line.render(&frame.vars)
            .await
            .map_err(|source| self.handler_error(frame, source).into())
    }

    fn handler_error(&self, frame: &Frame, source: BoxError) -> HandlerError {
        HandlerError {
            conversation: self.key.clone(),
            dialog: frame.dialog.clone(),
            thread: frame.thread.clone(),
            step: frame.step,
            source,
        }
    }

    async fn deliver(&mut self, activity: Activity) -> DialogResult<()> {
        self.engine
            .adapter()
            .send(&activity, &self.reference)
            .await
            .map_err(DialogError::Delivery)?;
        self.report.sent.push(activity);
        Ok(())
    }

    // ─── Persistence ──────────────────────────────────────────────────────────

    /// Saves `session` as the new checkpoint.
    async fn commit(&mut self, session: &DialogSession) -> DialogResult<()> {
        self.engine.storage().save(&self.key, session).await?;
        self.session = Some(session.clone());
        Ok(())
    }

    /// Deletes the session once the outermost dialog has ended.
    async fn close(&mut self, session: &mut DialogSession) -> DialogResult<()> {
        session.status = SessionStatus::Ended;
        self.engine.storage().delete(&self.key).await?;
        self.session = None;
        debug!(conversation = %self.key, "Session closed");
        Ok(())
    }
}

fn advance(session: &mut DialogSession) {
    if let Some(top) = session.top_mut() {
        top.step += 1;
    }
}
