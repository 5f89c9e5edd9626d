//! Trigger handlers built from tower services.
//!
//! A trigger is a [`Service<Arc<TriggerContext>>`](tower::Service) with
//! filter layers stacked on top. A filter that does not match rejects the
//! message with [`TriggerSkipped`], which the controller treats as "try the
//! next trigger". Any other error is a genuine failure.
//!
//! ```rust,ignore
//! use colloquy_runtime::prelude::*;
//!
//! controller.trigger(hears(["hello", "^hi\\b"]).handler(|ctx: Arc<TriggerContext>| async move {
//!     ctx.say("Hey there!").await?;
//!     ctx.begin_dialog("onboarding", Vars::new());
//!     Ok(())
//! }));
//!
//! controller.interrupt(
//!     hears(["cancel"])
//!         .rule(|ctx| ctx.is_dialog_active())
//!         .handler(|ctx: Arc<TriggerContext>| async move {
//!             ctx.cancel_all_dialogs();
//!             ctx.say("Cancelled.").await?;
//!             Ok(())
//!         }),
//! );
//! ```

use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};

use colloquy_core::{Activity, BoxedAdapter, DeliveryReceipt, IncomingMessage};
use colloquy_dialog::{BoxError, MessageTemplate, Vars};
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use tower::filter::{FilterLayer, Predicate};
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service, ServiceBuilder};
use tower_layer::{Identity, Stack};
use tracing::warn;

use crate::error::TriggerSkipped;

/// A type-erased trigger.
pub type BoxedTrigger = BoxCloneSyncService<Arc<TriggerContext>, (), BoxError>;

/// The `ServiceBuilder` returned by [`hears`], [`on`] and friends.
pub type TriggerBuilder = ServiceBuilder<Stack<FilterLayer<TriggerPredicate>, Identity>>;

// ============================================================================
// TriggerContext
// ============================================================================

#[derive(Debug, Default)]
pub(crate) struct TriggerEffects {
    pub(crate) begin: Option<(String, Vars)>,
    pub(crate) cancel: bool,
    pub(crate) sent: Vec<Activity>,
}

/// What a trigger handler sees: the inbound message and a way to reply or
/// start dialogs.
///
/// Dialog requests are applied by the controller after the handler returns,
/// inside the same turn.
pub struct TriggerContext {
    message: IncomingMessage,
    adapter: BoxedAdapter,
    dialog_active: bool,
    state: Mutex<TriggerEffects>,
}

impl TriggerContext {
    pub(crate) fn new(message: IncomingMessage, adapter: BoxedAdapter, dialog_active: bool) -> Self {
        Self {
            message,
            adapter,
            dialog_active,
            state: Mutex::new(TriggerEffects::default()),
        }
    }

    /// The inbound message.
    pub fn message(&self) -> &IncomingMessage {
        &self.message
    }

    /// Message text.
    pub fn text(&self) -> &str {
        &self.message.text
    }

    /// Recognized intent, if any.
    pub fn intent(&self) -> Option<&str> {
        self.message.intent.as_deref()
    }

    /// Whether the conversation had an active dialog when the turn began.
    pub fn is_dialog_active(&self) -> bool {
        self.dialog_active
    }

    /// Renders and delivers `message` immediately.
    ///
    /// Templates see `vars.user` and `vars.channel` only.
    pub async fn say(&self, message: impl Into<MessageTemplate>) -> Result<DeliveryReceipt, BoxError> {
        let template: MessageTemplate = message.into();
        let reference = &self.message.reference;
        let vars: Vars = [
            ("user", reference.user_id.clone()),
            ("channel", reference.conversation_id.clone()),
        ]
        .into_iter()
        .collect();

        let activity = template.render(&vars).await?;
        let receipt = self.adapter.send(&activity, reference).await?;
        self.state.lock().sent.push(activity);
        Ok(receipt)
    }

    /// Begins `dialog` once the handler returns.
    pub fn begin_dialog(&self, dialog: impl Into<String>, vars: Vars) {
        self.state.lock().begin = Some((dialog.into(), vars));
    }

    /// Cancels every dialog on the stack once the handler returns.
    pub fn cancel_all_dialogs(&self) {
        self.state.lock().cancel = true;
    }

    pub(crate) fn take_effects(&self) -> TriggerEffects {
        std::mem::take(&mut *self.state.lock())
    }
}

impl std::fmt::Debug for TriggerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerContext")
            .field("message", &self.message)
            .field("adapter", &self.adapter.name())
            .field("dialog_active", &self.dialog_active)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TriggerPredicate
// ============================================================================

/// A [`Predicate`] wrapping a synchronous closure.
///
/// When the closure returns `false` the message is rejected with [`TriggerSkipped`].
#[derive(Clone)]
pub struct TriggerPredicate(Arc<dyn Fn(&TriggerContext) -> bool + Send + Sync>);

impl TriggerPredicate {
    /// Creates a predicate from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&TriggerContext) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }
}

impl Predicate<Arc<TriggerContext>> for TriggerPredicate {
    type Request = Arc<TriggerContext>;

    fn check(&mut self, request: Arc<TriggerContext>) -> Result<Arc<TriggerContext>, BoxError> {
        if (self.0)(&request) {
            Ok(request)
        } else {
            Err(Box::new(TriggerSkipped))
        }
    }
}

// ============================================================================
// HandlerService
// ============================================================================

/// A tower [`Service`] calling one async handler.
#[derive(Clone)]
pub struct HandlerService<F> {
    handler: F,
}

impl<F> HandlerService<F> {
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F, Fut> Service<Arc<TriggerContext>> for HandlerService<F>
where
    F: Fn(Arc<TriggerContext>) -> Fut,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<(), BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<TriggerContext>) -> Self::Future {
        (self.handler)(ctx).boxed()
    }
}

/// Extension trait for [`tower::ServiceBuilder`] building triggers.
pub trait ServiceBuilderExt<L> {
    /// Wraps `handler` in a [`HandlerService`] and applies the stacked layers.
    fn handler<F, Fut>(self, handler: F) -> L::Service
    where
        F: Fn(Arc<TriggerContext>) -> Fut,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
        L: Layer<HandlerService<F>>;

    /// Adds a filter predicate.
    fn rule<P>(self, predicate: P) -> ServiceBuilder<Stack<FilterLayer<TriggerPredicate>, L>>
    where
        P: Fn(&TriggerContext) -> bool + Send + Sync + 'static;
}

impl<L> ServiceBuilderExt<L> for ServiceBuilder<L> {
    fn handler<F, Fut>(self, handler: F) -> L::Service
    where
        F: Fn(Arc<TriggerContext>) -> Fut,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
        L: Layer<HandlerService<F>>,
    {
        self.service(HandlerService::new(handler))
    }

    fn rule<P>(self, predicate: P) -> ServiceBuilder<Stack<FilterLayer<TriggerPredicate>, L>>
    where
        P: Fn(&TriggerContext) -> bool + Send + Sync + 'static,
    {
        self.filter(TriggerPredicate::new(predicate))
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Matches messages for which `predicate` holds.
pub fn when<P>(predicate: P) -> TriggerBuilder
where
    P: Fn(&TriggerContext) -> bool + Send + Sync + 'static,
{
    ServiceBuilder::new().rule(predicate)
}

/// Matches `message` events whose text matches any of `patterns`.
///
/// Patterns are case-insensitive regular expressions; a pattern that is not
/// a valid expression matches as a literal.
pub fn hears<I, S>(patterns: I) -> TriggerBuilder
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let regexes: Vec<Regex> = patterns
        .into_iter()
        .filter_map(|p| compile_pattern(p.as_ref()))
        .collect();
    hears_regex(regexes)
}

/// Matches `message` events whose text matches any of `regexes`.
pub fn hears_regex(regexes: impl IntoIterator<Item = Regex>) -> TriggerBuilder {
    let regexes: Arc<[Regex]> = regexes.into_iter().collect();
    when(move |ctx| {
        ctx.message().is_message() && regexes.iter().any(|re| re.is_match(ctx.text()))
    })
}

/// Matches events of type `event`.
pub fn on(event: impl Into<String>) -> TriggerBuilder {
    let event = event.into();
    when(move |ctx| ctx.message().event_type == event)
}

/// Matches messages whose recognized intent is `intent`.
pub fn on_intent(intent: impl Into<String>) -> TriggerBuilder {
    let intent = intent.into();
    when(move |ctx| ctx.intent() == Some(intent.as_str()))
}

fn compile_pattern(pattern: &str) -> Option<Regex> {
    let build = |p: &str| RegexBuilder::new(p).case_insensitive(true).build();
    match build(pattern) {
        Ok(re) => Some(re),
        Err(_) => match build(&regex::escape(pattern)) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern, error = %e, "Ignoring unusable trigger pattern");
                None
            }
        },
    }
}
