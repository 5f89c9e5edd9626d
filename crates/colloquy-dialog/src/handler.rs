//! Handler function types.
//!
//! Every user-supplied callback is stored as a shared, type-erased closure
//! returning a boxed future. The `*_fn` constructors accept ordinary async
//! closures and erase them:
//!
//! ```rust,ignore
//! let hook = hook_fn(|ctx: Arc<DialogContext>| async move {
//!     ctx.set_var("greeted", true);
//!     Ok(())
//! });
//! ```
//!
//! Handlers receive their inputs by value plus an `Arc<DialogContext>`; they
//! never capture interpreter state, so the same definition can serve any
//! number of concurrent conversations.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::content::RenderContext;
use crate::context::DialogContext;
use crate::session::DialogResults;
use crate::vars::Vars;

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased error returned by user handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by user handlers.
pub type HandlerResult = Result<(), BoxError>;

/// `before` hooks and handler-chosen action steps.
pub type HookFn = Arc<dyn Fn(Arc<DialogContext>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Answer handlers, called with the reply text.
pub type AnswerFn =
    Arc<dyn Fn(String, Arc<DialogContext>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// `onChange` hooks, called with the variable's new value.
pub type ChangeFn =
    Arc<dyn Fn(Value, Arc<DialogContext>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// `after` hooks, called once a dialog has ended.
pub type AfterFn =
    Arc<dyn Fn(DialogResults, Arc<DialogContext>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Rule predicates, evaluated against the reply text for truthiness.
pub type PredicateFn = Arc<dyn Fn(String, Vars) -> BoxFuture<'static, bool> + Send + Sync>;

/// Render-time content functions producing a `T`.
pub type RenderFn<T> =
    Arc<dyn Fn(RenderContext) -> BoxFuture<'static, Result<T, BoxError>> + Send + Sync>;

/// Erases a `before`/action hook.
pub fn hook_fn<F, Fut>(f: F) -> HookFn
where
    F: Fn(Arc<DialogContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// Erases an answer handler.
pub fn answer_fn<F, Fut>(f: F) -> AnswerFn
where
    F: Fn(String, Arc<DialogContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |text, ctx| Box::pin(f(text, ctx)))
}

/// Erases an `onChange` hook.
pub fn change_fn<F, Fut>(f: F) -> ChangeFn
where
    F: Fn(Value, Arc<DialogContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |value, ctx| Box::pin(f(value, ctx)))
}

/// Erases an `after` hook.
pub fn after_fn<F, Fut>(f: F) -> AfterFn
where
    F: Fn(DialogResults, Arc<DialogContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |results, ctx| Box::pin(f(results, ctx)))
}

/// Erases a rule predicate.
pub fn predicate_fn<F, Fut>(f: F) -> PredicateFn
where
    F: Fn(String, Vars) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    Arc::new(move |text, vars| Box::pin(f(text, vars)))
}

/// Erases a render-time content function.
pub fn render_fn<T, F, Fut>(f: F) -> RenderFn<T>
where
    F: Fn(RenderContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}
