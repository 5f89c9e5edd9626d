//! Lifecycle hook registry.
//!
//! Three kinds of hooks, each kept in registration order:
//!
//! | Hook | Keyed by | Fires |
//! |------|----------|-------|
//! | `before` | thread name | on every entry into the thread, before step 0 |
//! | `after` | (none) | once, when the dialog ends |
//! | `on_change` | variable name | after a reply handler mutated the variable |
//!
//! Hooks of one kind are always awaited sequentially.

use crate::handler::{AfterFn, ChangeFn, HookFn};

/// Hooks attached to one dialog.
#[derive(Clone, Default)]
pub struct HookRegistry {
    before: Vec<(String, HookFn)>,
    after: Vec<AfterFn>,
    on_change: Vec<(String, ChangeFn)>,
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook that runs on entry into `thread`.
    pub fn register_before(&mut self, thread: impl Into<String>, hook: HookFn) {
        self.before.push((thread.into(), hook));
    }

    /// Registers a hook that runs when the dialog ends.
    pub fn register_after(&mut self, hook: AfterFn) {
        self.after.push(hook);
    }

    /// Registers a hook that runs when `variable` changes.
    pub fn register_on_change(&mut self, variable: impl Into<String>, hook: ChangeFn) {
        self.on_change.push((variable.into(), hook));
    }

    /// `before` hooks of `thread`, in registration order.
    pub fn before(&self, thread: &str) -> Vec<HookFn> {
        self.before
            .iter()
            .filter(|(name, _)| name == thread)
            .map(|(_, hook)| hook.clone())
            .collect()
    }

    /// `after` hooks, in registration order.
    pub fn after(&self) -> &[AfterFn] {
        &self.after
    }

    /// `on_change` hooks watching any of `changed`, in registration order.
    pub fn on_change(&self, changed: &[String]) -> Vec<(String, ChangeFn)> {
        self.on_change
            .iter()
            .filter(|(name, _)| changed.contains(name))
            .map(|(name, hook)| (name.clone(), hook.clone()))
            .collect()
    }

    /// Returns `true` if at least one `before` hook watches `thread`.
    pub fn has_before(&self, thread: &str) -> bool {
        self.before.iter().any(|(name, _)| name == thread)
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field(
                "before",
                &self.before.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("after", &self.after.len())
            .field(
                "on_change",
                &self.on_change.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .finish()
    }
}
