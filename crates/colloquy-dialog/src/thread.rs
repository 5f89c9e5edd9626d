//! Thread table.
//!
//! The static graph of a dialog: thread names mapped, in definition order, to
//! their steps. Goto targets are resolved lazily, so a thread may be referenced
//! before it is defined as long as it exists once control reaches it.

use crate::step::Step;

/// Name of the thread every dialog starts in.
pub const DEFAULT_THREAD: &str = "default";

/// A named, ordered sequence of steps.
#[derive(Debug, Clone)]
pub struct Thread {
    name: String,
    steps: Vec<Step>,
}

impl Thread {
    /// Thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

/// Ordered mapping from thread name to steps.
#[derive(Debug, Clone, Default)]
pub struct ThreadTable {
    threads: Vec<Thread>,
}

impl ThreadTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines `name` with `steps`, replacing any previous definition.
    pub fn add_thread(&mut self, name: impl Into<String>, steps: Vec<Step>) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.threads[i].steps = steps,
            None => self.threads.push(Thread { name, steps }),
        }
    }

    /// Appends a step to `name`, creating the thread if needed.
    pub fn push_step(&mut self, name: &str, step: Step) {
        match self.position(name) {
            Some(i) => self.threads[i].steps.push(step),
            None => self.threads.push(Thread {
                name: name.to_string(),
                steps: vec![step],
            }),
        }
    }

    /// Steps of `name`, or `None` if the thread is not defined.
    pub fn get_thread(&self, name: &str) -> Option<&[Step]> {
        self.position(name).map(|i| self.threads[i].steps.as_slice())
    }

    /// Returns `true` if `name` is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Thread names in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.threads.iter().map(|t| t.name.as_str())
    }

    /// Threads in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &Thread> {
        self.threads.iter()
    }

    /// Number of threads.
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// Returns `true` when no thread is defined.
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.threads.iter().position(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Action;

    #[test]
    fn test_push_creates_and_appends_in_order() {
        let mut table = ThreadTable::new();
        table.push_step("default", Step::Action(Action::Next));
        table.push_step("loop", Step::Action(Action::Repeat));
        table.push_step("default", Step::Action(Action::Complete));

        let names: Vec<_> = table.names().collect();
        assert_eq!(names, ["default", "loop"]);
        assert_eq!(table.get_thread("default").map(<[Step]>::len), Some(2));
    }

    #[test]
    fn test_add_thread_replaces_definition() {
        let mut table = ThreadTable::new();
        table.push_step("a", Step::Action(Action::Next));
        table.add_thread("a", vec![]);
        assert_eq!(table.get_thread("a").map(<[Step]>::len), Some(0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unknown_thread_not_found() {
        let table = ThreadTable::new();
        assert!(table.get_thread("missing").is_none());
        assert!(!table.contains("missing"));
    }
}
