//! Dialog registry.
//!
//! [`DialogSet`] owns every registered [`Conversation`]. It is built once at
//! startup and shared read-only with the engine; definitions are frozen behind
//! `Arc` as soon as they are added.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::conversation::Conversation;
use crate::error::StructureError;

/// Registered dialogs, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct DialogSet {
    dialogs: HashMap<String, Arc<Conversation>>,
}

impl DialogSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a dialog. Names must be unique.
    pub fn add(&mut self, conversation: Conversation) -> Result<(), StructureError> {
        let name = conversation.name().to_string();
        if self.dialogs.contains_key(&name) {
            return Err(StructureError::DuplicateDialog { dialog: name });
        }
        debug!(
            dialog = %name,
            threads = conversation.threads().len(),
            "Dialog registered"
        );
        self.dialogs.insert(name, Arc::new(conversation));
        Ok(())
    }

    /// Builder-style [`add`](Self::add).
    pub fn with(mut self, conversation: Conversation) -> Result<Self, StructureError> {
        self.add(conversation)?;
        Ok(self)
    }

    /// Looks up a dialog.
    pub fn get(&self, name: &str) -> Option<Arc<Conversation>> {
        self.dialogs.get(name).cloned()
    }

    /// Looks up a dialog, failing with a structure error if it is unknown.
    pub fn require(&self, name: &str) -> Result<Arc<Conversation>, StructureError> {
        self.get(name).ok_or_else(|| StructureError::UnknownDialog {
            dialog: name.to_string(),
        })
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.dialogs.contains_key(name)
    }

    /// Registered dialog names, in arbitrary order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dialogs.keys().map(String::as_str)
    }

    /// Number of registered dialogs.
    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    /// Returns `true` when no dialog is registered.
    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_rejected() {
        let mut set = DialogSet::new();
        set.add(Conversation::new("a")).unwrap();
        let err = set.add(Conversation::new("a")).unwrap_err();
        assert!(matches!(err, StructureError::DuplicateDialog { dialog } if dialog == "a"));
    }

    #[test]
    fn test_require_unknown() {
        let set = DialogSet::new().with(Conversation::new("a")).unwrap();
        assert!(set.require("a").is_ok());
        assert!(matches!(
            set.require("b"),
            Err(StructureError::UnknownDialog { .. })
        ));
    }
}
