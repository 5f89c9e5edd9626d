//! Conversation identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identity of a platform-level conversation.
///
/// A reference names the platform, the conversation (channel, room, DM), the
/// participant and optionally a sub-thread of messages. Dialog state is keyed
/// by [`storage_key`](Self::storage_key), so two messages from the same user in
/// the same place always resume the same dialog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationReference {
    /// Platform name, e.g. `"slack"` or `"web"`.
    pub platform: String,
    /// Platform conversation / channel identifier.
    pub conversation_id: String,
    /// Participant identifier.
    pub user_id: String,
    /// Sub-thread identifier, when the platform threads replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl ConversationReference {
    /// Creates a reference without a sub-thread.
    pub fn new(
        platform: impl Into<String>,
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            thread_id: None,
        }
    }

    /// Scopes the reference to a sub-thread.
    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Deterministic key used to persist state for this conversation.
    ///
    /// The key only depends on the reference's fields, so it is stable across
    /// turns and across process restarts.
    pub fn storage_key(&self) -> String {
        let mut key = format!(
            "{}/conversations/{}/users/{}",
            self.platform, self.conversation_id, self.user_id
        );
        if let Some(thread) = &self.thread_id {
            key.push_str("/threads/");
            key.push_str(thread);
        }
        key
    }
}

impl fmt::Display for ConversationReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_is_stable() {
        let a = ConversationReference::new("slack", "C1", "U1");
        let b = ConversationReference::new("slack", "C1", "U1");
        assert_eq!(a.storage_key(), b.storage_key());
        assert_eq!(a.storage_key(), "slack/conversations/C1/users/U1");
    }

    #[test]
    fn test_thread_scopes_key() {
        let base = ConversationReference::new("slack", "C1", "U1");
        let threaded = base.clone().with_thread("T9");
        assert_ne!(base.storage_key(), threaded.storage_key());
        assert!(threaded.storage_key().ends_with("/threads/T9"));
    }
}
