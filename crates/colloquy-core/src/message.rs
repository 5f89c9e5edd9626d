//! Normalized message shapes.
//!
//! Platform adapters convert between their wire formats and these two types:
//! - [`IncomingMessage`]: what a user sent.
//! - [`Activity`]: what the bot sends back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::reference::ConversationReference;

/// Event type used for ordinary user messages.
pub const MESSAGE_EVENT: &str = "message";

// ============================================================================
// IncomingMessage
// ============================================================================

/// A normalized inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Where the message came from.
    pub reference: ConversationReference,
    /// Event type, `"message"` for plain user messages.
    #[serde(default = "default_event_type")]
    pub event_type: String,
    /// Plain text of the message (empty for non-text events).
    #[serde(default)]
    pub text: String,
    /// Intent resolved by an upstream recognizer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// Raw platform payload.
    #[serde(default)]
    pub payload: Value,
}

fn default_event_type() -> String {
    MESSAGE_EVENT.to_string()
}

impl IncomingMessage {
    /// Creates a plain text message event.
    pub fn text(reference: ConversationReference, text: impl Into<String>) -> Self {
        Self {
            reference,
            event_type: default_event_type(),
            text: text.into(),
            intent: None,
            payload: Value::Null,
        }
    }

    /// Creates an event of a custom type (e.g. `"conversation_update"`).
    pub fn event(reference: ConversationReference, event_type: impl Into<String>) -> Self {
        Self {
            reference,
            event_type: event_type.into(),
            text: String::new(),
            intent: None,
            payload: Value::Null,
        }
    }

    /// Attaches a resolved intent.
    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    /// Attaches the raw platform payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Returns `true` for plain user messages.
    pub fn is_message(&self) -> bool {
        self.event_type == MESSAGE_EVENT
    }
}

// ============================================================================
// Activity
// ============================================================================

/// A suggested reply shown as a button by platforms that support it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReply {
    /// Label shown to the user.
    pub title: String,
    /// Text sent back when the reply is chosen.
    pub payload: String,
}

impl QuickReply {
    /// Creates a quick reply.
    pub fn new(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            payload: payload.into(),
        }
    }
}

/// Rendered outbound content, ready for an adapter to deliver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Message text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Suggested replies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<QuickReply>,
    /// Platform attachments (cards, files, blocks) as raw JSON.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Value>,
    /// Extra platform-specific fields passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<Value>,
}

impl Activity {
    /// Creates a text-only activity.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Returns the text, or `""` when the activity carries none.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

impl From<&str> for Activity {
    fn from(text: &str) -> Self {
        Activity::text(text)
    }
}

impl From<String> for Activity {
    fn from(text: String) -> Self {
        Activity::text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incoming_defaults_to_message_event() {
        let json = serde_json::json!({
            "reference": {"platform": "web", "conversation_id": "c", "user_id": "u"},
            "text": "hi"
        });
        let msg: IncomingMessage = serde_json::from_value(json).unwrap();
        assert!(msg.is_message());
        assert_eq!(msg.intent, None);
    }

    #[test]
    fn test_activity_skips_empty_fields() {
        let value = serde_json::to_value(Activity::text("hello")).unwrap();
        assert_eq!(value, serde_json::json!({"text": "hello"}));
    }
}
