//! Conversation message types.
//!
//! This module contains types for representing messages in a conversation,
//! including roles, message content, and streaming/error state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents the role of a message in a conversation.
///
/// Serialized in lowercase to match the completion wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the AI assistant.
    Assistant,
    /// System-generated message.
    System,
}

/// A single message in a conversation history.
///
/// Each message has a unique id, a role, content, and a creation timestamp.
/// Assistant messages additionally track whether they are still receiving
/// streamed content and whether the turn that produced them failed.
///
/// A terminal message carries either content or an error, never both as its
/// outcome: a failed turn keeps whatever content had accumulated but is
/// marked with a non-empty `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message identifier (UUID format).
    pub id: String,
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
    /// Timestamp when the message was created.
    pub created_at: DateTime<Utc>,
    /// True while streamed fragments are still being appended.
    #[serde(default)]
    pub is_streaming: bool,
    /// Error description if the turn that produced this message failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatMessage {
    /// Creates a message with the given role and content.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            is_streaming: false,
            error: None,
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Creates an empty assistant placeholder awaiting a completion.
    ///
    /// The placeholder is marked as streaming when the turn will receive
    /// incremental delta frames.
    pub fn placeholder(streaming: bool) -> Self {
        let mut message = Self::assistant("");
        message.is_streaming = streaming;
        message
    }

    /// Returns true if the turn that produced this message failed.
    pub fn is_failed(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }
}

/// A partial update merged into an existing message.
///
/// Unset fields leave the corresponding message field untouched. `error`
/// uses a nested `Option` so a patch can explicitly clear a previous error.
#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub is_streaming: Option<bool>,
    pub error: Option<Option<String>>,
}

impl MessagePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the message content.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets the streaming flag.
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.is_streaming = Some(streaming);
        self
    }

    /// Attaches an error description.
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    /// Clears any previously attached error.
    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    /// Marks a streamed or batch turn as finished with its final content.
    pub fn finish(content: impl Into<String>) -> Self {
        Self::new().content(content).streaming(false)
    }

    /// Marks a turn as failed, keeping whatever content had accumulated.
    pub fn fail(error: impl Into<String>) -> Self {
        Self::new().streaming(false).error(error)
    }

    /// Applies this patch to a message.
    pub fn apply(&self, message: &mut ChatMessage) {
        if let Some(content) = &self.content {
            message.content = content.clone();
        }
        if let Some(streaming) = self.is_streaming {
            message.is_streaming = streaming;
        }
        if let Some(error) = &self.error {
            message.error = error.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_placeholder_is_empty_assistant() {
        let message = ChatMessage::placeholder(true);
        assert_eq!(message.role, MessageRole::Assistant);
        assert!(message.content.is_empty());
        assert!(message.is_streaming);
        assert!(!message.is_failed());
    }

    #[test]
    fn test_patch_merges_fields() {
        let mut message = ChatMessage::placeholder(true);
        MessagePatch::finish("Hello").apply(&mut message);
        assert_eq!(message.content, "Hello");
        assert!(!message.is_streaming);
        assert!(message.error.is_none());
    }

    #[test]
    fn test_fail_patch_keeps_content() {
        let mut message = ChatMessage::assistant("partial");
        message.is_streaming = true;
        MessagePatch::fail("network error").apply(&mut message);
        assert_eq!(message.content, "partial");
        assert!(!message.is_streaming);
        assert!(message.is_failed());
    }

    #[test]
    fn test_message_round_trips_through_json() {
        let message = ChatMessage::user("Hello");
        let json = serde_json::to_string(&message).unwrap();
        let restored: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, message);
    }
}
