//! In-memory conversation log.
//!
//! The log is an ordered, capacity-bounded sequence of [`ChatMessage`]
//! values. It is owned exclusively by the conversation store; callers only
//! ever observe snapshots of it.

use crate::message::{ChatMessage, MessagePatch};

/// Default maximum number of messages retained in a conversation.
pub const DEFAULT_CAPACITY: usize = 100;

/// An ordered, capacity-bounded conversation log.
///
/// Insertion order is chronological. When an append pushes the log past its
/// capacity, the oldest message is evicted (FIFO).
#[derive(Debug, Clone)]
pub struct ConversationLog {
    messages: Vec<ChatMessage>,
    capacity: usize,
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationLog {
    /// Creates an empty log with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty log with the given capacity.
    ///
    /// A capacity of zero is treated as one; an empty log cannot hold a
    /// conversation.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Rebuilds a log from persisted messages, trimming to capacity.
    ///
    /// When the snapshot holds more messages than the capacity allows, the
    /// oldest entries are dropped.
    pub fn from_messages(messages: Vec<ChatMessage>, capacity: usize) -> Self {
        let mut log = Self::with_capacity(capacity);
        let overflow = messages.len().saturating_sub(log.capacity);
        log.messages = messages.into_iter().skip(overflow).collect();
        log
    }

    /// Appends a message to the end of the log.
    ///
    /// Returns the evicted message if the append pushed the log past its
    /// capacity.
    pub fn append(&mut self, message: ChatMessage) -> Option<ChatMessage> {
        self.messages.push(message);
        if self.messages.len() > self.capacity {
            Some(self.messages.remove(0))
        } else {
            None
        }
    }

    /// Merges a partial update into the message with the given id.
    ///
    /// Returns `false` (a no-op) if no message carries that id.
    pub fn update(&mut self, id: &str, patch: &MessagePatch) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                patch.apply(message);
                true
            }
            None => false,
        }
    }

    /// Removes the message with the given id, returning it if present.
    pub fn remove(&mut self, id: &str) -> Option<ChatMessage> {
        let index = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(index))
    }

    /// Empties the log.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Returns the ordered messages.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Returns the last `n` messages in chronological order.
    pub fn tail(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Returns the position of the message with the given id.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    /// Returns the message with the given id.
    pub fn get(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns an owned snapshot of the log for persistence.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut log = ConversationLog::new();
        log.append(ChatMessage::user("first"));
        log.append(ChatMessage::assistant("second"));

        let contents: Vec<&str> = log.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[test]
    fn test_append_evicts_oldest_past_capacity() {
        let mut log = ConversationLog::with_capacity(100);
        for i in 0..100 {
            assert!(log.append(ChatMessage::user(format!("msg {i}"))).is_none());
        }

        let evicted = log.append(ChatMessage::user("msg 100"));
        assert_eq!(evicted.unwrap().content, "msg 0");
        assert_eq!(log.len(), 100);
        assert_eq!(log.messages()[0].content, "msg 1");
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut log = ConversationLog::new();
        log.append(ChatMessage::user("hello"));

        assert!(!log.update("missing", &MessagePatch::finish("changed")));
        assert_eq!(log.messages()[0].content, "hello");
    }

    #[test]
    fn test_update_merges_patch() {
        let mut log = ConversationLog::new();
        let placeholder = ChatMessage::placeholder(true);
        let id = placeholder.id.clone();
        log.append(placeholder);

        assert!(log.update(&id, &MessagePatch::finish("done")));
        let message = log.get(&id).unwrap();
        assert_eq!(message.content, "done");
        assert!(!message.is_streaming);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut log = ConversationLog::new();
        let message = ChatMessage::user("hello");
        let id = message.id.clone();
        log.append(message);
        log.append(ChatMessage::assistant("hi"));

        assert!(log.remove(&id).is_some());
        assert_eq!(log.len(), 1);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_tail_returns_most_recent() {
        let mut log = ConversationLog::new();
        for i in 0..15 {
            log.append(ChatMessage::user(format!("msg {i}")));
        }

        let tail = log.tail(10);
        assert_eq!(tail.len(), 10);
        assert_eq!(tail[0].content, "msg 5");
        assert_eq!(tail[9].content, "msg 14");
    }

    #[test]
    fn test_from_messages_trims_to_capacity() {
        let messages: Vec<ChatMessage> =
            (0..5).map(|i| ChatMessage::user(format!("msg {i}"))).collect();
        let log = ConversationLog::from_messages(messages, 3);
        assert_eq!(log.len(), 3);
        assert_eq!(log.messages()[0].content, "msg 2");
    }
}
