//! Append-only message log
//!
//! Owns the message ID counter so that ID assignment and append happen as
//! one step. Messages are never reordered, edited or removed.

use chrono::Utc;

use crate::types::{ChatMessage, MessageId, UserId};

/// Ordered sequence of every message sent since startup
///
/// IDs start at 1 and increase by one per append, so the log is sorted by ID.
#[derive(Debug)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
    next_id: MessageId,
}

impl MessageLog {
    /// Create an empty log whose first message will get ID 1
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_id: 1,
        }
    }

    /// Assign the next ID and append a message
    ///
    /// Returns the assigned ID.
    pub fn append(&mut self, sender: UserId, content: String) -> MessageId {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            sender,
            content,
            timestamp: Utc::now(),
        });
        id
    }

    /// Select messages newer than `since` that `reader` did not author
    ///
    /// The returned cursor is the highest ID past `since`, including IDs
    /// skipped because `reader` authored them. With nothing newer, the cursor
    /// is `since` unchanged.
    pub fn updates_for(&self, reader: &UserId, since: MessageId) -> (Vec<ChatMessage>, MessageId) {
        let start = self.messages.partition_point(|m| m.id <= since);
        let newer = &self.messages[start..];

        let cursor = newer.last().map_or(since, |m| m.id);
        let messages = newer
            .iter()
            .filter(|m| &m.sender != reader)
            .cloned()
            .collect();

        (messages, cursor)
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}
