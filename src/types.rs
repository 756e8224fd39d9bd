//! Basic type definitions for the chat service
//!
//! Provides newtype wrappers for type safety:
//! - `UserId`: the display name a user was assigned at join time
//! - `MessageId`: monotonically increasing message identifier
//! - `ConnectionId`: UUID-based identifier for a transport connection
//!
//! Also defines `ChatMessage`, the immutable record stored in the history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sender tag used for join/leave notices generated by the service
pub const SYSTEM_SENDER: &str = "System";

/// Name substituted when a user joins with an empty name
pub const DEFAULT_NAME: &str = "Guest";

/// Message identifier. Starts at 1; 0 is the "nothing seen yet" cursor.
pub type MessageId = u64;

/// Unique user identifier (newtype pattern)
///
/// The assigned display name doubles as the primary key. It is unique among
/// currently joined users and may be reused once its holder has left.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// The reserved sender identity for service-generated notices
    pub fn system() -> Self {
        Self(SYSTEM_SENDER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for UserId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4. Only used to correlate log lines for one transport
/// connection; it never appears in the chat state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Generate a new random connection ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single chat message
///
/// Immutable once appended to the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender: UserId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Whether this message was generated by the service itself
    pub fn is_system(&self) -> bool {
        self.sender.as_str() == SYSTEM_SENDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_unique() {
        let id1 = ConnectionId::generate();
        let id2 = ConnectionId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_user_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&UserId::from("alice")).unwrap();
        assert_eq!(json, "\"alice\"");

        let id: UserId = serde_json::from_str("\"bob\"").unwrap();
        assert_eq!(id, UserId::from("bob"));
    }

    #[test]
    fn test_system_message_detection() {
        let notice = ChatMessage {
            id: 1,
            sender: UserId::system(),
            content: "User alice joined the chat".to_string(),
            timestamp: Utc::now(),
        };
        assert!(notice.is_system());

        let chat = ChatMessage {
            sender: UserId::from("alice"),
            ..notice
        };
        assert!(!chat.is_system());
    }
}
