//! User struct definition
//!
//! Represents a joined participant in the chat registry.

use chrono::{DateTime, Utc};

use crate::types::{MessageId, UserId};

/// Joined user information
///
/// Created by `ChatService::join` and dropped by `ChatService::leave`.
#[derive(Debug, Clone)]
pub struct User {
    /// Assigned display name, also the registry key
    pub id: UserId,
    /// Highest message ID this user authored or was placed after at join.
    /// Diagnostic only: polling uses the cursor the client supplies.
    pub last_seen_id: MessageId,
    /// Join time
    pub joined_at: DateTime<Utc>,
    /// Name originally asked for (may be empty)
    pub requested_name: String,
    /// ID of this user's join notice. Tells this join apart from earlier
    /// holders of the same name.
    pub join_id: MessageId,
}

impl User {
    /// Create a new user record announced by the notice `join_id`
    pub fn new(id: UserId, requested_name: String, join_id: MessageId) -> Self {
        Self {
            id,
            last_seen_id: join_id - 1,
            joined_at: Utc::now(),
            requested_name,
            join_id,
        }
    }

    /// Record that the user has seen (or authored) the given message
    pub fn mark_seen(&mut self, id: MessageId) {
        self.last_seen_id = self.last_seen_id.max(id);
    }
}
