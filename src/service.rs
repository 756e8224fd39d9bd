//! ChatService implementation
//!
//! The shared state behind every connection: the user registry and the
//! message log, guarded by one coarse `RwLock`. Join, Send and Leave take the
//! write lock for their whole read-modify-write; GetUpdates takes the read
//! lock so concurrent polls proceed in parallel. Nothing inside a critical
//! section awaits or does I/O.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::ServiceError;
use crate::history::MessageLog;
use crate::types::{ChatMessage, MessageId, UserId, DEFAULT_NAME};
use crate::user::User;

/// Number of numeric suffixes tried before falling back to a time-based one
const MAX_SUFFIX_ATTEMPTS: u32 = 100;

/// Result of a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Name actually assigned; may differ from the requested one
    pub assigned_name: UserId,
    /// Welcome text for the console
    pub welcome: String,
}

/// Result of a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Updates {
    pub messages: Vec<ChatMessage>,
    pub new_cursor: MessageId,
}

/// Result of a leave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub message: String,
}

/// Everything guarded by the service lock
#[derive(Debug, Default)]
struct ChatState {
    /// Currently joined users: UserId -> User
    users: HashMap<UserId, User>,
    /// Every message ever sent, in ID order
    history: MessageLog,
}

impl ChatState {
    /// Pick a name not held by any joined user
    ///
    /// Empty requests become `DEFAULT_NAME`. A taken name gets the first free
    /// numeric suffix in 1..=100, then a nanosecond timestamp suffix.
    fn unique_name(&self, requested: &str) -> UserId {
        let base = if requested.is_empty() {
            DEFAULT_NAME
        } else {
            requested
        };

        let candidate = UserId::from(base);
        if !self.users.contains_key(&candidate) {
            return candidate;
        }

        for n in 1..=MAX_SUFFIX_ATTEMPTS {
            let candidate = UserId(format!("{}{}", base, n));
            if !self.users.contains_key(&candidate) {
                return candidate;
            }
        }

        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        UserId(format!("{}_{}", base, nanos))
    }
}

/// The chat service
///
/// A single instance is shared (behind `Arc`) by all connection handlers.
#[derive(Debug, Default)]
pub struct ChatService {
    state: RwLock<ChatState>,
}

impl ChatService {
    /// Create an empty service; the first message gets ID 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user under a unique name and announce the join
    ///
    /// Always succeeds. Joining again under a held name creates a second
    /// user with a suffixed name, never an update of the first.
    pub async fn join(&self, requested_name: &str) -> JoinOutcome {
        self.join_session(requested_name).await.0
    }

    /// Like `join`, also returning the join notice ID that identifies this
    /// particular join for `leave_session`
    pub async fn join_session(&self, requested_name: &str) -> (JoinOutcome, MessageId) {
        let (name, join_id) = {
            let mut state = self.state.write().await;

            let name = state.unique_name(requested_name);
            let join_id = state
                .history
                .append(UserId::system(), format!("User {} joined the chat", name));
            state.users.insert(
                name.clone(),
                User::new(name.clone(), requested_name.to_string(), join_id),
            );

            (name, join_id)
        };

        info!("[JOIN] {} connected (requested '{}')", name, requested_name);
        debug!("Join notice for {} has id {}", name, join_id);

        let outcome = JoinOutcome {
            welcome: format!("Welcome, {}!", name),
            assigned_name: name,
        };
        (outcome, join_id)
    }

    /// Append a message from a joined user
    ///
    /// Fails with `UserNotFound` and no side effect if the user is not joined.
    /// Content is not validated.
    pub async fn send(&self, user_id: &UserId, content: &str) -> Result<MessageId, ServiceError> {
        let id = {
            let mut state = self.state.write().await;
            let ChatState { users, history } = &mut *state;

            let Some(user) = users.get_mut(user_id) else {
                return Err(ServiceError::UserNotFound(user_id.clone()));
            };

            let id = history.append(user_id.clone(), content.to_string());
            user.mark_seen(id);
            id
        };

        info!("[MSG] {}: {}", user_id, content);
        Ok(id)
    }

    /// Messages newer than `since` that the caller did not author
    ///
    /// Fails with `UnknownUser` if the caller is not joined, including after
    /// it has left. The cursor advances past the caller's own messages too.
    pub async fn get_updates(&self, user_id: &UserId, since: MessageId) -> Result<Updates, ServiceError> {
        let state = self.state.read().await;

        if !state.users.contains_key(user_id) {
            return Err(ServiceError::UnknownUser(user_id.clone()));
        }

        let (messages, new_cursor) = state.history.updates_for(user_id, since);
        Ok(Updates {
            messages,
            new_cursor,
        })
    }

    /// Remove a user and announce the departure
    ///
    /// Idempotent: leaving when not joined succeeds without a notice.
    pub async fn leave(&self, user_id: &UserId) -> LeaveOutcome {
        let removed = self.remove_user(user_id, None).await;

        match removed {
            Some(_) => LeaveOutcome {
                message: "Left chat successfully".to_string(),
            },
            None => LeaveOutcome {
                message: format!("User {} was not in the chat", user_id),
            },
        }
    }

    /// Leave only if `user_id` is still held by the join that returned
    /// `join_id`; a later holder of the same name is left alone
    ///
    /// Returns whether the user was removed.
    pub async fn leave_session(&self, user_id: &UserId, join_id: MessageId) -> bool {
        self.remove_user(user_id, Some(join_id)).await.is_some()
    }

    async fn remove_user(&self, user_id: &UserId, join_id: Option<MessageId>) -> Option<User> {
        let removed = {
            let mut state = self.state.write().await;

            let held = state
                .users
                .get(user_id)
                .is_some_and(|user| join_id.unwrap_or(user.join_id) == user.join_id);

            if held {
                let user = state.users.remove(user_id);
                state
                    .history
                    .append(UserId::system(), format!("User {} left the chat", user_id));
                user
            } else {
                None
            }
        };

        match &removed {
            Some(user) => info!(
                "[LEAVE] {} disconnected (requested '{}', joined at {}, last seen {})",
                user_id, user.requested_name, user.joined_at, user.last_seen_id
            ),
            None => debug!("Leave for {} ignored, not joined or joined again since", user_id),
        }
        removed
    }

    /// Number of currently joined users
    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    /// Whether the given name is currently held
    #[cfg(test)]
    pub async fn is_joined(&self, user_id: &UserId) -> bool {
        self.state.read().await.users.contains_key(user_id)
    }

    /// Snapshot of the whole history, in ID order
    #[cfg(test)]
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.state.read().await.history.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::types::SYSTEM_SENDER;

    #[tokio::test]
    async fn test_empty_name_becomes_guest() {
        let service = ChatService::new();

        let first = service.join("").await;
        assert_eq!(first.assigned_name.as_str(), "Guest");
        assert_eq!(first.welcome, "Welcome, Guest!");

        let second = service.join("").await;
        assert_eq!(second.assigned_name.as_str(), "Guest1");

        let third = service.join("Guest1").await;
        assert_ne!(third.assigned_name.as_str(), "Guest1");
        assert_eq!(third.assigned_name.as_str(), "Guest11");
    }

    #[tokio::test]
    async fn test_suffixes_fill_in_order() {
        let service = ChatService::new();

        let names: Vec<_> = join_repeatedly(&service, "bob", 4).await;
        assert_eq!(names, vec!["bob", "bob1", "bob2", "bob3"]);

        service.leave(&UserId::from("bob1")).await;
        assert_eq!(service.join("bob").await.assigned_name.as_str(), "bob1");
    }

    async fn join_repeatedly(service: &ChatService, name: &str, n: usize) -> Vec<String> {
        let mut names = Vec::new();
        for _ in 0..n {
            names.push(service.join(name).await.assigned_name.0);
        }
        names
    }

    #[tokio::test]
    async fn test_fallback_after_bounded_attempts() {
        let service = ChatService::new();

        // Occupies "x" and "x1" through "x100"
        for _ in 0..=MAX_SUFFIX_ATTEMPTS {
            service.join("x").await;
        }
        assert!(service.is_joined(&UserId::from("x100")).await);

        let overflow = service.join("x").await;
        assert!(overflow.assigned_name.as_str().starts_with("x_"));
        assert_eq!(service.user_count().await, MAX_SUFFIX_ATTEMPTS as usize + 2);
    }

    #[tokio::test]
    async fn test_join_appends_system_notice() {
        let service = ChatService::new();
        service.join("alice").await;

        let history = service.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, 1);
        assert_eq!(history[0].sender.as_str(), SYSTEM_SENDER);
        assert_eq!(history[0].content, "User alice joined the chat");
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let service = ChatService::new();
        let alice = service.join("A").await.assigned_name;
        let bob = service.join("B").await.assigned_name;

        let hi_id = service.send(&alice, "hi").await.unwrap();

        let updates = service.get_updates(&bob, 0).await.unwrap();
        let chats: Vec<_> = updates.messages.iter().filter(|m| !m.is_system()).collect();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].content, "hi");
        assert_eq!(chats[0].sender, alice);
        assert_eq!(updates.new_cursor, hi_id);

        // Only system notices besides "hi", and none authored by bob
        assert!(updates
            .messages
            .iter()
            .all(|m| m.is_system() || m.id == hi_id));
    }

    #[tokio::test]
    async fn test_own_messages_never_echoed() {
        let service = ChatService::new();
        let alice = service.join("A").await.assigned_name;
        service.join("B").await;

        service.send(&alice, "one").await.unwrap();
        let last = service.send(&alice, "two").await.unwrap();

        for since in 0..=last {
            let updates = service.get_updates(&alice, since).await.unwrap();
            assert!(updates.messages.iter().all(|m| m.sender != alice));
        }

        let updates = service.get_updates(&alice, last).await.unwrap();
        assert!(updates.messages.is_empty());
        assert_eq!(updates.new_cursor, last);
    }

    #[tokio::test]
    async fn test_cursor_no_duplicates_no_losses() {
        let service = ChatService::new();
        let alice = service.join("A").await.assigned_name;
        let bob = service.join("B").await.assigned_name;

        service.send(&bob, "first").await.unwrap();
        service.send(&alice, "mine").await.unwrap();
        let first = service.get_updates(&alice, 0).await.unwrap();

        service.send(&bob, "second").await.unwrap();
        let second = service.get_updates(&alice, first.new_cursor).await.unwrap();

        let first_ids: HashSet<_> = first.messages.iter().map(|m| m.id).collect();
        assert!(second.messages.iter().all(|m| !first_ids.contains(&m.id)));

        let delivered: Vec<_> = first
            .messages
            .iter()
            .chain(second.messages.iter())
            .filter(|m| m.sender == bob)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(delivered, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_send_unknown_user_fails_without_side_effect() {
        let service = ChatService::new();
        let ghost = UserId::from("ghost");

        let err = service.send(&ghost, "boo").await.unwrap_err();
        assert_eq!(err, ServiceError::UserNotFound(ghost));
        assert!(service.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_get_updates_unknown_user() {
        let service = ChatService::new();
        let ghost = UserId::from("ghost");

        let err = service.get_updates(&ghost, 0).await.unwrap_err();
        assert_eq!(err, ServiceError::UnknownUser(ghost));
    }

    #[tokio::test]
    async fn test_leave_is_idempotent() {
        let service = ChatService::new();
        let alice = service.join("A").await.assigned_name;

        let first = service.leave(&alice).await;
        assert_eq!(first.message, "Left chat successfully");
        service.leave(&alice).await;

        let departures = service
            .history()
            .await
            .iter()
            .filter(|m| m.content == "User A left the chat")
            .count();
        assert_eq!(departures, 1);
        assert_eq!(service.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_leave_session_spares_later_holder() {
        let service = ChatService::new();

        let (first, first_join) = service.join_session("alice").await;
        service.leave(&first.assigned_name).await;
        let (second, second_join) = service.join_session("alice").await;
        assert_eq!(second.assigned_name, first.assigned_name);
        assert_ne!(first_join, second_join);

        // Stale join: the current "alice" stays
        assert!(!service.leave_session(&first.assigned_name, first_join).await);
        assert!(service.is_joined(&second.assigned_name).await);
        assert!(service.send(&second.assigned_name, "still here").await.is_ok());

        assert!(service.leave_session(&second.assigned_name, second_join).await);
        assert!(!service.is_joined(&second.assigned_name).await);
    }

    #[tokio::test]
    async fn test_send_after_leave_fails() {
        let service = ChatService::new();
        let alice = service.join("A").await.assigned_name;
        service.leave(&alice).await;

        assert_eq!(
            service.send(&alice, "still here?").await,
            Err(ServiceError::UserNotFound(alice.clone()))
        );
        assert_eq!(
            service.get_updates(&alice, 0).await,
            Err(ServiceError::UnknownUser(alice))
        );
    }

    #[tokio::test]
    async fn test_empty_content_accepted() {
        let service = ChatService::new();
        let alice = service.join("A").await.assigned_name;

        assert!(service.send(&alice, "").await.is_ok());
        assert!(service.send(&alice, "   ").await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_get_distinct_names() {
        let service = Arc::new(ChatService::new());

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.join("same").await.assigned_name })
            })
            .collect();

        let mut names = HashSet::new();
        for handle in handles {
            assert!(names.insert(handle.await.unwrap()));
        }
        assert_eq!(names.len(), 64);
        assert_eq!(service.user_count().await, 64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ids_strictly_increasing() {
        let service = Arc::new(ChatService::new());
        let mut users = Vec::new();
        for i in 0..8 {
            users.push(service.join(&format!("user{}", i)).await.assigned_name);
        }

        let handles: Vec<_> = users
            .into_iter()
            .map(|user| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    for n in 0..25 {
                        service.send(&user, &format!("{} {}", user, n)).await.unwrap();
                    }
                    service.leave(&user).await;
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let ids: Vec<_> = service.history().await.iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), 8 + 8 * 25 + 8);
        assert!(ids.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(ids[0], 1);
    }
}
