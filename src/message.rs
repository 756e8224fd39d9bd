//! RPC protocol definitions
//!
//! JSON request/response envelopes carried in WebSocket text frames.
//! Each request carries a client-chosen `seq` that the matching response
//! echoes, so one connection can have several calls in flight.

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::types::{ChatMessage, MessageId, UserId};

/// Client → Server request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub seq: u64,
    pub call: Call,
}

/// The four operations exposed by the chat service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Call {
    /// Join under a requested display name (may be empty)
    Join { requested_name: String },
    /// Broadcast a message
    Send { user_id: UserId, content: String },
    /// Poll for messages newer than `since_id`
    GetUpdates { user_id: UserId, since_id: MessageId },
    /// Leave the chat
    Leave { user_id: UserId },
}

impl Call {
    /// Operation name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            Call::Join { .. } => "join",
            Call::Send { .. } => "send",
            Call::GetUpdates { .. } => "get_updates",
            Call::Leave { .. } => "leave",
        }
    }
}

/// Server → Client response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Echo of the request `seq`; 0 when the request could not be decoded
    pub seq: u64,
    pub reply: Reply,
}

/// Operation results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    /// Join result
    Joined {
        success: bool,
        assigned_name: UserId,
        message: String,
    },
    /// Send result
    Sent { success: bool },
    /// GetUpdates result
    Updates {
        messages: Vec<ChatMessage>,
        new_cursor: MessageId,
    },
    /// Leave result
    Left { success: bool, message: String },
    /// Error occurred
    Error { code: ErrorCode, message: String },
}

/// Error codes for Reply::Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Send from a user who is not joined
    UserNotFound,
    /// Poll from a user who is not joined
    UnknownUser,
    /// Frame could not be decoded as a request
    InvalidRequest,
}

/// Convert ServiceError to Reply for client notification
impl From<ServiceError> for Reply {
    fn from(err: ServiceError) -> Self {
        let code = match &err {
            ServiceError::UserNotFound(_) => ErrorCode::UserNotFound,
            ServiceError::UnknownUser(_) => ErrorCode::UnknownUser,
        };
        Reply::Error {
            code,
            message: err.to_string(),
        }
    }
}

/// Convert a request decode error to Reply for client notification
impl From<serde_json::Error> for Reply {
    fn from(err: serde_json::Error) -> Self {
        Reply::Error {
            code: ErrorCode::InvalidRequest,
            message: format!("Invalid request format: {}", err),
        }
    }
}
