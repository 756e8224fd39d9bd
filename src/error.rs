//! Error types for the chat service
//!
//! Defines service precondition errors, server connection errors and
//! client-side RPC errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::message::ErrorCode;
use crate::types::UserId;

/// ChatService precondition failures
///
/// Returned to the caller unchanged; the service state is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Send from a user who is not currently joined
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// Poll from a user who is not currently joined (or has left)
    #[error("Unknown user: {0}")]
    UnknownUser(UserId),
}

/// Server-side connection errors
///
/// All of these end the affected connection only; other users keep chatting.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Response channel closed (fatal - write task gone)
    #[error("Channel send error")]
    ChannelSend,
}

/// Client-side RPC errors
///
/// `Remote` is the application error channel; everything else means the
/// transport is unusable.
#[derive(Debug, Error)]
pub enum ClientError {
    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// IO error (console input)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection went away before a reply arrived
    #[error("Connection closed")]
    ConnectionClosed,

    /// Server answered with an error reply
    #[error("{message}")]
    Remote { code: ErrorCode, message: String },

    /// Server answered with the wrong reply type
    #[error("Unexpected reply, expected {0}")]
    UnexpectedReply(&'static str),
}

impl ClientError {
    /// Whether this error came from the transport rather than the service
    pub fn is_transport(&self) -> bool {
        !matches!(self, ClientError::Remote { .. })
    }
}
