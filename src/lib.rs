//! Multi-user Polling Chat Service Library
//!
//! Clients join under a username, broadcast text messages and poll for
//! messages from other participants.
//!
//! # Features
//! - Join with unique-name resolution (`Guest`, `Guest1`, ...)
//! - Send to a shared, append-only message log
//! - Cursor-based polling that never echoes a user's own messages
//! - Idempotent leave, also issued on behalf of users whose connection drops
//! - JSON RPC over WebSocket, with an interactive console client
//!
//! # Architecture
//! - `ChatService` holds the user registry and message log behind one
//!   `RwLock`: join, send and leave write, polls read
//! - Each connection has a `handler` task that decodes requests and calls
//!   the service directly
//! - `ChatClient` multiplexes concurrent calls over one connection
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use rpc_chat::{serve, ChatService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:1234").await.unwrap();
//!     serve(listener, Arc::new(ChatService::new())).await;
//! }
//! ```

pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod handler;
pub mod history;
pub mod message;
pub mod server;
pub mod service;
pub mod types;
pub mod user;

// Re-export main types for convenience
pub use client::ChatClient;
pub use error::{AppError, ClientError, ServiceError};
pub use handler::handle_connection;
pub use history::MessageLog;
pub use message::{Call, ErrorCode, Reply, Request, Response};
pub use server::serve;
pub use service::{ChatService, JoinOutcome, LeaveOutcome, Updates};
pub use types::{ChatMessage, ConnectionId, MessageId, UserId, DEFAULT_NAME, SYSTEM_SENDER};
pub use user::User;
