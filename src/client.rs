//! RPC client
//!
//! Connects to the chat server over WebSocket and exposes the four service
//! operations as async methods. Calls may be issued concurrently from
//! several tasks; responses are matched to callers by `seq`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, warn};

use crate::error::ClientError;
use crate::message::{Call, Reply, Request, Response};
use crate::service::{JoinOutcome, LeaveOutcome, Updates};
use crate::types::{MessageId, UserId};

/// In-flight calls: seq -> waiting caller. `None` once the connection is gone.
type Pending = Arc<Mutex<Option<HashMap<u64, oneshot::Sender<Reply>>>>>;

/// Connected chat client
pub struct ChatClient {
    /// Client → WebSocket request channel
    outbound: mpsc::Sender<Request>,
    pending: Pending,
    next_seq: AtomicU64,
    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl ChatClient {
    /// Connect to a server at a `ws://` URL
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (ws_stream, _) = connect_async(url).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        debug!("Connected to {}", url);

        let (outbound, mut outbound_rx) = mpsc::channel::<Request>(32);
        let pending: Pending = Arc::new(Mutex::new(Some(HashMap::new())));

        // Spawn write task (Request -> WebSocket)
        let write_pending = Arc::clone(&pending);
        let write_task = tokio::spawn(async move {
            while let Some(req) = outbound_rx.recv().await {
                match serde_json::to_string(&req) {
                    Ok(json) => {
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            debug!("WebSocket send failed, ending write task");
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to serialize request: {}", e);
                    }
                }
            }
            fail_pending(&write_pending).await;
            let _ = ws_sender.close().await;
            debug!("Client write task ended");
        });

        // Spawn read task (WebSocket -> waiting callers)
        let read_pending = Arc::clone(&pending);
        let read_task = tokio::spawn(async move {
            while let Some(msg_result) = ws_receiver.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Response>(&text) {
                        Ok(resp) => {
                            let waiter = read_pending
                                .lock()
                                .await
                                .as_mut()
                                .and_then(|calls| calls.remove(&resp.seq));
                            match waiter {
                                Some(tx) => {
                                    let _ = tx.send(resp.reply);
                                }
                                None => warn!("Reply for unknown seq {}: {:?}", resp.seq, resp.reply),
                            }
                        }
                        Err(e) => warn!("Invalid response from server: {}", e),
                    },
                    Ok(Message::Close(_)) => {
                        debug!("Server sent close frame");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
            fail_pending(&read_pending).await;
            debug!("Client read task ended");
        });

        Ok(Self {
            outbound,
            pending,
            next_seq: AtomicU64::new(1),
            read_task,
            write_task,
        })
    }

    /// Issue a raw call and wait for its reply
    ///
    /// An error reply is returned as `ClientError::Remote`.
    pub async fn call(&self, call: Call) -> Result<Reply, ClientError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        match self.pending.lock().await.as_mut() {
            Some(calls) => {
                calls.insert(seq, tx);
            }
            None => return Err(ClientError::ConnectionClosed),
        }

        if self.outbound.send(Request { seq, call }).await.is_err() {
            if let Some(calls) = self.pending.lock().await.as_mut() {
                calls.remove(&seq);
            }
            return Err(ClientError::ConnectionClosed);
        }

        match rx.await.map_err(|_| ClientError::ConnectionClosed)? {
            Reply::Error { code, message } => Err(ClientError::Remote { code, message }),
            reply => Ok(reply),
        }
    }

    /// Join under the requested name (empty for the default)
    pub async fn join(&self, requested_name: &str) -> Result<JoinOutcome, ClientError> {
        let call = Call::Join {
            requested_name: requested_name.to_string(),
        };
        match self.call(call).await? {
            Reply::Joined {
                assigned_name,
                message,
                ..
            } => Ok(JoinOutcome {
                assigned_name,
                welcome: message,
            }),
            _ => Err(ClientError::UnexpectedReply("joined")),
        }
    }

    /// Broadcast a message
    pub async fn send(&self, user_id: &UserId, content: &str) -> Result<(), ClientError> {
        let call = Call::Send {
            user_id: user_id.clone(),
            content: content.to_string(),
        };
        match self.call(call).await? {
            Reply::Sent { .. } => Ok(()),
            _ => Err(ClientError::UnexpectedReply("sent")),
        }
    }

    /// Poll for messages newer than `since_id`
    pub async fn get_updates(&self, user_id: &UserId, since_id: MessageId) -> Result<Updates, ClientError> {
        let call = Call::GetUpdates {
            user_id: user_id.clone(),
            since_id,
        };
        match self.call(call).await? {
            Reply::Updates {
                messages,
                new_cursor,
            } => Ok(Updates {
                messages,
                new_cursor,
            }),
            _ => Err(ClientError::UnexpectedReply("updates")),
        }
    }

    /// Leave the chat
    pub async fn leave(&self, user_id: &UserId) -> Result<LeaveOutcome, ClientError> {
        let call = Call::Leave {
            user_id: user_id.clone(),
        };
        match self.call(call).await? {
            Reply::Left { message, .. } => Ok(LeaveOutcome { message }),
            _ => Err(ClientError::UnexpectedReply("left")),
        }
    }

    /// Close the connection, flushing queued requests first
    pub async fn close(self) {
        drop(self.outbound);
        let _ = self.write_task.await;
        self.read_task.abort();
    }
}

/// Wake every waiting caller with `ConnectionClosed` and refuse new calls
async fn fail_pending(pending: &Pending) {
    if let Some(calls) = pending.lock().await.take() {
        if !calls.is_empty() {
            debug!("Dropping {} in-flight calls", calls.len());
        }
    }
}
