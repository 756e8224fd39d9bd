//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, request
//! decoding, dispatch into the ChatService, and response writing.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::message::{Call, Reply, Request, Response};
use crate::service::ChatService;
use crate::types::{ConnectionId, MessageId, UserId};

/// Users joined over one connection and not yet left: UserId -> join notice ID
pub type Sessions = Mutex<HashMap<UserId, MessageId>>;

/// Handle a new TCP connection
///
/// Performs WebSocket handshake, serves requests until the peer goes away,
/// then leaves on behalf of any user the peer joined and never left.
pub async fn handle_connection(
    stream: TcpStream,
    service: Arc<ChatService>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let conn_id = ConnectionId::generate();
    info!("Connection {} opened from {}", conn_id, peer_addr);

    // Channel for responses -> WebSocket
    let (resp_tx, mut resp_rx) = mpsc::channel::<Response>(32);
    let sessions: Arc<Sessions> = Arc::new(Mutex::new(HashMap::new()));

    let read_service = Arc::clone(&service);
    let read_sessions = Arc::clone(&sessions);

    // Spawn read task (WebSocket -> ChatService -> responses)
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            let response = match msg_result {
                Ok(Message::Text(text)) => match serde_json::from_str::<Request>(&text) {
                    Ok(request) => {
                        debug!("{} -> {} (seq {})", conn_id, request.call.name(), request.seq);
                        Response {
                            seq: request.seq,
                            reply: dispatch(&read_service, &read_sessions, request.call).await,
                        }
                    }
                    Err(e) => {
                        warn!("Invalid request from {}: {}", conn_id, e);
                        Response {
                            seq: 0,
                            reply: e.into(),
                        }
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!("Connection {} sent close frame", conn_id);
                    break;
                }
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping from {}", conn_id);
                    continue;
                }
                Ok(_) => {
                    // Binary or other message types - ignore
                    continue;
                }
                Err(e) => return Err(AppError::from(e)),
            };

            if resp_tx.send(response).await.is_err() {
                return Err(AppError::ChannelSend);
            }
        }
        debug!("Read task ended for {}", conn_id);
        Ok(())
    });

    // Spawn write task (responses -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(resp) = resp_rx.recv().await {
            match serde_json::to_string(&resp) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize response: {}", e);
                }
            }
        }
        debug!("Write task ended for connection");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // The read task is never cancelled: a dispatch in flight always records
    // its join or leave before cleanup runs. It ends on close, on a socket
    // error, or once the write task is gone.
    let result = match read_task.await {
        Ok(result) => result,
        Err(e) => {
            error!("Read task for {} panicked: {}", conn_id, e);
            Ok(())
        }
    };
    // resp_tx was dropped with the read task, so the writer drains and exits
    let _ = write_task.await;

    // Best-effort leave for users this peer abandoned
    let abandoned: Vec<(UserId, MessageId)> = sessions.lock().await.drain().collect();
    for (user_id, join_id) in abandoned {
        if service.leave_session(&user_id, join_id).await {
            info!("Connection {} closed, left on behalf of {}", conn_id, user_id);
        }
    }

    info!(
        "Connection {} closed ({} users still joined)",
        conn_id,
        service.user_count().await
    );

    result
}

/// Run one call against the service and build its reply
///
/// Records joins and leaves in `sessions` so the connection can clean up
/// after itself.
pub async fn dispatch(service: &ChatService, sessions: &Sessions, call: Call) -> Reply {
    match call {
        Call::Join { requested_name } => {
            let (outcome, join_id) = service.join_session(&requested_name).await;
            sessions
                .lock()
                .await
                .insert(outcome.assigned_name.clone(), join_id);
            Reply::Joined {
                success: true,
                assigned_name: outcome.assigned_name,
                message: outcome.welcome,
            }
        }
        Call::Send { user_id, content } => match service.send(&user_id, &content).await {
            Ok(_) => Reply::Sent { success: true },
            Err(e) => e.into(),
        },
        Call::GetUpdates { user_id, since_id } => {
            match service.get_updates(&user_id, since_id).await {
                Ok(updates) => Reply::Updates {
                    messages: updates.messages,
                    new_cursor: updates.new_cursor,
                },
                Err(e) => e.into(),
            }
        }
        Call::Leave { user_id } => {
            let outcome = service.leave(&user_id).await;
            sessions.lock().await.remove(&user_id);
            Reply::Left {
                success: true,
                message: outcome.message,
            }
        }
    }
}
