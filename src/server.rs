//! Connection accept loop
//!
//! Spawns one handler task per accepted connection, all sharing a single
//! `ChatService`.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::handler::handle_connection;
use crate::service::ChatService;

/// Accept connections forever
///
/// A failed accept or a failed connection is logged and never stops the loop.
pub async fn serve(listener: TcpListener, service: Arc<ChatService>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let service = Arc::clone(&service);

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, service).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
