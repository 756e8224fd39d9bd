//! Chat server - Entry Point
//!
//! Starts the TCP listener and serves the shared ChatService.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rpc_chat::config::ServerArgs;
use rpc_chat::{serve, ChatService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=rpc_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rpc_chat=info")),
        )
        .init();

    let args = ServerArgs::parse();

    let listener = TcpListener::bind(&args.addr).await?;
    info!("Chat server listening on {}", args.addr);

    let service = Arc::new(ChatService::new());
    serve(listener, service).await;

    Ok(())
}
