//! Chat client - Entry Point
//!
//! Connects to the server and runs an interactive console session.

use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use rpc_chat::config::ClientArgs;
use rpc_chat::{console, ChatClient};

#[tokio::main]
async fn main() {
    // Logs go to stderr so they stay out of the chat transcript
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rpc_chat=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = ClientArgs::parse();

    let client = match ChatClient::connect(&args.server).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Unable to connect to server: {}", e);
            std::process::exit(1);
        }
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let result = console::run(client, args.name.clone(), args.poll_interval(), stdin).await;

    // Exit directly: a pending stdin read would otherwise hold the runtime open
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Join failed: {}", e);
            std::process::exit(1);
        }
    }
}
