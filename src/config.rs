//! Command line configuration for the two binaries

use std::time::Duration;

use clap::Parser;

use crate::console::DEFAULT_POLL_INTERVAL;

/// Default server bind address
pub const DEFAULT_ADDR: &str = "127.0.0.1:1234";

/// Default server URL for the client
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:1234";

#[derive(Debug, Parser)]
#[command(name = "chat_server", version, about = "Multi-user polling chat server")]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long, default_value = DEFAULT_ADDR, value_name = "ADDR")]
    pub addr: String,
}

#[derive(Debug, Parser)]
#[command(name = "chat_client", version, about = "Interactive chat client")]
pub struct ClientArgs {
    /// Server WebSocket URL
    #[arg(long, default_value = DEFAULT_SERVER_URL, value_name = "URL")]
    pub server: String,

    /// Username to join with; prompts when omitted
    #[arg(long)]
    pub name: Option<String>,

    /// Delay between polls for new messages
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64, value_name = "MS")]
    pub poll_interval_ms: u64,
}

impl ClientArgs {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
