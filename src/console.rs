//! Interactive console session
//!
//! Join → (input loop sending messages, background task polling for
//! updates) → best-effort Leave. One watch channel carries the stop signal
//! to both halves.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::client::ChatClient;
use crate::error::ClientError;
use crate::types::{ChatMessage, MessageId, UserId};

/// Default delay between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Format an incoming message for display
pub fn render(msg: &ChatMessage) -> String {
    if msg.is_system() {
        format!("[SYSTEM] {}", msg.content)
    } else {
        format!("{}: {}", msg.sender, msg.content)
    }
}

/// Whether an input line ends the session
pub fn is_exit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("exit")
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Run one chat session to completion
///
/// Prompts for a name on `input` unless `requested_name` is given. Only a
/// failed join is returned as an error; everything after that ends the
/// session quietly.
pub async fn run<R>(
    client: ChatClient,
    requested_name: Option<String>,
    poll_interval: Duration,
    input: R,
) -> Result<(), ClientError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    let requested_name = match requested_name {
        Some(name) => name,
        None => {
            print!("Enter a username (or leave blank for default): ");
            let _ = std::io::stdout().flush();
            lines.next_line().await?.unwrap_or_default()
        }
    };

    let joined = client.join(requested_name.trim()).await?;
    let user_id = joined.assigned_name;
    println!("\n{}", joined.welcome);
    println!("Type messages below. 'exit' to quit.");

    let client = Arc::new(client);
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let stop_tx = Arc::new(stop_tx);

    let poller = spawn_poller(
        Arc::clone(&client),
        user_id.clone(),
        poll_interval,
        Arc::clone(&stop_tx),
        stop_rx.clone(),
    );

    loop {
        prompt();
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = stop_rx.changed() => break,
        };

        let text = match line {
            Ok(Some(text)) => text,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read input: {}", e);
                break;
            }
        };
        let text = text.trim();

        if is_exit_command(text) {
            println!("Exiting chat...");
            break;
        }
        if text.is_empty() {
            continue;
        }

        match client.send(&user_id, text).await {
            Ok(()) => println!("\n[You] {}", text),
            Err(e) if e.is_transport() => {
                println!("[Send error] {}", e);
                break;
            }
            Err(e) => println!("[Send error] {}", e),
        }
    }

    let _ = stop_tx.send(true);
    let _ = poller.await;

    // Best-effort leave; the connection may already be gone
    if let Err(e) = client.leave(&user_id).await {
        debug!("Leave for {} failed: {}", user_id, e);
    }

    if let Ok(client) = Arc::try_unwrap(client) {
        client.close().await;
    }

    Ok(())
}

/// Poll for updates until stopped or a call fails
///
/// Any failure raises the stop signal so the input loop ends as well.
fn spawn_poller(
    client: Arc<ChatClient>,
    user_id: UserId,
    interval: Duration,
    stop_tx: Arc<watch::Sender<bool>>,
    mut stop_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut cursor: MessageId = 0;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = ticker.tick() => {
                    match client.get_updates(&user_id, cursor).await {
                        Ok(updates) => {
                            for msg in &updates.messages {
                                println!("\n{}", render(msg));
                                prompt();
                            }
                            cursor = updates.new_cursor;
                        }
                        Err(e) => {
                            println!("\n[Connection lost]");
                            debug!("Polling for {} stopped: {}", user_id, e);
                            let _ = stop_tx.send(true);
                            break;
                        }
                    }
                }
            }
        }
        debug!("Poller for {} ended at cursor {}", user_id, cursor);
    })
}
