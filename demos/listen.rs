//! Topic listener demonstration.
//!
//! Demonstrates:
//! - Building a client from environment configuration
//! - Subscribing several callbacks to topics given on the command line
//! - Observing connection state changes across reconnects
//!
//! Usage:
//!   cargo run --example listen -- analysis:42 connection:7
//!   RUST_LOG=realtime_notify=debug cargo run --example listen -- analysis:42
//!
//! Environment:
//!   REALTIME_WEBSOCKET_URL  WebSocket base URL (default ws://localhost:8000/api/v1/ws)
//!   SESSION_TOKEN           Bearer token sent on every connection

// ============================================================================
// Imports
// ============================================================================

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use realtime_notify::{ConnectionState, RealtimeClient, TransportOptions};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let topics: Vec<String> = std::env::args().skip(1).collect();
    if topics.is_empty() {
        anyhow::bail!("usage: listen <topic> [<topic> ...]");
    }

    let options = TransportOptions::from_env().context("reading transport options")?;
    let client = RealtimeClient::builder()
        .options(options)
        .token_provider(|| std::env::var("SESSION_TOKEN").ok())
        .spawn()
        .context("starting realtime client")?;

    info!(client_id = %client.client_id(), endpoint = %client.endpoint(), "Client started");

    let mut handles = Vec::new();
    for topic in &topics {
        let name = topic.clone();
        let handle = client.subscribe_fn(topic.as_str(), move |data| {
            info!(topic = %name, %data, "Notification received, refetch now");
        });
        handles.push((topic.clone(), handle));
    }

    let mut state = client.state_watch();
    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                info!(state = %current, "Connection state changed");
                if current == ConnectionState::Open {
                    client.send(&serde_json::json!({ "action": "ping" }))?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    for (topic, handle) in &handles {
        client.unsubscribe(topic, handle);
    }
    client.shutdown_and_wait().await;

    Ok(())
}
