//! Realtime Notify - single-socket topic notifications over WebSocket.
//!
//! This library multiplexes any number of independent subscribers over one
//! persistent WebSocket connection. It reconnects on its own and, after
//! every reconnect, re-authenticates and replays all subscriptions.
//!
//! # Architecture
//!
//! - **Connection manager**: one socket at a time, fixed-delay reconnects
//! - **Subscription registry**: topic → callbacks, the source of truth for
//!   what is subscribed on the wire
//! - **Dispatcher**: routes `{topic, data}` frames to callbacks, isolating
//!   panics per callback
//! - **Send gate**: application payloads go out only while connected
//!
//! Delivery is at-most-once. A notification means "something changed,
//! refetch it", not an authoritative event log.
//!
//! # Quick Start
//!
//! ```no_run
//! use realtime_notify::{RealtimeClient, Result, TransportOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = RealtimeClient::builder()
//!         .options(TransportOptions::from_env()?)
//!         .token_provider(|| std::env::var("SESSION_TOKEN").ok())
//!         .spawn()?;
//!
//!     let handle = client.subscribe_fn("analysis:42", |data| {
//!         println!("analysis updated: {data}");
//!     });
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     client.unsubscribe("analysis:42", &handle);
//!     client.shutdown_and_wait().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | Bearer token providers |
//! | [`client`] | [`RealtimeClient`], builder and options |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | [`ClientId`] and [`Topic`] |
//! | [`protocol`] | Wire frame types |
//! | [`subscription`] | Callbacks and the topic registry |
//! | [`transport`] | Socket lifecycle, dispatch and reconnects |

// ============================================================================
// Modules
// ============================================================================

/// Bearer token providers.
pub mod auth;

/// Client factory and configuration.
///
/// Use [`RealtimeClient::builder()`] to create a client.
pub mod client;

/// Error types and result aliases.
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// WebSocket protocol frame types.
pub mod protocol;

/// Subscriber callbacks and the topic registry.
pub mod subscription;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Auth types
pub use auth::{NoToken, StaticToken, TokenProvider};

// Client types
pub use client::{RealtimeClient, RealtimeClientBuilder, TransportOptions};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ClientId, Topic};

// Subscription types
pub use subscription::Callback;

// Transport types
pub use transport::{ConnectionState, Connector, TungsteniteConnector};
