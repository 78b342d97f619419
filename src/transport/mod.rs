//! WebSocket transport layer.
//!
//! This module owns the single socket shared by every subscriber.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐                      ┌──────────────┐
//! │  RealtimeClient              │                      │  Server      │
//! │                              │      WebSocket       │              │
//! │  Multiplexer ◄── Supervisor ─┼─────────────────────►│  /ws/{id}    │
//! │  (registry,     (reconnect,  │                      │              │
//! │   send gate)     conn loop)  │                      │              │
//! └──────────────────────────────┘                      └──────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Supervisor` marks the state `Connecting` and asks the [`Connector`]
//!    for a socket
//! 2. On success the connection loop attaches to the [`Multiplexer`], which
//!    queues `authenticate` and one `subscribe` per registered topic
//! 3. Inbound frames are dispatched until the socket closes or fails
//! 4. State becomes `Closed`; after the reconnect delay the cycle restarts
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Event loop for one open socket |
//! | `connector` | Socket factory trait and tungstenite implementation |
//! | `dispatch` | Inbound frame routing with per-callback isolation |
//! | `multiplexer` | Registry, state and send gate behind one lock |
//! | `state` | [`ConnectionState`] |
//! | `supervisor` | Reconnect loop |

// ============================================================================
// Submodules
// ============================================================================

/// Event loop for one open socket.
pub mod connection;

/// Socket factory abstraction.
pub mod connector;

/// Inbound frame dispatch.
pub mod dispatch;

/// Shared transport core.
pub mod multiplexer;

/// Connection state.
pub mod state;

/// Reconnect loop.
pub(crate) mod supervisor;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::CloseReason;
pub use connector::{Connector, FrameReader, FrameWriter, SocketPair, TungsteniteConnector};
pub use dispatch::DispatchOutcome;
pub use multiplexer::Multiplexer;
pub use state::ConnectionState;
