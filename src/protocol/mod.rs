//! WebSocket protocol frame types.
//!
//! All frames are JSON text messages.
//!
//! # Protocol Overview
//!
//! | Frame | Direction | Purpose |
//! |-------|-----------|---------|
//! | [`ClientFrame`] | Client → Server | authenticate / subscribe / unsubscribe / ping |
//! | [`ServerFrame`] | Server → Client | pong / topic notification |
//!
//! Application payloads sent through
//! [`RealtimeClient::send`](crate::RealtimeClient::send) are passed through
//! unmodified and have no type here.

// ============================================================================
// Submodules
// ============================================================================

/// Outbound control frames.
pub mod command;

/// Inbound server frames.
pub mod event;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::ClientFrame;
pub use event::ServerFrame;
