//! Connection state.

use std::fmt;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the single transport socket.
///
/// ```text
/// Connecting ──open──► Open ──close/error──► Closed ──delay──► Connecting ...
/// ```
///
/// The cycle repeats until the client shuts down, which leaves it in
/// [`ConnectionState::Closed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// A connection attempt is in flight.
    Connecting,
    /// The socket is open and frames may be sent.
    Open,
    /// No socket. A reconnect is pending unless the client was shut down.
    #[default]
    Closed,
}

impl ConnectionState {
    /// Returns `true` if the socket is open.
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}
