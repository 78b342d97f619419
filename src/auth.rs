//! Bearer token sources.
//!
//! The transport asks its [`TokenProvider`] for a token each time a socket
//! opens and never caches the answer, so a refreshed session token is picked
//! up on the next reconnect.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// TokenProvider
// ============================================================================

/// Source of the bearer token sent in the `authenticate` frame.
///
/// Returning `None` skips the authenticate frame for that connection.
///
/// Any `Fn() -> Option<String>` closure is a provider:
///
/// ```
/// use realtime_notify::TokenProvider;
///
/// let provider = || Some("session-token".to_string());
/// assert_eq!(provider.token().as_deref(), Some("session-token"));
/// ```
pub trait TokenProvider: Send + Sync + 'static {
    /// Returns the current bearer token, if any.
    fn token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync + 'static,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

// ============================================================================
// StaticToken
// ============================================================================

/// A fixed token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Creates a provider that always returns `token`.
    #[inline]
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(<redacted>)")
    }
}

// ============================================================================
// NoToken
// ============================================================================

/// A provider with no token. Connections are never authenticated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToken;

impl TokenProvider for NoToken {
    fn token(&self) -> Option<String> {
        None
    }
}

// ============================================================================
// Tests
// ============================================================================
