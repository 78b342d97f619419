//! Builder pattern for client configuration.
//!
//! # Example
//!
//! ```no_run
//! use realtime_notify::{RealtimeClient, StaticToken};
//!
//! # async fn example() -> realtime_notify::Result<()> {
//! let client = RealtimeClient::builder()
//!     .url("wss://api.example.com/api/v1/ws")
//!     .token_provider(StaticToken::new("session-token"))
//!     .spawn()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::auth::{NoToken, TokenProvider};
use crate::error::{Error, Result};
use crate::identifiers::ClientId;
use crate::transport::{Connector, TungsteniteConnector};

use super::core::RealtimeClient;
use super::options::TransportOptions;

// ============================================================================
// RealtimeClientBuilder
// ============================================================================

/// Builder for a [`RealtimeClient`].
///
/// Use [`RealtimeClient::builder()`] to create one.
#[derive(Clone)]
pub struct RealtimeClientBuilder {
    options: TransportOptions,
    tokens: Arc<dyn TokenProvider>,
    connector: Arc<dyn Connector>,
    client_id: Option<ClientId>,
}

impl Default for RealtimeClientBuilder {
    fn default() -> Self {
        Self {
            options: TransportOptions::default(),
            tokens: Arc::new(NoToken),
            connector: Arc::new(TungsteniteConnector),
            client_id: None,
        }
    }
}

impl fmt::Debug for RealtimeClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClientBuilder")
            .field("options", &self.options)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RealtimeClientBuilder Implementation
// ============================================================================

impl RealtimeClientBuilder {
    /// Creates a builder with default options, no token and the
    /// tungstenite connector.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all transport options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the WebSocket base URL.
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.options.url = url.into();
        self
    }

    /// Sets the reconnect delay.
    #[inline]
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.options.reconnect_delay = delay;
        self
    }

    /// Sets the connection attempt timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Enables heartbeat pings.
    #[inline]
    #[must_use]
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.options.ping_interval = Some(interval);
        self
    }

    /// Sets the bearer token source queried on every connection.
    #[inline]
    #[must_use]
    pub fn token_provider(mut self, provider: impl TokenProvider) -> Self {
        self.tokens = Arc::new(provider);
        self
    }

    /// Replaces the socket factory.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    /// Fixes the client identity instead of generating one.
    #[inline]
    #[must_use]
    pub fn client_id(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Validates the configuration and starts the client on the current
    /// tokio runtime.
    ///
    /// The first connection attempt starts immediately in the background.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if options are invalid or no tokio runtime is running
    /// - [`Error::InvalidUrl`] if the URL is not a `ws://`/`wss://` URL
    pub fn spawn(self) -> Result<RealtimeClient> {
        self.options.validate()?;

        let handle = Handle::try_current()
            .map_err(|e| Error::config(format!("spawn requires a tokio runtime: {e}")))?;

        let client_id = self.client_id.unwrap_or_else(ClientId::generate);
        let endpoint = self.options.endpoint(client_id)?;

        Ok(RealtimeClient::start(
            &handle,
            client_id,
            endpoint,
            &self.options,
            self.tokens,
            self.connector,
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = RealtimeClientBuilder::new();
        assert_eq!(builder.options, TransportOptions::default());
        assert!(builder.client_id.is_none());
    }

    #[test]
    fn test_builder_setters() {
        let id = ClientId::generate();
        let builder = RealtimeClientBuilder::new()
            .url("wss://rt.example.com/ws")
            .reconnect_delay(Duration::from_secs(1))
            .connect_timeout(Duration::from_secs(2))
            .ping_interval(Duration::from_secs(20))
            .client_id(id);

        assert_eq!(builder.options.url, "wss://rt.example.com/ws");
        assert_eq!(builder.options.reconnect_delay, Duration::from_secs(1));
        assert_eq!(builder.options.connect_timeout, Duration::from_secs(2));
        assert_eq!(builder.options.ping_interval, Some(Duration::from_secs(20)));
        assert_eq!(builder.client_id, Some(id));
    }

    #[test]
    fn test_spawn_outside_runtime_fails() {
        let err = RealtimeClientBuilder::new().spawn().unwrap_err();
        assert!(err.is_config_error());
    }

    #[tokio::test]
    async fn test_spawn_rejects_invalid_url() {
        let err = RealtimeClientBuilder::new()
            .url("http://localhost/ws")
            .spawn()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }
}
