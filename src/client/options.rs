//! Transport configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use realtime_notify::TransportOptions;
//!
//! let options = TransportOptions::new("wss://api.example.com/api/v1/ws")
//!     .with_reconnect_delay(Duration::from_secs(5))
//!     .with_ping_interval(Duration::from_secs(30));
//!
//! assert_eq!(options.reconnect_delay, Duration::from_secs(5));
//! ```
//!
//! # Environment
//!
//! [`TransportOptions::from_env`] reads:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `REALTIME_WEBSOCKET_URL` | Explicit WebSocket base URL |
//! | `REALTIME_API_URL` | HTTP API base; rewritten to `ws(s)://` with `/ws` appended |
//! | `REALTIME_RECONNECT_DELAY_MS` | Reconnect delay in milliseconds |
//! | `REALTIME_PING_INTERVAL_MS` | Heartbeat period in milliseconds |

// ============================================================================
// Imports
// ============================================================================

use std::env;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ClientId;

// ============================================================================
// Constants
// ============================================================================

/// Base URL used when nothing is configured.
pub const DEFAULT_WEBSOCKET_URL: &str = "ws://localhost:8000/api/v1/ws";

/// Fixed delay between a close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Upper bound for one connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Explicit WebSocket URL override.
pub const ENV_WEBSOCKET_URL: &str = "REALTIME_WEBSOCKET_URL";

/// HTTP API base URL.
pub const ENV_API_URL: &str = "REALTIME_API_URL";

/// Reconnect delay override in milliseconds.
pub const ENV_RECONNECT_DELAY_MS: &str = "REALTIME_RECONNECT_DELAY_MS";

/// Heartbeat period in milliseconds.
pub const ENV_PING_INTERVAL_MS: &str = "REALTIME_PING_INTERVAL_MS";

// ============================================================================
// TransportOptions
// ============================================================================

/// Connection settings for a [`RealtimeClient`](crate::RealtimeClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// WebSocket base URL. The client identity is appended as a path segment.
    pub url: String,

    /// Delay before reconnecting after a close. No backoff is applied.
    pub reconnect_delay: Duration,

    /// Upper bound for one connection attempt.
    pub connect_timeout: Duration,

    /// Heartbeat period. `None` disables pings.
    pub ping_interval: Option<Duration>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::new(DEFAULT_WEBSOCKET_URL)
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl TransportOptions {
    /// Creates options for `url` with default timings.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            ping_interval: None,
        }
    }

    /// Reads options from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a duration variable is not a valid
    /// integer.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads options through `lookup`, which maps variable names to values.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a duration variable is not a valid
    /// integer.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let url = match (get(ENV_WEBSOCKET_URL), get(ENV_API_URL)) {
            (Some(url), _) => url,
            (None, Some(api)) => websocket_url_from_api(&api),
            (None, None) => DEFAULT_WEBSOCKET_URL.to_string(),
        };

        let mut options = Self::new(url);

        if let Some(raw) = get(ENV_RECONNECT_DELAY_MS) {
            options.reconnect_delay = parse_millis(ENV_RECONNECT_DELAY_MS, &raw)?;
        }

        if let Some(raw) = get(ENV_PING_INTERVAL_MS) {
            options.ping_interval = Some(parse_millis(ENV_PING_INTERVAL_MS, &raw)?);
        }

        Ok(options)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl TransportOptions {
    /// Sets the WebSocket base URL.
    #[inline]
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the reconnect delay.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the connection attempt timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enables heartbeat pings every `interval`.
    #[inline]
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = Some(interval);
        self
    }

    /// Disables heartbeat pings.
    #[inline]
    #[must_use]
    pub fn without_ping(mut self) -> Self {
        self.ping_interval = None;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl TransportOptions {
    /// Checks timings and the URL.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if a duration is zero
    /// - [`Error::InvalidUrl`] if the URL is not `ws://` or `wss://`
    pub fn validate(&self) -> Result<()> {
        if self.reconnect_delay.is_zero() {
            return Err(Error::config("reconnect delay must be greater than zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect timeout must be greater than zero"));
        }
        if self.ping_interval == Some(Duration::ZERO) {
            return Err(Error::config("ping interval must be greater than zero"));
        }
        self.base_url().map(|_| ())
    }

    /// Builds the per-client endpoint `<url>/<client_id>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the base URL is invalid.
    pub fn endpoint(&self, client_id: ClientId) -> Result<Url> {
        let base = self.base_url()?;
        let mut endpoint = base.clone();

        endpoint
            .path_segments_mut()
            .map_err(|()| Error::invalid_url(base.as_str(), "URL cannot be a base"))?
            .pop_if_empty()
            .push(&client_id.to_string());

        Ok(endpoint)
    }

    fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.url).map_err(|e| Error::invalid_url(&self.url, e.to_string()))?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(Error::invalid_url(
                &self.url,
                format!("scheme must be ws or wss, got {other}"),
            )),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Rewrites an HTTP API base into its WebSocket endpoint.
fn websocket_url_from_api(api: &str) -> String {
    let api = api.trim().trim_end_matches('/');
    let rewritten = match api.strip_prefix("http") {
        Some(rest) => format!("ws{rest}"),
        None => api.to_string(),
    };
    format!("{rewritten}/ws")
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| Error::config(format!("{key}: invalid milliseconds '{raw}': {e}")))
}

// ============================================================================
// Tests
// ============================================================================
