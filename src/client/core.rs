//! Client handle and public API.
//!
//! A [`RealtimeClient`] is created once per application and shared by every
//! consumer. It is cheap to clone; all clones drive the same socket and the
//! same registry. Dropping the last clone shuts the transport down.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use url::Url;

use crate::auth::TokenProvider;
use crate::error::Result;
use crate::identifiers::{ClientId, Topic};
use crate::subscription::Callback;
use crate::transport::supervisor::{Supervisor, SupervisorConfig};
use crate::transport::{ConnectionState, Connector, Multiplexer};

use super::builder::RealtimeClientBuilder;
use super::options::TransportOptions;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for a client.
struct ClientInner {
    /// Identity appended to the endpoint.
    client_id: ClientId,
    /// `<base-url>/<client-id>`.
    endpoint: Url,
    /// Registry, state and send gate.
    multiplexer: Arc<Multiplexer>,
    /// Set to `true` to stop the supervisor.
    shutdown: watch::Sender<bool>,
    /// Cuts a pending reconnect delay short.
    wake: Arc<Notify>,
    /// Supervisor task.
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

// ============================================================================
// RealtimeClient
// ============================================================================

/// Handle to the shared notification socket.
///
/// # Example
///
/// ```no_run
/// use realtime_notify::{Callback, RealtimeClient, StaticToken};
///
/// # async fn example() -> realtime_notify::Result<()> {
/// let client = RealtimeClient::builder()
///     .url("ws://localhost:8000/api/v1/ws")
///     .token_provider(StaticToken::new("session-token"))
///     .spawn()?;
///
/// let on_change = Callback::new(|data| println!("analysis changed: {data}"));
/// client.subscribe("analysis:42", &on_change);
///
/// // ... later
/// client.unsubscribe("analysis:42", &on_change);
/// client.shutdown();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<ClientInner>,
}

// ============================================================================
// RealtimeClient - Display
// ============================================================================

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("client_id", &self.inner.client_id)
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RealtimeClient - Constructor
// ============================================================================

impl RealtimeClient {
    /// Creates a new builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RealtimeClientBuilder {
        RealtimeClientBuilder::new()
    }

    /// Spawns the supervisor and returns the handle.
    pub(crate) fn start(
        handle: &Handle,
        client_id: ClientId,
        endpoint: Url,
        options: &TransportOptions,
        tokens: Arc<dyn TokenProvider>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let multiplexer = Arc::new(Multiplexer::new(tokens));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let wake = Arc::new(Notify::new());

        let supervisor = Supervisor {
            client_id,
            endpoint: endpoint.clone(),
            multiplexer: Arc::clone(&multiplexer),
            connector,
            config: SupervisorConfig {
                reconnect_delay: options.reconnect_delay,
                connect_timeout: options.connect_timeout,
                ping_interval: options.ping_interval,
            },
            shutdown: shutdown_rx,
            wake: Arc::clone(&wake),
        };

        let task = handle.spawn(supervisor.run());

        debug!(%client_id, endpoint = %endpoint, "Realtime client started");

        Self {
            inner: Arc::new(ClientInner {
                client_id,
                endpoint,
                multiplexer,
                shutdown: shutdown_tx,
                wake,
                task: Mutex::new(Some(task)),
            }),
        }
    }
}

// ============================================================================
// RealtimeClient - Accessors
// ============================================================================

impl RealtimeClient {
    /// Returns the client identity sent in the endpoint path.
    #[inline]
    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.inner.client_id
    }

    /// Returns the full endpoint URL.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.multiplexer.state()
    }

    /// Returns `true` if the socket is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.multiplexer.is_connected()
    }

    /// Returns a receiver that observes connection state changes.
    #[inline]
    #[must_use]
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.inner.multiplexer.watch()
    }

    /// Returns all subscribed topics in first-subscription order.
    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        self.inner.multiplexer.topics()
    }

    /// Returns the number of callbacks registered for `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: impl AsRef<str>) -> usize {
        self.inner.multiplexer.subscriber_count(topic.as_ref())
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    #[inline]
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.inner.shutdown.borrow()
    }
}

// ============================================================================
// RealtimeClient - Subscriptions
// ============================================================================

impl RealtimeClient {
    /// Registers `callback` for `topic`.
    ///
    /// The callback runs on the transport task for every notification on
    /// `topic` until it is unsubscribed. Registering the same handle twice
    /// counts as two subscriptions.
    pub fn subscribe(&self, topic: impl Into<Topic>, callback: &Callback) {
        self.inner
            .multiplexer
            .subscribe(topic.into(), callback.clone());
    }

    /// Wraps `f` in a [`Callback`], subscribes it and returns the handle.
    pub fn subscribe_fn<F>(&self, topic: impl Into<Topic>, f: F) -> Callback
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let callback = Callback::new(f);
        self.subscribe(topic, &callback);
        callback
    }

    /// Removes one registration of `callback` from `topic`.
    ///
    /// Returns `false` if `callback` was not registered for `topic`; that
    /// case sends nothing.
    pub fn unsubscribe(&self, topic: impl AsRef<str>, callback: &Callback) -> bool {
        self.inner.multiplexer.unsubscribe(topic.as_ref(), callback)
    }

    /// Sends an application payload if the socket is open.
    ///
    /// There is no outbound queue: returns `Ok(false)` and logs a warning
    /// when the socket is not open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if `payload` cannot be
    /// serialized.
    pub fn send<T>(&self, payload: &T) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        self.inner.multiplexer.send(payload)
    }
}

// ============================================================================
// RealtimeClient - Lifecycle
// ============================================================================

impl RealtimeClient {
    /// Connects now instead of waiting for the reconnect delay.
    ///
    /// No-op while a socket is open or an attempt is in flight.
    pub fn connect(&self) {
        if self.is_shutdown() {
            return;
        }

        match self.state() {
            ConnectionState::Closed => {
                debug!("Immediate reconnect requested");
                self.inner.wake.notify_one();
            }
            state => trace!(%state, "Connect ignored"),
        }
    }

    /// Closes the socket and cancels any pending reconnect.
    ///
    /// Subscriptions stay registered but no further traffic happens.
    pub fn shutdown(&self) {
        if self.inner.shutdown.send_replace(true) {
            return;
        }
        self.inner.multiplexer.detach();
        debug!(client_id = %self.inner.client_id, "Realtime client shutting down");
    }

    /// Shuts down and waits for the background task to finish.
    pub async fn shutdown_and_wait(&self) {
        self.shutdown();
        let task = self.inner.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
