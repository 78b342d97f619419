//! Reconnect loop.
//!
//! One supervisor task per client owns the socket lifecycle:
//!
//! ```text
//! ┌─► Connecting ── connect() ok ──► Open ── connection::run ──┐
//! │        │                                                   │
//! │        └──── error / timeout ────────────┐                 │
//! │                                          ▼                 ▼
//! └──────── reconnect delay (or wake) ◄──── Closed ◄───────────┘
//! ```
//!
//! Only one socket and one pending reconnect exist at a time because the
//! loop is strictly sequential. Shutdown interrupts any stage.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::{Notify, watch};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ClientId;

use super::connection::{self, CloseReason};
use super::connector::{Connector, SocketPair};
use super::multiplexer::Multiplexer;

// ============================================================================
// SupervisorConfig
// ============================================================================

/// Timing knobs for the reconnect loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SupervisorConfig {
    /// Fixed delay between a close and the next attempt.
    pub reconnect_delay: Duration,
    /// Upper bound for one connection attempt.
    pub connect_timeout: Duration,
    /// Heartbeat period, if enabled.
    pub ping_interval: Option<Duration>,
}

// ============================================================================
// Supervisor
// ============================================================================

/// Owns the connect → run → wait cycle.
pub(crate) struct Supervisor {
    pub client_id: ClientId,
    pub endpoint: Url,
    pub multiplexer: Arc<Multiplexer>,
    pub connector: Arc<dyn Connector>,
    pub config: SupervisorConfig,
    pub shutdown: watch::Receiver<bool>,
    pub wake: Arc<Notify>,
}

impl Supervisor {
    /// Runs until shutdown.
    pub(crate) async fn run(mut self) {
        debug!(client_id = %self.client_id, endpoint = %self.endpoint, "Supervisor started");

        loop {
            if self.is_shutdown() {
                break;
            }

            if self.connect_once().await == Some(CloseReason::Shutdown) || self.is_shutdown() {
                break;
            }

            let delay_ms = millis(self.config.reconnect_delay);
            debug!(delay_ms, "Reconnect scheduled");

            tokio::select! {
                () = sleep(self.config.reconnect_delay) => {}
                () = self.wake.notified() => {
                    debug!("Reconnect requested, skipping remaining delay");
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.multiplexer.detach();
        debug!(client_id = %self.client_id, "Supervisor terminated");
    }

    /// Makes one connection attempt and, on success, runs the socket.
    ///
    /// Returns `None` if the attempt failed, otherwise why the socket closed.
    async fn connect_once(&mut self) -> Option<CloseReason> {
        self.multiplexer.mark_connecting();

        // A wake stored while the state still read Closed belongs to this
        // attempt, not to the next delay.
        if self.wake.notified().now_or_never().is_some() {
            trace!("Stale reconnect request discarded");
        }

        let Some(attempt) = self.open_socket().await else {
            self.multiplexer.detach();
            return Some(CloseReason::Shutdown);
        };

        let result = match attempt {
            Ok(socket) => {
                info!(client_id = %self.client_id, "WebSocket connected");
                let reason = connection::run(
                    socket,
                    &self.multiplexer,
                    self.config.ping_interval,
                    &mut self.shutdown,
                )
                .await;
                info!(client_id = %self.client_id, ?reason, "WebSocket disconnected");
                Some(reason)
            }
            Err(e) if e.is_timeout() => {
                warn!(error = %e, "Connection attempt timed out");
                None
            }
            Err(e) if e.is_connection_error() => {
                warn!(error = %e, "Connection attempt failed");
                None
            }
            Err(e) => {
                error!(error = %e, "Connector returned a non-connection error");
                None
            }
        };

        self.multiplexer.detach();
        result
    }

    /// Opens a socket within `connect_timeout`.
    ///
    /// Returns `None` if shutdown was requested while connecting.
    async fn open_socket(&mut self) -> Option<Result<SocketPair>> {
        let limit = self.config.connect_timeout;
        let attempt = timeout(limit, self.connector.connect(&self.endpoint));

        tokio::select! {
            attempt = attempt => Some(
                attempt.unwrap_or_else(|_| Err(Error::connection_timeout(millis(limit)))),
            ),
            _ = self.shutdown.changed() => None,
        }
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
