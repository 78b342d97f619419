//! Event loop for one open socket.
//!
//! Runs from the moment a socket opens until it closes:
//!
//! - Inbound text frames go to the [`Multiplexer`] for dispatch
//! - Outbound frames queued by the multiplexer are written in order
//! - Optional heartbeat pings on a fixed interval
//! - Shutdown requests close the socket
//!
//! Any read or write failure ends the loop; the caller then schedules the
//! reconnect.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, trace, warn};

use crate::error::Error;

use super::connector::SocketPair;
use super::multiplexer::Multiplexer;

// ============================================================================
// CloseReason
// ============================================================================

/// Why a connection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed the socket or the stream ended.
    Remote,
    /// Reading or writing failed.
    TransportError,
    /// The client is shutting down.
    Shutdown,
}

// ============================================================================
// Connection Loop
// ============================================================================

/// Drives one open socket until it closes.
///
/// Attaches the socket to `multiplexer` first, which queues the
/// authenticate and replay frames ahead of anything else. Always detaches
/// before returning. A socket that opens after shutdown was requested is
/// closed without being attached.
pub(crate) async fn run(
    socket: SocketPair,
    multiplexer: &Multiplexer,
    ping_interval: Option<Duration>,
    shutdown: &mut watch::Receiver<bool>,
) -> CloseReason {
    let SocketPair {
        mut reader,
        mut writer,
    } = socket;

    if *shutdown.borrow_and_update() {
        debug!("Shutdown requested before attach, closing socket");
        if let Err(e) = writer.close().await {
            trace!(error = %e, "Socket close before attach failed");
        }
        return CloseReason::Shutdown;
    }

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    multiplexer.attach(outbound_tx);

    // An unused ticker still needs a period; the branch is disabled below.
    let mut heartbeat = interval(ping_interval.unwrap_or(Duration::from_secs(3600)));
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.reset();

    let reason = loop {
        tokio::select! {
            // Shutdown wins over pending writes; queued writes are flushed
            // before the next read.
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("Shutdown requested, closing socket");
                    break CloseReason::Shutdown;
                }
            }

            // Frames queued by subscribe/unsubscribe/send and the open handler
            outgoing = outbound_rx.recv() => {
                let Some(text) = outgoing else {
                    break CloseReason::Shutdown;
                };
                trace!(len = text.len(), "Writing frame");
                if let Err(e) = writer.write(text).await {
                    warn!(error = %e, "WebSocket write failed");
                    break CloseReason::TransportError;
                }
            }

            // Frames from the server
            incoming = reader.read() => {
                match incoming {
                    Some(Ok(text)) => {
                        multiplexer.handle_text(&text);
                    }
                    Some(Err(Error::ConnectionClosed)) => {
                        debug!("WebSocket closed during read");
                        break CloseReason::Remote;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket read failed");
                        break CloseReason::TransportError;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break CloseReason::Remote;
                    }
                }
            }

            _ = heartbeat.tick(), if ping_interval.is_some() => {
                multiplexer.ping();
            }
        }
    };

    multiplexer.detach();

    if let Err(e) = writer.close().await {
        trace!(error = %e, "Socket close after loop end failed");
    }

    debug!(?reason, "Connection loop terminated");
    reason
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use crate::auth::StaticToken;
    use crate::error::{Error, Result};
    use crate::identifiers::Topic;
    use crate::subscription::Callback;
    use crate::transport::ConnectionState;
    use crate::transport::connector::{FrameReader, FrameWriter};

    struct ChannelReader(mpsc::UnboundedReceiver<Result<String>>);

    #[async_trait]
    impl FrameReader for ChannelReader {
        async fn read(&mut self) -> Option<Result<String>> {
            self.0.recv().await
        }
    }

    struct RecordingWriter(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl FrameWriter for RecordingWriter {
        async fn write(&mut self, text: String) -> Result<()> {
            self.0.lock().push(text);
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn socket() -> (
        SocketPair,
        mpsc::UnboundedSender<Result<String>>,
        Arc<Mutex<Vec<String>>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let written = Arc::new(Mutex::new(Vec::new()));
        let pair = SocketPair::new(ChannelReader(rx), RecordingWriter(Arc::clone(&written)));
        (pair, tx, written)
    }

    fn frames(written: &Mutex<Vec<String>>) -> Vec<Value> {
        written
            .lock()
            .iter()
            .map(|text| serde_json::from_str(text).expect("valid json"))
            .collect()
    }

    #[tokio::test]
    async fn test_remote_close_detaches() {
        let mux = Multiplexer::new(Arc::new(StaticToken::new("tok")));
        mux.subscribe(Topic::from("A"), Callback::new(|_| {}));
        let (pair, inbound, written) = socket();
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        drop(inbound);
        let reason = run(pair, &mux, None, &mut shutdown_rx).await;

        assert_eq!(reason, CloseReason::Remote);
        assert_eq!(mux.state(), ConnectionState::Closed);
        assert_eq!(
            frames(&written),
            vec![
                json!({ "action": "authenticate", "token": "tok" }),
                json!({ "action": "subscribe", "topic": "A" }),
            ]
        );
    }

    #[tokio::test]
    async fn test_inbound_frames_are_dispatched() {
        let mux = Arc::new(Multiplexer::new(Arc::new(StaticToken::new("tok"))));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        mux.subscribe(
            Topic::from("T"),
            Callback::new(move |data| seen_clone.lock().push(data.clone())),
        );

        let (pair, inbound, _written) = socket();
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        inbound.send(Ok(r#"{"type":"pong"}"#.into())).unwrap();
        inbound.send(Ok("garbage".into())).unwrap();
        inbound
            .send(Ok(r#"{"topic":"T","data":1}"#.into()))
            .unwrap();
        inbound
            .send(Ok(r#"{"topic":"T","data":2}"#.into()))
            .unwrap();
        drop(inbound);

        run(pair, &mux, None, &mut shutdown_rx).await;

        assert_eq!(*seen.lock(), vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_read_error_is_transport_error() {
        let mux = Multiplexer::new(Arc::new(StaticToken::new("tok")));
        let (pair, inbound, _written) = socket();
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        inbound.send(Err(Error::connection("reset"))).unwrap();
        let reason = run(pair, &mux, None, &mut shutdown_rx).await;

        assert_eq!(reason, CloseReason::TransportError);
        assert!(!mux.is_connected());
    }

    #[tokio::test]
    async fn test_closed_read_is_remote_close() {
        let mux = Multiplexer::new(Arc::new(StaticToken::new("tok")));
        let (pair, inbound, _written) = socket();
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        inbound.send(Err(Error::ConnectionClosed)).unwrap();
        let reason = run(pair, &mux, None, &mut shutdown_rx).await;

        assert_eq!(reason, CloseReason::Remote);
        assert!(!mux.is_connected());
    }

    #[tokio::test]
    async fn test_socket_opened_after_shutdown_is_never_attached() {
        let mux = Multiplexer::new(Arc::new(StaticToken::new("tok")));
        mux.subscribe(Topic::from("A"), Callback::new(|_| {}));
        let (pair, _inbound, written) = socket();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let states = mux.watch();

        shutdown_tx.send_replace(true);
        let reason = run(pair, &mux, None, &mut shutdown_rx).await;

        assert_eq!(reason, CloseReason::Shutdown);
        assert!(frames(&written).is_empty());
        assert_eq!(mux.state(), ConnectionState::Closed);
        assert!(!states.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_wins_over_queued_frames() {
        let mux = Arc::new(Multiplexer::new(Arc::new(StaticToken::new("tok"))));
        let (pair, _inbound, written) = socket();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let mux_clone = Arc::clone(&mux);
        let task = tokio::spawn(async move { run(pair, &mux_clone, None, &mut shutdown_rx).await });

        tokio::task::yield_now().await;
        let queued = written.lock().len();
        shutdown_tx.send_replace(true);
        mux.send(&json!({ "late": true })).expect("serializable");

        assert_eq!(task.await.unwrap(), CloseReason::Shutdown);
        assert_eq!(written.lock().len(), queued);
    }

    #[tokio::test]
    async fn test_shutdown_ends_loop() {
        let mux = Arc::new(Multiplexer::new(Arc::new(StaticToken::new("tok"))));
        let (pair, _inbound, _written) = socket();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let mux_clone = Arc::clone(&mux);
        let task = tokio::spawn(async move { run(pair, &mux_clone, None, &mut shutdown_rx).await });

        tokio::task::yield_now().await;
        shutdown_tx.send_replace(true);

        assert_eq!(task.await.unwrap(), CloseReason::Shutdown);
        assert_eq!(mux.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_pings_on_interval() {
        let mux = Arc::new(Multiplexer::new(Arc::new(StaticToken::new("tok"))));
        let (pair, _inbound, written) = socket();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let mux_clone = Arc::clone(&mux);
        let task = tokio::spawn(async move {
            run(
                pair,
                &mux_clone,
                Some(Duration::from_secs(30)),
                &mut shutdown_rx,
            )
            .await
        });

        tokio::time::sleep(Duration::from_secs(61)).await;
        shutdown_tx.send_replace(true);
        task.await.unwrap();

        let pings = frames(&written)
            .into_iter()
            .filter(|frame| frame == &json!({ "action": "ping" }))
            .count();
        assert_eq!(pings, 2);
    }
}
