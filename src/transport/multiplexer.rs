//! Shared transport core: registry, connection state and send gate.
//!
//! The [`Multiplexer`] is the only owner of the subscription registry and
//! of the outbound channel of the currently open socket. Every public
//! operation and every socket event goes through one lock, so the invariants
//! below hold without any cooperation from callers:
//!
//! - `authenticate` is queued before any replayed `subscribe` on a connection,
//!   because both are queued in the same critical section that installs the
//!   outbound channel.
//! - A topic's first callback queues exactly one `subscribe` while open, and
//!   its last removal queues exactly one `unsubscribe` while open.
//! - Nothing is queued while not open. The next open replays the registry.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

use crate::auth::TokenProvider;
use crate::error::Result;
use crate::identifiers::Topic;
use crate::protocol::ClientFrame;
use crate::subscription::{Callback, Registry, Removal};

use super::ConnectionState;
use super::dispatch::{DispatchOutcome, dispatch};

// ============================================================================
// Types
// ============================================================================

/// Outbound text frames for the open socket.
pub(crate) type Outbound = mpsc::UnboundedSender<String>;

/// State guarded by the multiplexer lock.
struct Shared {
    /// Topic → callbacks.
    registry: Registry,
    /// Present iff the socket is open.
    outbound: Option<Outbound>,
}

impl Shared {
    /// Queues a control frame on the open socket, if any.
    fn emit(&self, frame: &ClientFrame) -> bool {
        let Some(outbound) = self.outbound.as_ref() else {
            return false;
        };

        match frame.encode() {
            Ok(text) => push(outbound, text),
            Err(e) => {
                warn!(action = frame.action(), error = %e, "Failed to encode control frame");
                false
            }
        }
    }
}

/// Hands a text frame to the connection loop.
fn push(outbound: &Outbound, text: String) -> bool {
    if outbound.send(text).is_err() {
        debug!("Connection loop gone, frame dropped");
        return false;
    }
    true
}

// ============================================================================
// Multiplexer
// ============================================================================

/// Multiplexes topic subscribers over one socket.
pub struct Multiplexer {
    shared: Mutex<Shared>,
    state: watch::Sender<ConnectionState>,
    tokens: Arc<dyn TokenProvider>,
}

impl Multiplexer {
    /// Creates a multiplexer in the [`ConnectionState::Closed`] state.
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Closed);
        Self {
            shared: Mutex::new(Shared {
                registry: Registry::new(),
                outbound: None,
            }),
            state,
            tokens,
        }
    }

    // ========================================================================
    // Public Operations
    // ========================================================================

    /// Registers `callback` for `topic`.
    ///
    /// Queues a `subscribe` frame when this is the topic's first callback
    /// and the socket is open.
    pub fn subscribe(&self, topic: Topic, callback: Callback) {
        let mut shared = self.shared.lock();
        let first = shared.registry.insert(topic.clone(), callback);

        if first {
            let sent = shared.emit(&ClientFrame::subscribe(topic.clone()));
            debug!(%topic, sent, "Topic subscribed");
        } else {
            trace!(%topic, "Callback added to existing topic");
        }
    }

    /// Removes one registration of `callback` from `topic`.
    ///
    /// Returns `false` if it was not registered. Queues an `unsubscribe`
    /// frame when the last callback leaves and the socket is open.
    pub fn unsubscribe(&self, topic: &str, callback: &Callback) -> bool {
        let mut shared = self.shared.lock();

        match shared.registry.remove(topic, callback) {
            Removal::NotRegistered => {
                trace!(topic, "Unsubscribe for unknown callback ignored");
                false
            }
            Removal::Remaining(left) => {
                trace!(topic, left, "Callback removed");
                true
            }
            Removal::Emptied => {
                let sent = shared.emit(&ClientFrame::unsubscribe(topic));
                debug!(topic, sent, "Topic unsubscribed");
                true
            }
        }
    }

    /// Serializes `payload` and writes it if the socket is open.
    ///
    /// Returns `Ok(false)` when the payload was dropped because the socket
    /// is not open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if `payload` cannot be
    /// serialized.
    pub fn send<T>(&self, payload: &T) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        let text = serde_json::to_string(payload)?;
        let shared = self.shared.lock();

        match shared.outbound.as_ref() {
            Some(outbound) => Ok(push(outbound, text)),
            None => {
                warn!("Socket not connected, dropping outbound message");
                Ok(false)
            }
        }
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Returns `true` if the socket is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    /// Returns a receiver that observes state changes.
    #[inline]
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Returns `true` if `topic` has subscribers.
    #[must_use]
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.shared.lock().registry.contains(topic)
    }

    /// Returns the number of callbacks registered for `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.shared.lock().registry.subscriber_count(topic)
    }

    /// Returns all subscribed topics in first-subscription order.
    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        self.shared.lock().registry.topics()
    }

    // ========================================================================
    // Socket Events
    // ========================================================================

    /// Marks a connection attempt as in flight.
    pub(crate) fn mark_connecting(&self) {
        let _guard = self.shared.lock();
        self.state.send_replace(ConnectionState::Connecting);
    }

    /// Installs the outbound channel of a freshly opened socket.
    ///
    /// Queues `authenticate` followed by one `subscribe` per registered topic.
    pub(crate) fn attach(&self, outbound: Outbound) {
        let mut shared = self.shared.lock();
        shared.outbound = Some(outbound);
        self.state.send_replace(ConnectionState::Open);

        match self.tokens.token() {
            Some(token) => {
                shared.emit(&ClientFrame::authenticate(token));
                trace!("Authenticate queued");
            }
            None => warn!("No bearer token available, connection left unauthenticated"),
        }

        let topics = shared.registry.topics();
        for topic in &topics {
            shared.emit(&ClientFrame::subscribe(topic.clone()));
        }

        debug!(replayed = topics.len(), "Socket attached");
    }

    /// Drops the outbound channel and marks the socket closed.
    pub(crate) fn detach(&self) {
        let mut shared = self.shared.lock();
        shared.outbound = None;
        self.state.send_replace(ConnectionState::Closed);
    }

    /// Queues a heartbeat `ping` if open.
    pub(crate) fn ping(&self) -> bool {
        self.shared.lock().emit(&ClientFrame::Ping)
    }

    /// Routes one inbound text frame to its subscribers.
    ///
    /// Callbacks run after the lock is released.
    pub(crate) fn handle_text(&self, text: &str) -> DispatchOutcome {
        dispatch(text, |topic| self.shared.lock().registry.callbacks(topic))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{Value, json};

    use crate::auth::{NoToken, StaticToken};

    fn multiplexer() -> Multiplexer {
        Multiplexer::new(Arc::new(StaticToken::new("tok")))
    }

    fn open(mux: &Multiplexer) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        mux.attach(tx);
        rx
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(text) = rx.try_recv() {
            frames.push(serde_json::from_str(&text).expect("valid json"));
        }
        frames
    }

    fn noop() -> Callback {
        Callback::new(|_| {})
    }

    #[test]
    fn test_subscribe_while_closed_sends_nothing() {
        let mux = multiplexer();
        mux.subscribe(Topic::from("a"), noop());

        assert!(mux.is_subscribed("a"));
        assert_eq!(mux.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_attach_authenticates_then_replays() {
        let mux = multiplexer();
        mux.subscribe(Topic::from("A"), noop());
        mux.subscribe(Topic::from("B"), noop());

        let mut rx = open(&mux);

        assert!(mux.is_connected());
        assert_eq!(
            drain(&mut rx),
            vec![
                json!({ "action": "authenticate", "token": "tok" }),
                json!({ "action": "subscribe", "topic": "A" }),
                json!({ "action": "subscribe", "topic": "B" }),
            ]
        );
    }

    #[test]
    fn test_attach_without_token_skips_authenticate() {
        let mux = Multiplexer::new(Arc::new(NoToken));
        mux.subscribe(Topic::from("A"), noop());

        let mut rx = open(&mux);

        assert_eq!(
            drain(&mut rx),
            vec![json!({ "action": "subscribe", "topic": "A" })]
        );
    }

    #[test]
    fn test_only_first_and_last_callback_hit_the_wire() {
        let mux = multiplexer();
        let mut rx = open(&mux);
        drain(&mut rx);

        let c1 = noop();
        let c2 = noop();
        mux.subscribe(Topic::from("T"), c1.clone());
        mux.subscribe(Topic::from("T"), c2.clone());
        assert!(mux.unsubscribe("T", &c1));
        assert!(mux.unsubscribe("T", &c2));

        assert_eq!(
            drain(&mut rx),
            vec![
                json!({ "action": "subscribe", "topic": "T" }),
                json!({ "action": "unsubscribe", "topic": "T" }),
            ]
        );
    }

    #[test]
    fn test_unsubscribe_unknown_callback_is_silent() {
        let mux = multiplexer();
        let mut rx = open(&mux);
        mux.subscribe(Topic::from("T"), noop());
        drain(&mut rx);

        assert!(!mux.unsubscribe("T", &noop()));
        assert!(!mux.unsubscribe("other", &noop()));

        assert!(drain(&mut rx).is_empty());
        assert_eq!(mux.subscriber_count("T"), 1);
    }

    #[test]
    fn test_unsubscribe_while_closed_updates_registry() {
        let mux = multiplexer();
        let cb = noop();
        mux.subscribe(Topic::from("T"), cb.clone());
        assert!(mux.unsubscribe("T", &cb));

        let mut rx = open(&mux);
        assert_eq!(
            drain(&mut rx),
            vec![json!({ "action": "authenticate", "token": "tok" })]
        );
    }

    #[test]
    fn test_send_while_disconnected_is_dropped() {
        let mux = multiplexer();
        let sent = mux.send(&json!({ "foo": 1 })).expect("serializable");
        assert!(!sent);
    }

    #[test]
    fn test_send_while_open_passes_payload_through() {
        let mux = multiplexer();
        let mut rx = open(&mux);
        drain(&mut rx);

        assert!(mux.send(&json!({ "foo": 1 })).expect("serializable"));
        assert_eq!(drain(&mut rx), vec![json!({ "foo": 1 })]);
    }

    #[test]
    fn test_detach_stops_wire_traffic() {
        let mux = multiplexer();
        let mut rx = open(&mux);
        mux.detach();
        drain(&mut rx);

        mux.subscribe(Topic::from("T"), noop());
        assert!(!mux.ping());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(mux.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_ping_when_open() {
        let mux = multiplexer();
        let mut rx = open(&mux);
        drain(&mut rx);

        assert!(mux.ping());
        assert_eq!(drain(&mut rx), vec![json!({ "action": "ping" })]);
    }

    #[test]
    fn test_watch_observes_transitions() {
        let mux = multiplexer();
        let watch = mux.watch();

        mux.mark_connecting();
        assert_eq!(*watch.borrow(), ConnectionState::Connecting);
        let _rx = open(&mux);
        assert_eq!(*watch.borrow(), ConnectionState::Open);
        mux.detach();
        assert_eq!(*watch.borrow(), ConnectionState::Closed);
    }

    #[test]
    fn test_handle_text_routes_to_subscribers() {
        let mux = multiplexer();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        mux.subscribe(
            Topic::from("analysis:42"),
            Callback::new(move |data| {
                assert_eq!(data, &json!({ "status": "done" }));
                hits_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        mux.handle_text(r#"{"topic":"analysis:42","data":{"status":"done"}}"#);
        mux.handle_text(r#"{"type":"pong"}"#);
        mux.handle_text(r#"{"topic":"analysis:7","data":null}"#);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let mux = Arc::new(multiplexer());
        let slot: Arc<Mutex<Option<Callback>>> = Arc::new(Mutex::new(None));

        let mux_clone = Arc::clone(&mux);
        let slot_clone = Arc::clone(&slot);
        let cb = Callback::new(move |_| {
            if let Some(me) = slot_clone.lock().take() {
                mux_clone.unsubscribe("T", &me);
            }
        });
        *slot.lock() = Some(cb.clone());
        mux.subscribe(Topic::from("T"), cb);

        mux.handle_text(r#"{"topic":"T","data":1}"#);
        assert!(!mux.is_subscribed("T"));
    }

    mod wire_consistency {
        use super::*;

        use proptest::prelude::*;
        use rustc_hash::FxHashMap;

        const TOPICS: [&str; 3] = ["a", "b", "c"];

        #[derive(Debug, Clone)]
        enum Op {
            Subscribe { topic: usize, callback: usize },
            Unsubscribe { topic: usize, callback: usize },
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0..TOPICS.len(), 0..4usize)
                    .prop_map(|(topic, callback)| Op::Subscribe { topic, callback }),
                (0..TOPICS.len(), 0..4usize)
                    .prop_map(|(topic, callback)| Op::Unsubscribe { topic, callback }),
            ]
        }

        proptest! {
            #[test]
            fn wire_balance_tracks_registry(ops in prop::collection::vec(op(), 0..64)) {
                let mux = multiplexer();
                let mut rx = open(&mux);
                drain(&mut rx);

                let callbacks: Vec<Callback> = (0..4).map(|_| noop()).collect();
                for op in &ops {
                    match *op {
                        Op::Subscribe { topic, callback } => {
                            mux.subscribe(Topic::from(TOPICS[topic]), callbacks[callback].clone());
                        }
                        Op::Unsubscribe { topic, callback } => {
                            mux.unsubscribe(TOPICS[topic], &callbacks[callback]);
                        }
                    }
                }

                let mut balance: FxHashMap<String, i64> = FxHashMap::default();
                for frame in drain(&mut rx) {
                    let topic = frame["topic"].as_str().unwrap_or_default().to_string();
                    match frame["action"].as_str() {
                        Some("subscribe") => *balance.entry(topic).or_default() += 1,
                        Some("unsubscribe") => *balance.entry(topic).or_default() -= 1,
                        other => prop_assert!(false, "unexpected frame {other:?}"),
                    }
                }

                for topic in TOPICS {
                    let expected = i64::from(mux.is_subscribed(topic));
                    prop_assert_eq!(balance.get(topic).copied().unwrap_or(0), expected);
                }
            }
        }
    }
}
