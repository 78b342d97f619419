//! Inbound frame dispatch.
//!
//! Turns a raw text frame into callback invocations:
//!
//! 1. Decode JSON. Malformed frames are logged and dropped.
//! 2. Drop heartbeats and frames without a topic.
//! 3. Look up the topic. Unknown topics are dropped silently.
//! 4. Invoke every callback in registration order, each one isolated so a
//!    panic cannot stop the rest.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde_json::Value;
use tracing::{error, trace, warn};

use crate::identifiers::Topic;
use crate::protocol::ServerFrame;
use crate::subscription::Callback;

// ============================================================================
// DispatchOutcome
// ============================================================================

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Frame was not valid JSON.
    Malformed,
    /// Heartbeat reply.
    Heartbeat,
    /// Valid JSON without a topic.
    Unroutable,
    /// Topic has no subscribers.
    NoSubscribers(Topic),
    /// Callbacks ran.
    Delivered {
        /// Topic the frame was routed to.
        topic: Topic,
        /// Callbacks invoked.
        invoked: usize,
        /// Callbacks that panicked.
        panicked: usize,
    },
}

// ============================================================================
// Dispatch
// ============================================================================

/// Decodes `text` and routes it to the callbacks returned by `lookup`.
///
/// `lookup` must return a snapshot; callbacks are invoked after it returns so
/// they are free to subscribe or unsubscribe.
pub fn dispatch<F>(text: &str, lookup: F) -> DispatchOutcome
where
    F: FnOnce(&str) -> Option<Vec<Callback>>,
{
    let frame = match ServerFrame::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Dropping malformed frame");
            return DispatchOutcome::Malformed;
        }
    };

    let (topic, data) = match frame {
        ServerFrame::Pong => {
            trace!("Pong received");
            return DispatchOutcome::Heartbeat;
        }
        ServerFrame::Unroutable => {
            trace!("Dropping frame without topic");
            return DispatchOutcome::Unroutable;
        }
        ServerFrame::Notification { topic, data } => (topic, data),
    };

    let Some(callbacks) = lookup(topic.as_str()) else {
        trace!(%topic, "No subscribers for topic");
        return DispatchOutcome::NoSubscribers(topic);
    };

    let panicked = fan_out(&topic, &callbacks, &data);
    trace!(%topic, invoked = callbacks.len(), panicked, "Frame dispatched");

    DispatchOutcome::Delivered {
        topic,
        invoked: callbacks.len(),
        panicked,
    }
}

/// Invokes each callback with `data`, returning how many panicked.
pub fn fan_out(topic: &Topic, callbacks: &[Callback], data: &Value) -> usize {
    let mut panicked = 0;

    for callback in callbacks {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback.call(data))) {
            panicked += 1;
            error!(
                %topic,
                panic = panic_message(payload.as_ref()),
                "Subscriber callback panicked"
            );
        }
    }

    panicked
}

/// Best-effort text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic>"
    }
}

// ============================================================================
// Tests
// ============================================================================
