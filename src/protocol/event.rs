//! Inbound server frames.
//!
//! The server sends two shapes:
//!
//! | Shape | Meaning |
//! |-------|---------|
//! | `{"type": "pong"}` | Heartbeat reply, ignored |
//! | `{"topic": "...", "data": ...}` | Notification routed to subscribers |
//!
//! Anything else that parses as JSON is [`ServerFrame::Unroutable`] and is
//! dropped by the dispatcher without complaint.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::Topic;

// ============================================================================
// Constants
// ============================================================================

/// Discriminant value marking a heartbeat reply.
const PONG_TYPE: &str = "pong";

// ============================================================================
// ServerFrame
// ============================================================================

/// A decoded frame from server to client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// Heartbeat reply.
    Pong,

    /// Topic notification.
    Notification {
        /// Topic the payload belongs to.
        topic: Topic,
        /// Payload, `null` when the server omitted it.
        data: Value,
    },

    /// Valid JSON without a usable topic.
    Unroutable,
}

impl ServerFrame {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `text` is not valid JSON.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| Error::decode(e.to_string()))?;
        Ok(Self::from_value(value))
    }

    /// Classifies an already parsed JSON value.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut object) = value else {
            return Self::Unroutable;
        };

        if object.get("type").and_then(Value::as_str) == Some(PONG_TYPE) {
            return Self::Pong;
        }

        let topic = match object.get("topic").and_then(Value::as_str) {
            Some(topic) if !topic.is_empty() => Topic::from(topic),
            _ => return Self::Unroutable,
        };

        let data = object.remove("data").unwrap_or(Value::Null);

        Self::Notification { topic, data }
    }

    /// Returns the topic if this is a notification.
    #[inline]
    #[must_use]
    pub fn topic(&self) -> Option<&Topic> {
        match self {
            Self::Notification { topic, .. } => Some(topic),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
