//! Outbound control frames.
//!
//! Every frame the client sends on its own behalf is an `action`-tagged
//! JSON object. Application payloads passed to
//! [`RealtimeClient::send`](crate::RealtimeClient::send) bypass this type
//! and are serialized as-is.
//!
//! | Action | Fields | Purpose |
//! |--------|--------|---------|
//! | `authenticate` | `token` | First frame on every connection |
//! | `subscribe` | `topic` | Register interest in a topic |
//! | `unsubscribe` | `topic` | Drop interest in a topic |
//! | `ping` | none | Heartbeat, answered with `{"type":"pong"}` |

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;

use crate::error::Result;
use crate::identifiers::Topic;

// ============================================================================
// ClientFrame
// ============================================================================

/// A control frame from client to server.
///
/// # Format
///
/// ```json
/// { "action": "subscribe", "topic": "analysis:42" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Carries the bearer token for this connection.
    Authenticate {
        /// Bearer token from the token provider.
        token: String,
    },

    /// Starts delivery of a topic.
    Subscribe {
        /// Topic to subscribe.
        topic: Topic,
    },

    /// Stops delivery of a topic.
    Unsubscribe {
        /// Topic to unsubscribe.
        topic: Topic,
    },

    /// Keep-alive probe.
    Ping,
}

impl ClientFrame {
    /// Creates an authenticate frame.
    #[inline]
    #[must_use]
    pub fn authenticate(token: impl Into<String>) -> Self {
        Self::Authenticate {
            token: token.into(),
        }
    }

    /// Creates a subscribe frame.
    #[inline]
    #[must_use]
    pub fn subscribe(topic: impl Into<Topic>) -> Self {
        Self::Subscribe {
            topic: topic.into(),
        }
    }

    /// Creates an unsubscribe frame.
    #[inline]
    #[must_use]
    pub fn unsubscribe(topic: impl Into<Topic>) -> Self {
        Self::Unsubscribe {
            topic: topic.into(),
        }
    }

    /// Returns the action name as it appears on the wire.
    #[inline]
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Ping => "ping",
        }
    }

    /// Encodes the frame as a JSON text message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};

    fn encoded(frame: &ClientFrame) -> Value {
        serde_json::from_str(&frame.encode().expect("encode")).expect("valid json")
    }

    #[test]
    fn test_authenticate_shape() {
        assert_eq!(
            encoded(&ClientFrame::authenticate("abc")),
            json!({ "action": "authenticate", "token": "abc" })
        );
    }

    #[test]
    fn test_subscribe_shape() {
        assert_eq!(
            encoded(&ClientFrame::subscribe("analysis:42")),
            json!({ "action": "subscribe", "topic": "analysis:42" })
        );
    }

    #[test]
    fn test_unsubscribe_shape() {
        assert_eq!(
            encoded(&ClientFrame::unsubscribe("connection:1")),
            json!({ "action": "unsubscribe", "topic": "connection:1" })
        );
    }

    #[test]
    fn test_ping_shape() {
        assert_eq!(encoded(&ClientFrame::Ping), json!({ "action": "ping" }));
    }

    #[test]
    fn test_action_names() {
        assert_eq!(ClientFrame::authenticate("t").action(), "authenticate");
        assert_eq!(ClientFrame::subscribe("a").action(), "subscribe");
        assert_eq!(ClientFrame::unsubscribe("a").action(), "unsubscribe");
        assert_eq!(ClientFrame::Ping.action(), "ping");
    }
}
