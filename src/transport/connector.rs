//! Socket factory abstraction.
//!
//! The reconnect loop opens sockets through a [`Connector`], which yields a
//! split reader/writer pair of text frames. [`TungsteniteConnector`] is the
//! production implementation; tests plug in in-memory connectors.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Client WebSocket stream as produced by `tokio-tungstenite`.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// Traits
// ============================================================================

/// Read half of a socket.
#[async_trait]
pub trait FrameReader: Send {
    /// Returns the next text frame.
    ///
    /// `None` means the peer closed the socket; `Some(Err(_))` is a
    /// transport failure. Both end the connection.
    async fn read(&mut self) -> Option<Result<String>>;
}

/// Write half of a socket.
#[async_trait]
pub trait FrameWriter: Send {
    /// Writes one text frame.
    async fn write(&mut self, text: String) -> Result<()>;

    /// Closes the socket.
    async fn close(&mut self) -> Result<()>;
}

/// An opened socket, split into halves.
pub struct SocketPair {
    /// Read half.
    pub reader: Box<dyn FrameReader>,
    /// Write half.
    pub writer: Box<dyn FrameWriter>,
}

impl SocketPair {
    /// Bundles two halves.
    #[inline]
    #[must_use]
    pub fn new(reader: impl FrameReader + 'static, writer: impl FrameWriter + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }
}

/// Opens sockets to the notification server.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a socket to `url`.
    async fn connect(&self, url: &Url) -> Result<SocketPair>;
}

// ============================================================================
// TungsteniteConnector
// ============================================================================

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &Url) -> Result<SocketPair> {
        let (stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

        debug!(status = %response.status(), "WebSocket handshake completed");

        let (sink, stream) = stream.split();
        Ok(SocketPair::new(
            TungsteniteReader { stream },
            TungsteniteWriter { sink },
        ))
    }
}

/// Read half of a tungstenite socket.
struct TungsteniteReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameReader for TungsteniteReader {
    async fn read(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "WebSocket closed by remote");
                    return None;
                }
                Err(e) => return Some(Err(socket_error(e))),

                // Ignore Binary, Ping, Pong
                Ok(other) => trace!(kind = ?message_kind(&other), "Ignoring non-text frame"),
            }
        }
    }
}

/// Write half of a tungstenite socket.
struct TungsteniteWriter {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameWriter for TungsteniteWriter {
    async fn write(&mut self, text: String) -> Result<()> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(socket_error)
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.close().await.map_err(socket_error)
    }
}

/// Maps tungstenite failures, folding both closed-socket errors into
/// [`Error::ConnectionClosed`].
fn socket_error(error: WsError) -> Error {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => Error::ConnectionClosed,
        other => Error::WebSocket(other),
    }
}

/// Short label for a tungstenite message variant.
fn message_kind(message: &Message) -> &'static str {
    match message {
        Message::Text(_) => "text",
        Message::Binary(_) => "binary",
        Message::Ping(_) => "ping",
        Message::Pong(_) => "pong",
        Message::Close(_) => "close",
        Message::Frame(_) => "frame",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;

    #[test]
    fn test_message_kind() {
        assert_eq!(message_kind(&Message::Text("x".into())), "text");
        assert_eq!(message_kind(&Message::Binary(Vec::new().into())), "binary");
        assert_eq!(message_kind(&Message::Ping(Vec::new().into())), "ping");
    }

    #[test]
    fn test_socket_error_folds_closed_variants() {
        assert!(matches!(
            socket_error(WsError::ConnectionClosed),
            Error::ConnectionClosed
        ));
        assert!(matches!(
            socket_error(WsError::AlreadyClosed),
            Error::ConnectionClosed
        ));
        assert!(matches!(
            socket_error(WsError::Io(std::io::ErrorKind::ConnectionReset.into())),
            Error::WebSocket(_)
        ));
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let url = Url::parse(&format!("ws://127.0.0.1:{port}/ws/client")).expect("url");
        let result = TungsteniteConnector.connect(&url).await;

        assert!(matches!(result, Err(Error::Connection { .. })));
    }

    #[tokio::test]
    async fn test_round_trip_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(tcp).await.expect("upgrade");

            let received = ws.next().await.expect("frame").expect("ok");
            ws.send(Message::Binary(vec![1, 2, 3].into()))
                .await
                .expect("send");
            ws.send(Message::Text(r#"{"type":"pong"}"#.into()))
                .await
                .expect("send");
            ws.close(None).await.expect("close");
            received
        });

        let url = Url::parse(&format!("ws://127.0.0.1:{port}/ws/client")).expect("url");
        let SocketPair {
            mut reader,
            mut writer,
        } = TungsteniteConnector.connect(&url).await.expect("connect");

        writer
            .write(r#"{"action":"ping"}"#.into())
            .await
            .expect("write");

        let text = reader.read().await.expect("frame").expect("ok");
        assert_eq!(text, r#"{"type":"pong"}"#);
        assert!(reader.read().await.is_none());

        let received = server.await.expect("server task");
        assert_eq!(received, Message::Text(r#"{"action":"ping"}"#.into()));
    }
}
