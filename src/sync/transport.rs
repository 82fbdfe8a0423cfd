// Client-side transports
//
// The sync client talks to the hub through two seams: a live connection
// (split into a sink and a stream of decoded frames) and a snapshot source
// used while polling. The websocket and HTTP adapters live here; tests
// substitute scripted fakes.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::header::CACHE_CONTROL;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::hub::{LiveMessage, StatusResponse};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Snapshot request failed: {0}")]
    Snapshot(String),
}

/// What the live stream produced next
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Message(LiveMessage),
    /// `clean` is true when the peer completed a close handshake
    Closed { clean: bool },
}

#[async_trait]
pub trait LiveSink: Send {
    async fn send(&mut self, message: &LiveMessage) -> Result<(), TransportError>;
    async fn close(&mut self) -> Result<(), TransportError>;
}

#[async_trait]
pub trait LiveStream: Send {
    /// Next decoded frame; malformed frames are skipped
    async fn next_event(&mut self) -> ConnectionEvent;
}

/// An open live channel
pub struct LiveConnection {
    pub sink: Box<dyn LiveSink>,
    pub stream: Box<dyn LiveStream>,
}

#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(&self) -> Result<LiveConnection, TransportError>;
}

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self, limit: usize) -> Result<StatusResponse, TransportError>;
}

type WsSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Live channel over a websocket
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl LiveConnector for WsConnector {
    async fn connect(&self) -> Result<LiveConnection, TransportError> {
        let (socket, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (sink, stream) = socket.split();

        Ok(LiveConnection {
            sink: Box::new(WsSink { inner: sink }),
            stream: Box::new(WsStream { inner: stream }),
        })
    }
}

struct WsSink {
    inner: SplitSink<WsSocket, Message>,
}

#[async_trait]
impl LiveSink for WsSink {
    async fn send(&mut self, message: &LiveMessage) -> Result<(), TransportError> {
        let json = serde_json::to_string(message).map_err(|e| TransportError::Send(e.to_string()))?;
        self.inner
            .send(Message::Text(json))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner
            .close()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

struct WsStream {
    inner: SplitStream<WsSocket>,
}

#[async_trait]
impl LiveStream for WsStream {
    async fn next_event(&mut self) -> ConnectionEvent {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<LiveMessage>(&text) {
                    Ok(message) => return ConnectionEvent::Message(message),
                    Err(e) => warn!(error = %e, "Skipping malformed frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Server closed connection");
                    return ConnectionEvent::Closed { clean: true };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket receive error");
                    return ConnectionEvent::Closed { clean: false };
                }
                None => return ConnectionEvent::Closed { clean: false },
            }
        }
    }
}

/// Polled snapshot endpoint over HTTP
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSnapshotSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Snapshot(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self, limit: usize) -> Result<StatusResponse, TransportError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("limit", limit)])
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TransportError::Snapshot(e.to_string()))?;

        response
            .json::<StatusResponse>()
            .await
            .map_err(|e| TransportError::Snapshot(e.to_string()))
    }
}
