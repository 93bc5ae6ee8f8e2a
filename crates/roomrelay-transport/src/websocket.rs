//! WebSocket transport implementation using `tokio-tungstenite`.

use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Source of connection ids; starts at 1 so `conn-0` never appears.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Upper bound on the HTTP upgrade exchange for a single client.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// Accepts WebSocket upgrades on a TCP listener.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// The bound address, which differs from the requested one after
    /// binding port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A TCP peer that has connected but not yet completed the WebSocket
/// upgrade.
#[derive(Debug)]
pub struct IncomingStream {
    stream: TcpStream,
    addr: SocketAddr,
}

impl IncomingStream {
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Transport for WebSocketTransport {
    type Incoming = IncomingStream;
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::debug!(%addr, "tcp peer connected");
        Ok(IncomingStream { stream, addr })
    }

    async fn upgrade(incoming: Self::Incoming) -> Result<Self::Connection, Self::Error> {
        let IncomingStream { stream, addr } = incoming;
        let ws = tokio::time::timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::accept_async(stream))
            .await
            .map_err(|_| {
                TransportError::HandshakeFailed(io_error(ErrorKind::TimedOut, "websocket handshake timed out"))
            })?
            .map_err(|e| TransportError::HandshakeFailed(io_error(ErrorKind::ConnectionRefused, e)))?;

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %addr, "WebSocket upgrade complete");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, "WebSocket transport no longer accepting");
        }
        Ok(())
    }
}

/// An upgraded WebSocket, split into a write half and a read half that are
/// locked separately.
#[derive(Debug)]
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, frame: &str) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .send(Message::text(frame.to_owned()))
            .await
            .map_err(|e| TransportError::SendFailed(io_error(ErrorKind::BrokenPipe, e)))
    }

    async fn recv(&self) -> Result<Option<String>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data.to_vec())
                        .map(Some)
                        .map_err(|_| TransportError::InvalidText);
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(io_error(ErrorKind::ConnectionReset, e)));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let mut sink = self.sink.lock().await;
        sink.close()
            .await
            .map_err(|e| TransportError::SendFailed(io_error(ErrorKind::BrokenPipe, e)))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

fn io_error<E>(kind: ErrorKind, inner: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(kind, inner)
}
