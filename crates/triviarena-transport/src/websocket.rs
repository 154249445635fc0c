//! WebSocket transport implementation using `tokio-tungstenite`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Path answered with a plain HTTP response instead of a WebSocket
/// upgrade.
const HEALTH_PATH: &str = "/api/health";

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket [`Transport`] with an origin allow-list.
///
/// Browser clients send an `Origin` header during the upgrade; requests
/// from unlisted origins are rejected with 403 before the WebSocket is
/// established. Requests without the header (native clients, tests) are
/// allowed through.
pub struct WebSocketTransport {
    listener: TcpListener,
    allowed_origins: Arc<Vec<String>>,
}

impl WebSocketTransport {
    /// Binds to `addr` with no origin restrictions beyond the built-in
    /// "missing header is fine" rule plus the given allow-list. An
    /// empty list allows every origin.
    pub async fn bind(
        addr: &str,
        allowed_origins: Vec<String>,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            allowed_origins: Arc::new(allowed_origins),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }
}

/// Matches the request line of a health probe. Only the head of the
/// first segment is inspected; the health path fits well inside it.
fn is_health_request(head: &[u8]) -> bool {
    let get = b"GET ";
    if !head.starts_with(get) {
        return false;
    }
    let rest = &head[get.len()..];
    let path = HEALTH_PATH.as_bytes();
    rest.starts_with(path)
        && matches!(rest.get(path.len()), Some(b' ') | Some(b'?'))
}

/// Answers a health probe and closes the connection.
async fn serve_health(mut stream: TcpStream) {
    // Drain what has arrived of the request, then reply and close.
    let mut buf = [0u8; 1024];
    let _ = stream.read(&mut buf).await;

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let body = serde_json::json!({
        "status": "UP",
        "timestamp": timestamp,
        "message": "Triviarena server is running",
    })
    .to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Upgrade-time origin check.
fn check_origin(
    request: &Request,
    response: Response,
    allowed: &[String],
) -> Result<Response, ErrorResponse> {
    let Some(origin) = request.headers().get("Origin") else {
        return Ok(response);
    };
    if allowed.is_empty() {
        return Ok(response);
    }
    let origin = origin.to_str().unwrap_or("");
    if allowed.iter().any(|a| a == origin) {
        Ok(response)
    } else {
        tracing::warn!(origin, "rejected upgrade from disallowed origin");
        let mut rejection = ErrorResponse::new(Some("origin not allowed".into()));
        *rejection.status_mut() = tokio_tungstenite::tungstenite::http::StatusCode::FORBIDDEN;
        Err(rejection)
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        loop {
            let (stream, addr) = self
                .listener
                .accept()
                .await
                .map_err(TransportError::AcceptFailed)?;

            // Health probes are plain HTTP on the same port; peek the
            // request head and answer them without an upgrade.
            let mut head = [0u8; 32];
            let peeked = stream.peek(&mut head).await.unwrap_or(0);
            if is_health_request(&head[..peeked]) {
                tracing::debug!(%addr, "health probe");
                tokio::spawn(serve_health(stream));
                continue;
            }

            let allowed = Arc::clone(&self.allowed_origins);
            let ws = tokio_tungstenite::accept_hdr_async(
                stream,
                move |request: &Request, response: Response| {
                    check_origin(request, response, &allowed)
                },
            )
            .await
            .map_err(|e| {
                TransportError::AcceptFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

            let id =
                ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
            tracing::debug!(%id, %addr, "accepted WebSocket connection");

            let (sink, stream) = ws.split();
            return Ok(WebSocketConnection {
                id,
                sink: Arc::new(Mutex::new(sink)),
                stream: Arc::new(Mutex::new(stream)),
            });
        }
    }
}

/// A single WebSocket connection.
///
/// The sink and stream halves are locked independently so one task can
/// pump outbound frames while another blocks on `recv`.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
    stream: Arc<Mutex<SplitStream<WsStream>>>,
}

impl Clone for WebSocketConnection {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            sink: Arc::clone(&self.sink),
            stream: Arc::clone(&self.stream),
        }
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &str) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .send(Message::Text(data.into()))
            .await
            .map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        loop {
            let msg = self.stream.lock().await.next().await;
            match msg {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .send(Message::Close(None))
            .await
            .map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
