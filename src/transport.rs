//! Length-prefixed framed transport over a local Unix domain socket.
//!
//! Each frame is a 4-byte big-endian length prefix followed by a
//! MessagePack-encoded [`Message`](crate::schema::Message). The server accepts
//! one task per connection, spawning a receive loop per client; the client
//! holds a single connection and serializes writes behind a mutex so
//! concurrent senders never interleave frames.

use crate::error::{McpError, McpResult};
use crate::schema::{Message, MessageType, TaskResponse};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;

/// Default cap on a single frame's encoded size (10 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Default interval between bridge heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default ceiling on establishing a client connection.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay between client reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Receives messages dispatched off a connection's receive loop.
///
/// Implementations must not block the loop for long: heavy work should be
/// handed off (e.g. `tokio::spawn`) rather than awaited inline, so one slow
/// task doesn't stall delivery to the same client. An `Err` return means the
/// message was not handled successfully; for a `task_request`, the receive
/// loop synthesizes and sends a failed task-response back to the sender.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, message: Message, client_id: String) -> McpResult<()>;
}

/// Encode a message as a length-prefixed frame.
///
/// MessagePack (not `bincode`) is the wire encoding: a message's `payload`
/// is an arbitrary `serde_json::Value`, and `Value`'s `Deserialize` impl
/// needs a self-describing format (`deserialize_any`) that `bincode`
/// doesn't provide.
pub fn encode_frame(message: &Message) -> McpResult<Vec<u8>> {
    let body = rmp_serde::to_vec_named(message)
        .map_err(|e| McpError::InvalidMessageFormat(format!("encode failed: {e}")))?;
    let mut framed = Vec::with_capacity(4 + body.len());
    framed.extend_from_slice(&(body.len() as u32).to_be_bytes());
    framed.extend_from_slice(&body);
    Ok(framed)
}

/// Decode a frame body (without the length prefix) into a message.
pub fn decode_frame(body: &[u8]) -> McpResult<Message> {
    rmp_serde::from_slice(body).map_err(|e| McpError::InvalidMessageFormat(format!("decode failed: {e}")))
}

/// A single accepted or outbound connection: one reader loop, one writer lock.
struct Connection {
    client_id: String,
    writer: Mutex<OwnedWriteHalf>,
    max_message_size: usize,
}

impl Connection {
    async fn send(&self, message: &Message) -> McpResult<()> {
        let framed = encode_frame(message)?;
        if framed.len() - 4 > self.max_message_size {
            return Err(McpError::InvalidMessageFormat(format!(
                "message too large: {} bytes",
                framed.len() - 4
            )));
        }
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&framed)
            .await
            .map_err(|e| McpError::NetworkError(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| McpError::NetworkError(e.to_string()))
    }
}

/// Build the failed task-response to send back when a `task_request`'s
/// handler errors, preserving correlation id and swapped sender/recipient.
/// Returns `None` if the request's payload has no parseable `task_id`.
fn synthesize_task_failure(request: &Message, error: &McpError) -> Option<Message> {
    let task_id = serde_json::from_value(request.payload.get("task_id")?.clone()).ok()?;
    let response = TaskResponse::failed(task_id, error);
    let payload = serde_json::to_value(response).ok()?;
    Some(request.reply(MessageType::TaskResponse, payload))
}

async fn receive_loop(
    client_id: String,
    mut reader: OwnedReadHalf,
    max_message_size: usize,
    handler: Arc<dyn MessageHandler>,
    connection: Arc<Connection>,
) {
    loop {
        let mut length_buf = [0u8; 4];
        if reader.read_exact(&mut length_buf).await.is_err() {
            break;
        }
        let message_len = u32::from_be_bytes(length_buf) as usize;
        if message_len > max_message_size {
            log::error!(
                "client {client_id} sent oversized frame ({message_len} bytes), closing connection"
            );
            break;
        }
        let mut body = vec![0u8; message_len];
        if reader.read_exact(&mut body).await.is_err() {
            break;
        }
        match decode_frame(&body) {
            Ok(message) => {
                let message_type = message.message_type;
                let message_for_failure = message.clone();
                if let Err(e) = handler.handle_message(message, client_id.clone()).await {
                    log::error!("handler failed for message from {client_id}: {e}");
                    if message_type == MessageType::TaskRequest {
                        if let Some(reply) = synthesize_task_failure(&message_for_failure, &e) {
                            if let Err(send_err) = connection.send(&reply).await {
                                log::error!(
                                    "failed to send synthesized failure response to {client_id}: {send_err}"
                                );
                            }
                        }
                    }
                }
            }
            Err(e) => log::error!("failed to decode frame from {client_id}: {e}"),
        }
    }
    log::info!("client {client_id} disconnected");
}

/// Unix socket server: accepts connections, dispatches inbound messages to a
/// shared [`MessageHandler`], and can reply to or broadcast across clients.
pub struct UnixSocketServer {
    socket_path: PathBuf,
    max_message_size: usize,
    clients: Arc<DashMap<String, Arc<Connection>>>,
    handler: Arc<dyn MessageHandler>,
    running: AtomicBool,
    next_client_seq: std::sync::atomic::AtomicU64,
}

impl UnixSocketServer {
    pub fn new(socket_path: impl Into<PathBuf>, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            socket_path: socket_path.into(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            clients: Arc::new(DashMap::new()),
            handler,
            running: AtomicBool::new(false),
            next_client_seq: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Bind the socket, removing any stale file left by a prior run, and
    /// start accepting connections in the background.
    pub async fn start(self: &Arc<Self>) -> McpResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .map_err(|e| McpError::NetworkError(format!("removing stale socket: {e}")))?;
        }
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| McpError::NetworkError(format!("creating socket dir: {e}")))?;
        }
        let listener = UnixListener::bind(&self.socket_path)
            .map_err(|e| McpError::NetworkError(format!("bind failed: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| McpError::NetworkError(format!("chmod failed: {e}")))?;
        }

        log::info!("unix socket server listening at {}", self.socket_path.display());

        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if !this.running.load(Ordering::SeqCst) {
                    break;
                }
                match listener.accept().await {
                    Ok((stream, _addr)) => this.accept_connection(stream),
                    Err(e) => {
                        log::error!("accept failed: {e}");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    fn accept_connection(self: &Arc<Self>, stream: UnixStream) {
        let seq = self.next_client_seq.fetch_add(1, Ordering::SeqCst);
        let client_id = format!("client-{seq}");
        let (reader, writer) = stream.into_split();
        let connection = Arc::new(Connection {
            client_id: client_id.clone(),
            writer: Mutex::new(writer),
            max_message_size: self.max_message_size,
        });
        self.clients.insert(client_id.clone(), Arc::clone(&connection));
        log::info!("client {client_id} connected");

        let clients = Arc::clone(&self.clients);
        let handler = Arc::clone(&self.handler);
        let max_message_size = self.max_message_size;
        tokio::spawn(async move {
            receive_loop(client_id.clone(), reader, max_message_size, handler, connection).await;
            clients.remove(&client_id);
        });
    }

    /// Send to one client, or broadcast to all connected clients if `client_id` is `None`.
    pub async fn send_message(&self, message: &Message, client_id: Option<&str>) -> McpResult<()> {
        match client_id {
            Some(id) => {
                let connection = self
                    .clients
                    .get(id)
                    .map(|entry| Arc::clone(entry.value()))
                    .ok_or_else(|| McpError::NetworkError(format!("client {id} not found")))?;
                connection.send(message).await
            }
            None => {
                if self.clients.is_empty() {
                    log::warn!("no clients connected for broadcast");
                    return Ok(());
                }
                for entry in self.clients.iter() {
                    if let Err(e) = entry.value().send(message).await {
                        log::error!("failed to send to {}: {e}", entry.key());
                    }
                }
                Ok(())
            }
        }
    }

    pub fn connected_clients(&self) -> Vec<String> {
        self.clients.iter().map(|e| e.key().clone()).collect()
    }

    /// Stop accepting connections and remove the socket file.
    pub async fn stop(&self) -> McpResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.clients.clear();
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
        log::info!("unix socket server stopped");
        Ok(())
    }
}

/// Unix socket client: a single outbound connection to a [`UnixSocketServer`].
pub struct UnixSocketClient {
    socket_path: PathBuf,
    max_message_size: usize,
    connect_timeout: Duration,
    handler: Arc<dyn MessageHandler>,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl UnixSocketClient {
    pub fn new(socket_path: impl Into<PathBuf>, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            socket_path: socket_path.into(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            connect_timeout: DEFAULT_CONNECTION_TIMEOUT,
            handler,
            connection: Mutex::new(None),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub async fn connect(&self) -> McpResult<()> {
        let mut guard = self.connection.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let stream = tokio::time::timeout(self.connect_timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| McpError::NetworkError("connection timed out".to_string()))?
            .map_err(|e| McpError::NetworkError(format!("connect failed: {e}")))?;

        let (reader, writer) = stream.into_split();
        let connection = Arc::new(Connection {
            client_id: "server".to_string(),
            writer: Mutex::new(writer),
            max_message_size: self.max_message_size,
        });
        *guard = Some(Arc::clone(&connection));

        let handler = Arc::clone(&self.handler);
        let max_message_size = self.max_message_size;
        let connection_for_loop = Arc::clone(&connection);
        tokio::spawn(async move {
            receive_loop("server".to_string(), reader, max_message_size, handler, connection_for_loop).await;
        });

        log::info!("connected to unix socket server at {}", self.socket_path.display());
        Ok(())
    }

    pub async fn disconnect(&self) {
        let mut guard = self.connection.lock().await;
        *guard = None;
    }

    pub async fn send_message(&self, message: &Message) -> McpResult<()> {
        let guard = self.connection.lock().await;
        match guard.as_ref() {
            Some(connection) => connection.send(message).await,
            None => Err(McpError::NetworkError("not connected to server".to_string())),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }
}

/// Resolve the socket path the bus uses by default, honoring `CARTRITA_MCP_SOCKET_PATH`.
pub fn default_socket_path() -> PathBuf {
    std::env::var("CARTRITA_MCP_SOCKET_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| Path::new("/tmp/cartrita_mcp.sock").to_path_buf())
}
