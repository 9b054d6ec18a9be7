use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::connection::{self, ConnectionError};
use super::protocol::{JsonRpcError, Notification, Request, RequestId, Response};
use crate::api::ApiHandler;

/// Method that switches a connection into push mode
pub const SUBSCRIBE_METHOD: &str = "store.subscribe";

#[derive(Debug, thiserror::Error)]
pub enum IpcServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

pub type Result<T> = std::result::Result<T, IpcServerError>;

/// What the reader task hands to the connection loop
enum Incoming {
    Request(Request),
    Malformed(String),
}

pub struct IpcServer {
    socket_path: String,
    api_handler: Arc<ApiHandler>,
}

impl IpcServer {
    pub fn new(socket_path: String, api_handler: Arc<ApiHandler>) -> Self {
        Self {
            socket_path,
            api_handler,
        }
    }

    pub async fn start(self: Arc<Self>) -> Result<()> {
        let path = Path::new(&self.socket_path);
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("IPC server listening on {}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream).await {
                            tracing::error!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    async fn handle_connection(&self, stream: UnixStream) -> Result<()> {
        tracing::debug!("New client connected");

        let (mut reader, mut writer) = connection::split(stream);

        // Reading lives in its own task: read_line is not cancel-safe inside select!
        let (request_tx, mut request_rx) = mpsc::channel::<Incoming>(32);
        let reader_task = tokio::spawn(async move {
            loop {
                let incoming = match connection::read_request(&mut reader).await {
                    Ok(request) => Incoming::Request(request),
                    Err(ConnectionError::Json(e)) => Incoming::Malformed(e.to_string()),
                    Err(ConnectionError::Closed) => break,
                    Err(e) => {
                        tracing::warn!("Failed to read request: {}", e);
                        break;
                    }
                };
                if request_tx.send(incoming).await.is_err() {
                    break;
                }
            }
        });

        let (notif_tx, mut notif_rx) = mpsc::channel::<Notification>(100);
        let mut forwarder: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                incoming = request_rx.recv() => {
                    let response = match incoming {
                        Some(Incoming::Request(request)) if request.method == SUBSCRIBE_METHOD => {
                            if forwarder.is_none() {
                                forwarder = Some(self.spawn_forwarder(notif_tx.clone()));
                            }
                            Response::success(json!({ "subscribed": true }), request.id)
                        }
                        Some(Incoming::Request(request)) => {
                            tracing::debug!("handler: received request: {}", request.method);
                            self.handle_request(request).await
                        }
                        Some(Incoming::Malformed(message)) => {
                            tracing::warn!("Malformed request: {}", message);
                            Response::error(JsonRpcError::parse_error(message), RequestId::Null)
                        }
                        None => {
                            tracing::debug!("Client disconnected");
                            break;
                        }
                    };

                    if let Err(e) = connection::write_message(&mut writer, &response).await {
                        tracing::error!("Failed to write response: {}", e);
                        break;
                    }
                }
                Some(notification) = notif_rx.recv() => {
                    tracing::trace!("IPC: Sending notification to client: {}", notification.method);
                    if let Err(e) = connection::write_message(&mut writer, &notification).await {
                        tracing::warn!("Failed to send notification: {}", e);
                        break;
                    }
                }
            }
        }

        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }
        reader_task.abort();

        Ok(())
    }

    /// Push the current values, then every change, to one client
    fn spawn_forwarder(&self, notif_tx: mpsc::Sender<Notification>) -> JoinHandle<()> {
        let api_handler = self.api_handler.clone();
        // Subscribe before reading the current values so no change falls in between
        let mut event_rx = api_handler.subscribe_events();

        tokio::spawn(async move {
            tracing::info!("IPC: Event forwarder task started");

            let mut pending = api_handler.initial_events().await;
            'forward: loop {
                for event in pending.drain(..) {
                    if notif_tx.send(Notification::from(&event)).await.is_err() {
                        break 'forward;
                    }
                }

                match event_rx.recv().await {
                    Ok(event) => pending.push(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Every event is a full value, so resending the current state catches up
                        tracing::warn!("IPC: Subscriber lagged by {} events, resyncing", skipped);
                        pending = api_handler.initial_events().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            tracing::info!("IPC: Event forwarder task stopped");
        })
    }

    async fn handle_request(&self, request: Request) -> Response {
        if let Err(error) = request.validate() {
            return Response::error(error, request.id);
        }

        match self
            .api_handler
            .handle(&request.method, request.params)
            .await
        {
            Ok(result) => Response::success(result, request.id),
            Err(error) => {
                tracing::debug!("Request {} failed: {}", request.method, error);
                Response::error(JsonRpcError::from(error), request.id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_manager::EventManager;
    use crate::ipc::protocol::METHOD_NOT_FOUND;
    use crate::store::RealtimeStore;
    use racetimer_core::clock::ManualClock;
    use tempfile::TempDir;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    async fn start_server(temp_dir: &TempDir) -> (String, JoinHandle<()>) {
        let socket_path = temp_dir
            .path()
            .join("test.sock")
            .to_str()
            .unwrap()
            .to_string();

        let event_manager = Arc::new(EventManager::new());
        let clock = Arc::new(ManualClock::new(9_000));
        let store = Arc::new(RealtimeStore::in_memory(event_manager.clone(), clock));
        let api_handler = Arc::new(ApiHandler::new(event_manager, store));
        let server = Arc::new(IpcServer::new(socket_path.clone(), api_handler));

        let handle = tokio::spawn(async move {
            server.start().await.unwrap();
        });

        for _ in 0..50 {
            if Path::new(&socket_path).exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        (socket_path, handle)
    }

    async fn send_line(stream: &mut UnixStream, line: &str) {
        stream.write_all(line.as_bytes()).await.unwrap();
        stream.write_all(b"\n").await.unwrap();
        stream.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_request_and_errors() {
        let temp_dir = TempDir::new().unwrap();
        let (socket_path, handle) = start_server(&temp_dir).await;

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        send_line(&mut stream, r#"{"jsonrpc":"2.0","method":"server.time","id":1}"#).await;
        send_line(&mut stream, "{not json").await;
        send_line(&mut stream, r#"{"jsonrpc":"2.0","method":"nope","id":2}"#).await;

        let mut reader = BufReader::new(stream);
        let mut lines = Vec::new();
        for _ in 0..3 {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            lines.push(serde_json::from_str::<Response>(&line).unwrap());
        }

        assert_eq!(lines[0].result.as_ref().unwrap()["now"], 9_000);
        assert_eq!(lines[1].error.as_ref().unwrap().code, -32700);
        assert_eq!(lines[1].id, RequestId::Null);
        assert_eq!(lines[2].error.as_ref().unwrap().code, METHOD_NOT_FOUND);

        handle.abort();
    }

    #[tokio::test]
    async fn test_subscribe_pushes_current_values() {
        let temp_dir = TempDir::new().unwrap();
        let (socket_path, handle) = start_server(&temp_dir).await;

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        send_line(&mut stream, r#"{"jsonrpc":"2.0","method":"store.subscribe","id":1}"#).await;

        let mut reader = BufReader::new(stream);
        let mut methods = Vec::new();
        let mut subscribed = false;
        while methods.len() < 2 || !subscribed {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            if let Ok(notification) = serde_json::from_str::<Notification>(&line) {
                methods.push(notification.method);
            } else {
                let response: Response = serde_json::from_str(&line).unwrap();
                assert_eq!(response.result.unwrap()["subscribed"], true);
                subscribed = true;
            }
        }

        assert_eq!(methods, vec!["timer.value", "roster.value"]);

        handle.abort();
    }
}
