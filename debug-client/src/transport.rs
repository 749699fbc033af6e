use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use codex_monitor_client::AppServerBackend;
use codex_monitor_client::BackendError;
use codex_monitor_protocol::ClientInfo;
use codex_monitor_protocol::ClientRequestPayload;
use codex_monitor_protocol::InitializeParams;
use codex_monitor_protocol::InitializeResponse;
use codex_monitor_protocol::JSONRPCMessage;
use codex_monitor_protocol::JSONRPCNotification;
use codex_monitor_protocol::JSONRPCRequest;
use codex_monitor_protocol::JSONRPCResponse;
use codex_monitor_protocol::RequestId;
use codex_monitor_thread_state::WorkspaceEvent;
use codex_monitor_thread_state::WorkspaceMessage;
use serde_json::Value as JsonValue;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

/// Capacity of the channel feeding the writer task.
const CHANNEL_CAPACITY: usize = 128;

type PendingSender = oneshot::Sender<Result<JsonValue, BackendError>>;

/// One `codex app-server` child process speaking line-delimited JSON-RPC over
/// stdio. Serves exactly one workspace.
pub struct StdioAppServer {
    workspace_id: String,
    _child: Child,
    outgoing_tx: mpsc::Sender<JSONRPCMessage>,
    pending: Arc<Mutex<HashMap<RequestId, PendingSender>>>,
    id_counter: AtomicI64,
}

impl StdioAppServer {
    /// Spawn `codex_bin app-server` and start the IO tasks. Pushed
    /// notifications and server requests arrive on the returned receiver.
    pub fn spawn(
        codex_bin: &str,
        config_overrides: &[String],
        workspace_id: &str,
        cwd: &std::path::Path,
    ) -> std::io::Result<(Self, mpsc::UnboundedReceiver<WorkspaceEvent>)> {
        let mut command = Command::new(codex_bin);
        for override_kv in config_overrides {
            command.arg("--config").arg(override_kv);
        }
        let mut child = command
            .arg("app-server")
            .current_dir(cwd)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("failed to capture app-server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("failed to capture app-server stdout"))?;

        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<JSONRPCMessage>(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let pending: Arc<Mutex<HashMap<RequestId, PendingSender>>> =
            Arc::new(Mutex::new(HashMap::new()));

        {
            let mut stdin = stdin;
            tokio::spawn(async move {
                while let Some(message) = outgoing_rx.recv().await {
                    let mut line = match serde_json::to_string(&message) {
                        Ok(line) => line,
                        Err(err) => {
                            error!("failed to serialize message for app-server: {err}");
                            continue;
                        }
                    };
                    debug!("-> {line}");
                    line.push('\n');
                    if let Err(err) = stdin.write_all(line.as_bytes()).await {
                        error!("failed to write to app-server stdin: {err}");
                        break;
                    }
                }
            });
        }

        {
            let pending = Arc::clone(&pending);
            let workspace_id = workspace_id.to_string();
            let mut lines = BufReader::new(stdout).lines();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("<- {line}");
                    match serde_json::from_str::<JSONRPCMessage>(&line) {
                        Ok(JSONRPCMessage::Response(response)) => {
                            resolve(&pending, response.id, Ok(response.result)).await;
                        }
                        Ok(JSONRPCMessage::Error(err)) => {
                            let failure = BackendError::Rpc {
                                code: err.error.code,
                                message: err.error.message,
                            };
                            resolve(&pending, err.id, Err(failure)).await;
                        }
                        Ok(JSONRPCMessage::Notification(notification)) => {
                            let event = WorkspaceEvent {
                                workspace_id: workspace_id.clone(),
                                message: WorkspaceMessage::Notification(notification),
                            };
                            if event_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Ok(JSONRPCMessage::Request(request)) => {
                            let event = WorkspaceEvent {
                                workspace_id: workspace_id.clone(),
                                message: WorkspaceMessage::Request(request),
                            };
                            if event_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(err) => debug!("ignoring undecodable line from app-server: {err}"),
                    }
                }
                info!("app-server stdout closed");
                for (_, sender) in pending.lock().await.drain() {
                    let _ = sender.send(Err(BackendError::ConnectionClosed));
                }
            });
        }

        Ok((
            Self {
                workspace_id: workspace_id.to_string(),
                _child: child,
                outgoing_tx,
                pending,
                id_counter: AtomicI64::new(1),
            },
            event_rx,
        ))
    }

    /// `initialize` handshake followed by the `initialized` notification.
    pub async fn initialize(&self) -> Result<InitializeResponse, BackendError> {
        let params = InitializeParams {
            client_info: ClientInfo {
                name: "codex-monitor-debug".to_string(),
                title: Some("Codex Monitor Debug Shell".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        let result = self
            .request(&self.workspace_id, ClientRequestPayload::Initialize(params))
            .await?;
        let response = serde_json::from_value(result)?;
        self.send(JSONRPCMessage::Notification(JSONRPCNotification {
            method: "initialized".to_string(),
            params: None,
        }))
        .await?;
        Ok(response)
    }

    async fn send(&self, message: JSONRPCMessage) -> Result<(), BackendError> {
        self.outgoing_tx
            .send(message)
            .await
            .map_err(|_| BackendError::ConnectionClosed)
    }

    fn check_workspace(&self, workspace_id: &str) -> Result<(), BackendError> {
        if workspace_id == self.workspace_id {
            Ok(())
        } else {
            Err(BackendError::WorkspaceNotConnected(workspace_id.to_string()))
        }
    }
}

async fn resolve(
    pending: &Mutex<HashMap<RequestId, PendingSender>>,
    id: RequestId,
    result: Result<JsonValue, BackendError>,
) {
    match pending.lock().await.remove(&id) {
        Some(sender) => {
            let _ = sender.send(result);
        }
        None => warn!(%id, "response for unknown request"),
    }
}

#[async_trait]
impl AppServerBackend for StdioAppServer {
    async fn request(
        &self,
        workspace_id: &str,
        request: ClientRequestPayload,
    ) -> codex_monitor_client::Result<JsonValue> {
        self.check_workspace(workspace_id)?;
        let id = RequestId::Integer(self.id_counter.fetch_add(1, Ordering::SeqCst));
        let params = request.to_params()?;
        let message = JSONRPCMessage::Request(JSONRPCRequest {
            id: id.clone(),
            method: request.method().to_string(),
            params: (!params.is_null()).then_some(params),
        });

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);
        if let Err(err) = self.send(message).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }
        rx.await.unwrap_or(Err(BackendError::ConnectionClosed))
    }

    async fn respond_to_server_request(
        &self,
        workspace_id: &str,
        request_id: RequestId,
        result: JsonValue,
    ) -> codex_monitor_client::Result<()> {
        self.check_workspace(workspace_id)?;
        self.send(JSONRPCMessage::Response(JSONRPCResponse {
            id: request_id,
            result,
        }))
        .await
    }
}
