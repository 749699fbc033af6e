use codex_monitor_protocol::AskForApproval;
use codex_monitor_protocol::CommandExecutionApprovalDecision;
use codex_monitor_protocol::CommandExecutionRequestApprovalResponse;
use codex_monitor_protocol::FileChangeApprovalDecision;
use codex_monitor_protocol::FileChangeRequestApprovalResponse;
use codex_monitor_protocol::RequestId;
use codex_monitor_protocol::ReviewDelivery;
use codex_monitor_protocol::ReviewStartParams;
use codex_monitor_protocol::ServerRequestResponse;
use codex_monitor_protocol::ToolRequestUserInputResponse;
use codex_monitor_protocol::TurnInterruptParams;
use codex_monitor_protocol::TurnStartParams;
use codex_monitor_protocol::UserInput;
use codex_monitor_thread_state::ConversationItem;
use codex_monitor_thread_state::ReviewState;
use codex_monitor_thread_state::ThreadAction;
use serde_json::Value as JsonValue;
use serde_json::json;
use tracing::debug;
use tracing::info;
use tracing::warn;
use uuid::Uuid;

use crate::MonitorClient;
use crate::WorkspaceInfo;
use crate::debug::DebugSource;
use crate::now_ms;
use crate::queue::QueuedMessage;
use crate::response;
use crate::response::StartsTurn;
use crate::review::parse_review_target;
use crate::review::review_label;

pub const SESSION_STOPPED_MESSAGE: &str = "Session stopped.";

/// What became of a user send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank text, unknown workspace, or a thread that cannot take it now.
    Ignored,
    /// The thread was busy; the message waits in its queue.
    Queued,
    Sent { turn_id: String },
    /// The request failed and an inline error message was added.
    Failed,
}

/// User answer to an approval prompt. Maps onto the per-method decision
/// enums of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Accept,
    AcceptForSession,
    Decline,
    Cancel,
}

impl From<ApprovalDecision> for CommandExecutionApprovalDecision {
    fn from(decision: ApprovalDecision) -> Self {
        match decision {
            ApprovalDecision::Accept => CommandExecutionApprovalDecision::Accept,
            ApprovalDecision::AcceptForSession => {
                CommandExecutionApprovalDecision::AcceptForSession
            }
            ApprovalDecision::Decline => CommandExecutionApprovalDecision::Decline,
            ApprovalDecision::Cancel => CommandExecutionApprovalDecision::Cancel,
        }
    }
}

impl From<ApprovalDecision> for FileChangeApprovalDecision {
    fn from(decision: ApprovalDecision) -> Self {
        match decision {
            ApprovalDecision::Accept => FileChangeApprovalDecision::Accept,
            ApprovalDecision::AcceptForSession => FileChangeApprovalDecision::AcceptForSession,
            ApprovalDecision::Decline => FileChangeApprovalDecision::Decline,
            ApprovalDecision::Cancel => FileChangeApprovalDecision::Cancel,
        }
    }
}

impl MonitorClient {
    /// Send `text` to the workspace's active thread, creating or resuming the
    /// thread first when needed. Messages typed while the thread is busy are
    /// queued and flushed once it goes idle.
    pub async fn send_user_message(&self, workspace_id: &str, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }
        let Some(workspace) = self.workspace(workspace_id) else {
            debug!(workspace_id, "dropping message for unknown workspace");
            return SendOutcome::Ignored;
        };
        let Some(thread_id) = self.ensure_active_thread(&workspace).await else {
            return SendOutcome::Failed;
        };

        let status = self.store.read(|state| state.status(&thread_id));
        if !status.is_idle() || self.queue.has_pending(&thread_id) {
            self.queue.enqueue(
                &thread_id,
                QueuedMessage {
                    id: Uuid::new_v4().to_string(),
                    text: text.to_string(),
                    created_at_ms: now_ms(),
                },
            );
            info!(thread_id = thread_id.as_str(), "queued message for busy thread");
            if status.is_idle() {
                self.flush_thread(&workspace, &thread_id).await;
            }
            return SendOutcome::Queued;
        }

        let item_id = Uuid::new_v4().to_string();
        match self
            .send_to_thread(&workspace, &thread_id, &item_id, text)
            .await
        {
            Some(turn_id) => SendOutcome::Sent { turn_id },
            None => SendOutcome::Failed,
        }
    }

    /// Active thread of the workspace, resumed if its history was never
    /// fetched, or a freshly started one.
    async fn ensure_active_thread(&self, workspace: &WorkspaceInfo) -> Option<String> {
        if let Some(thread_id) = self.active_thread_id(&workspace.id) {
            if !self.is_thread_loaded(&thread_id) {
                self.resume_thread(&workspace.id, &thread_id, false).await;
            }
            return Some(thread_id);
        }
        let _starting = self.thread_start.lock().await;
        if let Some(thread_id) = self.active_thread_id(&workspace.id) {
            return Some(thread_id);
        }
        self.start_thread(&workspace.id).await
    }

    fn active_thread_id(&self, workspace_id: &str) -> Option<String> {
        self.store
            .read(|state| state.active_thread(workspace_id).map(str::to_string))
    }

    /// Optimistically show the message, then `turn/start`. Returns the new
    /// turn id, or `None` after rolling back.
    async fn send_to_thread(
        &self,
        workspace: &WorkspaceInfo,
        thread_id: &str,
        item_id: &str,
        text: &str,
    ) -> Option<String> {
        self.store.dispatch_all([
            ThreadAction::AddUserMessage {
                workspace_id: workspace.id.clone(),
                thread_id: thread_id.to_string(),
                item_id: item_id.to_string(),
                text: text.to_string(),
                timestamp_ms: now_ms(),
            },
            ThreadAction::MarkProcessing {
                thread_id: thread_id.to_string(),
                is_processing: true,
            },
        ]);

        let params = TurnStartParams {
            thread_id: thread_id.to_string(),
            input: vec![UserInput::Text {
                text: text.to_string(),
            }],
            cwd: Some(workspace.path.clone()),
            approval_policy: Some(AskForApproval::OnRequest),
            sandbox_policy: Some(self.config.access_mode.sandbox_policy(&workspace.path)),
            model: self.config.model.clone(),
            effort: self.config.effort,
        };
        self.debug_request("turn/start", &params);

        let result = self.backend.start_turn(&workspace.id, params).await;
        match self.turn_id_or_error::<TurnStartParams>(result) {
            Ok(turn_id) => {
                self.store.dispatch(ThreadAction::SetActiveTurnId {
                    thread_id: thread_id.to_string(),
                    turn_id: Some(turn_id.clone()),
                });
                Some(turn_id)
            }
            Err(message) => {
                self.roll_back_turn(
                    &workspace.id,
                    thread_id,
                    format!("Failed to start turn: {message}"),
                    false,
                );
                None
            }
        }
    }

    /// Stop the running turn. Local state is cleared first; the server is told
    /// afterwards and its answer only logged. Without an active turn this does
    /// nothing.
    pub async fn interrupt_turn(&self, workspace_id: &str, thread_id: &str) {
        let Some(turn_id) = self
            .store
            .read(|state| state.active_turn(thread_id).map(str::to_string))
        else {
            debug!(thread_id, "no active turn to interrupt");
            return;
        };
        self.store.dispatch_all([
            ThreadAction::MarkProcessing {
                thread_id: thread_id.to_string(),
                is_processing: false,
            },
            ThreadAction::SetActiveTurnId {
                thread_id: thread_id.to_string(),
                turn_id: None,
            },
            ThreadAction::UpsertItem {
                workspace_id: workspace_id.to_string(),
                thread_id: thread_id.to_string(),
                item: ConversationItem::assistant_message(
                    format!("interrupt-{}", Uuid::new_v4()),
                    SESSION_STOPPED_MESSAGE,
                ),
            },
        ]);

        let params = TurnInterruptParams {
            thread_id: thread_id.to_string(),
            turn_id,
        };
        self.debug_request("turn/interrupt", &params);
        match self.backend.interrupt_turn(workspace_id, params).await {
            Ok(result) => self.store.debug(DebugSource::Server, "turn/interrupt", result),
            Err(err) => {
                warn!(thread_id, "turn/interrupt failed: {err}");
                self.store.debug(
                    DebugSource::Error,
                    "turn/interrupt",
                    json!({ "error": err.to_string() }),
                );
            }
        }
    }

    /// Start a code review on the active thread from the text of a `/review`
    /// command.
    pub async fn start_review(&self, workspace_id: &str, text: &str) -> SendOutcome {
        let Some(workspace) = self.workspace(workspace_id) else {
            debug!(workspace_id, "dropping review for unknown workspace");
            return SendOutcome::Ignored;
        };
        let Some(thread_id) = self.ensure_active_thread(&workspace).await else {
            return SendOutcome::Failed;
        };
        if !self.store.read(|state| state.status(&thread_id)).is_idle() {
            info!(thread_id = thread_id.as_str(), "thread busy; review not started");
            return SendOutcome::Ignored;
        }

        let target = parse_review_target(text);
        self.store.dispatch_all([
            ThreadAction::MarkProcessing {
                thread_id: thread_id.clone(),
                is_processing: true,
            },
            ThreadAction::MarkReviewing {
                thread_id: thread_id.clone(),
                is_reviewing: true,
            },
            ThreadAction::UpsertItem {
                workspace_id: workspace.id.clone(),
                thread_id: thread_id.clone(),
                item: ConversationItem::Review {
                    id: format!("review-start-{}", Uuid::new_v4()),
                    state: ReviewState::Started,
                    text: review_label(&target),
                },
            },
        ]);

        let params = ReviewStartParams {
            thread_id: thread_id.clone(),
            target,
            delivery: Some(ReviewDelivery::Inline),
        };
        self.debug_request("review/start", &params);
        let result = self.backend.start_review(&workspace.id, params).await;
        match self.turn_id_or_error::<ReviewStartParams>(result) {
            Ok(turn_id) => {
                self.store.dispatch(ThreadAction::SetActiveTurnId {
                    thread_id,
                    turn_id: Some(turn_id.clone()),
                });
                SendOutcome::Sent { turn_id }
            }
            Err(message) => {
                self.roll_back_turn(
                    &workspace.id,
                    &thread_id,
                    format!("Failed to start review: {message}"),
                    true,
                );
                SendOutcome::Failed
            }
        }
    }

    /// Answer a pending approval. The prompt is removed only once the server
    /// accepted the answer.
    pub async fn respond_to_approval(
        &self,
        workspace_id: &str,
        request_id: &RequestId,
        decision: ApprovalDecision,
    ) -> bool {
        let Some(method) = self.pending_request_method(workspace_id, request_id) else {
            debug!(workspace_id, %request_id, "no pending approval");
            return false;
        };
        let response = match method.as_str() {
            CommandExecutionRequestApprovalResponse::METHOD => {
                serde_json::to_value(CommandExecutionRequestApprovalResponse {
                    decision: decision.into(),
                })
            }
            FileChangeRequestApprovalResponse::METHOD => {
                serde_json::to_value(FileChangeRequestApprovalResponse {
                    decision: decision.into(),
                })
            }
            other => {
                warn!(%request_id, "`{other}` is not an approval request");
                return false;
            }
        };
        self.answer_server_request(workspace_id, request_id, &method, response)
            .await
    }

    pub async fn respond_to_user_input(
        &self,
        workspace_id: &str,
        request_id: &RequestId,
        answers: JsonValue,
    ) -> bool {
        match self.pending_request_method(workspace_id, request_id) {
            Some(method) if method == ToolRequestUserInputResponse::METHOD => {
                let response = serde_json::to_value(ToolRequestUserInputResponse { answers });
                self.answer_server_request(workspace_id, request_id, &method, response)
                    .await
            }
            _ => {
                debug!(workspace_id, %request_id, "no pending user input request");
                false
            }
        }
    }

    fn pending_request_method(&self, workspace_id: &str, request_id: &RequestId) -> Option<String> {
        self.store.read(|state| {
            state
                .approvals_for_workspace(workspace_id)
                .find(|approval| &approval.request_id == request_id)
                .map(|approval| approval.method.clone())
        })
    }

    async fn answer_server_request(
        &self,
        workspace_id: &str,
        request_id: &RequestId,
        method: &str,
        response: serde_json::Result<JsonValue>,
    ) -> bool {
        let response = match response {
            Ok(response) => response,
            Err(err) => {
                warn!(%request_id, "failed to encode {method} response: {err}");
                return false;
            }
        };
        self.store.debug(DebugSource::Client, method, response.clone());
        match self
            .backend
            .respond_to_server_request(workspace_id, request_id.clone(), response)
            .await
        {
            Ok(()) => {
                self.store.dispatch(ThreadAction::RemoveApproval {
                    workspace_id: workspace_id.to_string(),
                    request_id: request_id.clone(),
                });
                true
            }
            Err(err) => {
                warn!(%request_id, "failed to answer {method}: {err}");
                self.store.debug(
                    DebugSource::Error,
                    method,
                    json!({ "error": err.to_string() }),
                );
                false
            }
        }
    }

    /// Flush every ready queue of threads in `workspace_id`, one message per
    /// thread.
    pub async fn flush_queued_messages(&self, workspace_id: &str) {
        let Some(workspace) = self.workspace(workspace_id) else {
            return;
        };
        for thread_id in self.queue.ready_threads() {
            let in_workspace = self.store.read(|state| {
                state.workspace_for_thread(&thread_id) == Some(workspace_id)
            });
            if in_workspace {
                self.flush_thread(&workspace, &thread_id).await;
            }
        }
    }

    /// Send the next queued message when the thread is idle. The queued id is
    /// reused as the user item id so a retry replaces rather than duplicates
    /// the bubble.
    async fn flush_thread(&self, workspace: &WorkspaceInfo, thread_id: &str) -> bool {
        if !self.store.read(|state| state.status(thread_id)).is_idle() {
            return false;
        }
        let Some(guard) = self.queue.begin_flush(thread_id) else {
            return false;
        };
        let Some(message) = guard.message().cloned() else {
            return false;
        };
        match self
            .send_to_thread(workspace, thread_id, &message.id, &message.text)
            .await
        {
            Some(_) => {
                guard.succeeded();
                true
            }
            None => {
                guard.failed(self.config.queue_flush_retry_limit);
                false
            }
        }
    }

    fn turn_id_or_error<M: StartsTurn>(
        &self,
        result: crate::Result<JsonValue>,
    ) -> Result<String, String> {
        let label = M::METHOD;
        let result = match result {
            Ok(result) => result,
            Err(err) => {
                self.store
                    .debug(DebugSource::Error, label, json!({ "error": err.to_string() }));
                warn!("{label} failed: {err}");
                return Err(err.to_string());
            }
        };
        self.store.debug(DebugSource::Server, label, result.clone());
        if let Some(message) = response::embedded_error(&result) {
            warn!("{label} returned an error: {message}");
            return Err(message);
        }
        response::turn_id::<M>(&result).ok_or_else(|| {
            warn!("{label} response carried no turn id");
            "missing turn id in response".to_string()
        })
    }

    fn roll_back_turn(
        &self,
        workspace_id: &str,
        thread_id: &str,
        message: String,
        reviewing: bool,
    ) {
        let mut actions = vec![
            ThreadAction::MarkProcessing {
                thread_id: thread_id.to_string(),
                is_processing: false,
            },
            ThreadAction::SetActiveTurnId {
                thread_id: thread_id.to_string(),
                turn_id: None,
            },
        ];
        if reviewing {
            actions.push(ThreadAction::MarkReviewing {
                thread_id: thread_id.to_string(),
                is_reviewing: false,
            });
        }
        actions.push(ThreadAction::UpsertItem {
            workspace_id: workspace_id.to_string(),
            thread_id: thread_id.to_string(),
            item: ConversationItem::assistant_message(format!("error-{}", Uuid::new_v4()), message),
        });
        self.store.dispatch_all(actions);
    }

    pub(crate) fn debug_request(&self, label: &str, params: &impl serde::Serialize) {
        let payload = serde_json::to_value(params).unwrap_or(JsonValue::Null);
        self.store.debug(DebugSource::Client, label, payload);
    }
}
