use async_trait::async_trait;
use codex_monitor_protocol::ClientRequestPayload;
use codex_monitor_protocol::RequestId;
use codex_monitor_protocol::ReviewStartParams;
use codex_monitor_protocol::ThreadArchiveParams;
use codex_monitor_protocol::ThreadListParams;
use codex_monitor_protocol::ThreadResumeParams;
use codex_monitor_protocol::ThreadStartParams;
use codex_monitor_protocol::TurnInterruptParams;
use codex_monitor_protocol::TurnStartParams;
use serde_json::Value as JsonValue;

use crate::error::Result;

/// Request/response access to one app-server per workspace.
///
/// Implementations only move bytes: responses are the raw JSON-RPC `result`
/// value and any failure to obtain one is a [`BackendError`](crate::BackendError).
/// Pushed notifications and server requests travel separately as
/// [`WorkspaceEvent`](codex_monitor_thread_state::WorkspaceEvent)s.
#[async_trait]
pub trait AppServerBackend: Send + Sync {
    async fn request(
        &self,
        workspace_id: &str,
        request: ClientRequestPayload,
    ) -> Result<JsonValue>;

    /// Answer a request the server pushed to us (approvals, user input).
    async fn respond_to_server_request(
        &self,
        workspace_id: &str,
        request_id: RequestId,
        result: JsonValue,
    ) -> Result<()>;

    async fn start_thread(
        &self,
        workspace_id: &str,
        params: ThreadStartParams,
    ) -> Result<JsonValue> {
        self.request(workspace_id, params.into()).await
    }

    async fn resume_thread(
        &self,
        workspace_id: &str,
        params: ThreadResumeParams,
    ) -> Result<JsonValue> {
        self.request(workspace_id, params.into()).await
    }

    async fn list_threads(
        &self,
        workspace_id: &str,
        params: ThreadListParams,
    ) -> Result<JsonValue> {
        self.request(workspace_id, params.into()).await
    }

    async fn archive_thread(
        &self,
        workspace_id: &str,
        params: ThreadArchiveParams,
    ) -> Result<JsonValue> {
        self.request(workspace_id, params.into()).await
    }

    async fn start_turn(
        &self,
        workspace_id: &str,
        params: TurnStartParams,
    ) -> Result<JsonValue> {
        self.request(workspace_id, params.into()).await
    }

    async fn interrupt_turn(
        &self,
        workspace_id: &str,
        params: TurnInterruptParams,
    ) -> Result<JsonValue> {
        self.request(workspace_id, params.into()).await
    }

    async fn start_review(
        &self,
        workspace_id: &str,
        params: ReviewStartParams,
    ) -> Result<JsonValue> {
        self.request(workspace_id, params.into()).await
    }

    async fn account_rate_limits(&self, workspace_id: &str) -> Result<JsonValue> {
        self.request(workspace_id, ClientRequestPayload::GetAccountRateLimits(None))
            .await
    }
}
