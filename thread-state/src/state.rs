use std::collections::HashMap;
use std::sync::Arc;

use codex_monitor_protocol::RequestId;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::items::ConversationItem;

/// Thread names derived from text are cut to this many characters.
pub const THREAD_NAME_MAX_CHARS: usize = 38;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSummary {
    pub id: String,
    pub name: String,
    pub updated_at_ms: i64,
    /// Still carrying the placeholder `Agent N` name; the first user message
    /// replaces it.
    pub auto_named: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadStatus {
    pub is_processing: bool,
    pub has_unread: bool,
    pub is_reviewing: bool,
}

impl ThreadStatus {
    pub fn is_idle(&self) -> bool {
        !self.is_processing && !self.is_reviewing
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub workspace_id: String,
    pub request_id: RequestId,
    pub method: String,
    pub params: JsonValue,
}

impl ApprovalRequest {
    pub fn thread_id(&self) -> Option<&str> {
        self.params.get("threadId").and_then(JsonValue::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastAgentMessage {
    pub text: String,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanStepStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub step: String,
    pub status: PlanStepStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnPlan {
    pub turn_id: String,
    pub explanation: Option<String>,
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageBreakdown {
    pub total_tokens: i64,
    pub input_tokens: i64,
    pub cached_input_tokens: i64,
    pub output_tokens: i64,
    pub reasoning_output_tokens: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadTokenUsage {
    pub total: TokenUsageBreakdown,
    pub last: TokenUsageBreakdown,
    pub model_context_window: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitWindow {
    pub used_percent: f64,
    pub window_duration_mins: Option<i64>,
    pub resets_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSnapshot {
    pub primary: Option<RateLimitWindow>,
    pub secondary: Option<RateLimitWindow>,
}

/// Everything the monitor knows about its workspaces and threads.
///
/// Per-thread item lists and per-workspace thread lists sit behind `Arc`; the
/// reducer swaps in a fresh `Arc` only for the entries an action touches, so
/// `Arc::ptr_eq` is a valid "unchanged" test for consumers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadsState {
    pub threads_by_workspace: HashMap<String, Arc<Vec<ThreadSummary>>>,
    pub active_thread_by_workspace: HashMap<String, String>,
    pub items_by_thread: HashMap<String, Arc<Vec<ConversationItem>>>,
    /// Bumped on every local change to a thread's items.
    pub item_revision_by_thread: HashMap<String, u64>,
    pub status_by_thread: HashMap<String, ThreadStatus>,
    pub active_turn_by_thread: HashMap<String, String>,
    pub plan_by_thread: HashMap<String, TurnPlan>,
    pub token_usage_by_thread: HashMap<String, ThreadTokenUsage>,
    pub rate_limits_by_workspace: HashMap<String, RateLimitSnapshot>,
    pub last_agent_message_by_thread: HashMap<String, LastAgentMessage>,
    pub approvals: Arc<Vec<ApprovalRequest>>,
}

impl ThreadsState {
    pub fn threads(&self, workspace_id: &str) -> &[ThreadSummary] {
        self.threads_by_workspace
            .get(workspace_id)
            .map(|threads| threads.as_slice())
            .unwrap_or_default()
    }

    pub fn thread(&self, workspace_id: &str, thread_id: &str) -> Option<&ThreadSummary> {
        self.threads(workspace_id)
            .iter()
            .find(|thread| thread.id == thread_id)
    }

    pub fn active_thread(&self, workspace_id: &str) -> Option<&str> {
        self.active_thread_by_workspace
            .get(workspace_id)
            .map(String::as_str)
    }

    pub fn items(&self, thread_id: &str) -> &[ConversationItem] {
        self.items_by_thread
            .get(thread_id)
            .map(|items| items.as_slice())
            .unwrap_or_default()
    }

    pub fn item_revision(&self, thread_id: &str) -> u64 {
        self.item_revision_by_thread
            .get(thread_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn status(&self, thread_id: &str) -> ThreadStatus {
        self.status_by_thread
            .get(thread_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn active_turn(&self, thread_id: &str) -> Option<&str> {
        self.active_turn_by_thread.get(thread_id).map(String::as_str)
    }

    pub fn plan(&self, thread_id: &str) -> Option<&TurnPlan> {
        self.plan_by_thread.get(thread_id)
    }

    pub fn last_agent_message(&self, thread_id: &str) -> Option<&LastAgentMessage> {
        self.last_agent_message_by_thread.get(thread_id)
    }

    pub fn approvals_for_workspace<'a>(
        &'a self,
        workspace_id: &'a str,
    ) -> impl Iterator<Item = &'a ApprovalRequest> + 'a {
        self.approvals
            .iter()
            .filter(move |approval| approval.workspace_id == workspace_id)
    }

    /// Workspace that lists `thread_id`, if any.
    pub fn workspace_for_thread(&self, thread_id: &str) -> Option<&str> {
        self.threads_by_workspace
            .iter()
            .find(|(_, threads)| threads.iter().any(|thread| thread.id == thread_id))
            .map(|(workspace_id, _)| workspace_id.as_str())
    }
}
