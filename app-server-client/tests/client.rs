use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use codex_monitor_client::ActivityStore;
use codex_monitor_client::AppServerBackend;
use codex_monitor_client::ApprovalDecision;
use codex_monitor_client::BackendError;
use codex_monitor_client::MonitorClient;
use codex_monitor_client::MonitorConfig;
use codex_monitor_client::SESSION_STOPPED_MESSAGE;
use codex_monitor_client::SendOutcome;
use codex_monitor_client::WorkspaceInfo;
use codex_monitor_protocol::ClientRequestPayload;
use codex_monitor_protocol::JSONRPCNotification;
use codex_monitor_protocol::JSONRPCRequest;
use codex_monitor_protocol::RequestId;
use codex_monitor_thread_state::ConversationItem;
use codex_monitor_thread_state::MessageRole;
use codex_monitor_thread_state::ReviewState;
use codex_monitor_thread_state::ThreadAction;
use codex_monitor_thread_state::WorkspaceEvent;
use codex_monitor_thread_state::WorkspaceMessage;
use pretty_assertions::assert_eq;
use serde_json::Value as JsonValue;
use serde_json::json;
use tempfile::TempDir;

const WORKSPACE: &str = "ws";

#[derive(Debug, Clone, PartialEq)]
struct RecordedRequest {
    workspace_id: String,
    method: &'static str,
    params: JsonValue,
}

/// Backend that records every request and replays scripted results per
/// method. Unscripted requests fail with an RPC error.
#[derive(Default)]
struct ScriptedBackend {
    scripts: Mutex<HashMap<&'static str, VecDeque<Result<JsonValue, BackendError>>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    server_responses: Mutex<Vec<(RequestId, JsonValue)>>,
    reject_server_responses: AtomicBool,
}

impl ScriptedBackend {
    fn respond(&self, method: &'static str, result: JsonValue) {
        self.script(method, Ok(result));
    }

    fn fail(&self, method: &'static str, err: BackendError) {
        self.script(method, Err(err));
    }

    fn script(&self, method: &'static str, result: Result<JsonValue, BackendError>) {
        self.scripts
            .lock()
            .unwrap_or_else(|err| panic!("mutex poisoned: {err}"))
            .entry(method)
            .or_default()
            .push_back(result);
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|err| panic!("mutex poisoned: {err}"))
            .clone()
    }

    fn methods(&self) -> Vec<&'static str> {
        self.requests()
            .into_iter()
            .map(|request| request.method)
            .collect()
    }

    fn last_params(&self, method: &str) -> JsonValue {
        self.requests()
            .into_iter()
            .rev()
            .find(|request| request.method == method)
            .map(|request| request.params)
            .unwrap_or_else(|| panic!("no {method} request recorded"))
    }

    fn server_responses(&self) -> Vec<(RequestId, JsonValue)> {
        self.server_responses
            .lock()
            .unwrap_or_else(|err| panic!("mutex poisoned: {err}"))
            .clone()
    }
}

#[async_trait]
impl AppServerBackend for ScriptedBackend {
    async fn request(
        &self,
        workspace_id: &str,
        request: ClientRequestPayload,
    ) -> codex_monitor_client::Result<JsonValue> {
        let method = request.method();
        let params = request.to_params()?;
        self.requests
            .lock()
            .unwrap_or_else(|err| panic!("mutex poisoned: {err}"))
            .push(RecordedRequest {
                workspace_id: workspace_id.to_string(),
                method,
                params,
            });
        let scripted = self
            .scripts
            .lock()
            .unwrap_or_else(|err| panic!("mutex poisoned: {err}"))
            .get_mut(method)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| {
            Err(BackendError::Rpc {
                code: -32601,
                message: format!("unscripted {method}"),
            })
        })
    }

    async fn respond_to_server_request(
        &self,
        _workspace_id: &str,
        request_id: RequestId,
        result: JsonValue,
    ) -> codex_monitor_client::Result<()> {
        if self.reject_server_responses.load(Ordering::SeqCst) {
            return Err(BackendError::ConnectionClosed);
        }
        self.server_responses
            .lock()
            .unwrap_or_else(|err| panic!("mutex poisoned: {err}"))
            .push((request_id, result));
        Ok(())
    }
}

fn client_with(backend: &Arc<ScriptedBackend>, config: MonitorConfig) -> MonitorClient {
    let client = MonitorClient::new(backend.clone(), config, ActivityStore::in_memory(), None);
    client.connect_workspace(WorkspaceInfo::new(WORKSPACE, "/repo"));
    client
}

fn client(backend: &Arc<ScriptedBackend>) -> MonitorClient {
    client_with(backend, MonitorConfig::default())
}

fn notification(method: &str, params: JsonValue) -> WorkspaceEvent {
    WorkspaceEvent {
        workspace_id: WORKSPACE.to_string(),
        message: WorkspaceMessage::Notification(JSONRPCNotification {
            method: method.to_string(),
            params: Some(params),
        }),
    }
}

fn complete_turn(client: &MonitorClient, thread_id: &str, turn_id: &str) {
    client.handle_event(&notification(
        "turn/completed",
        json!({"threadId": thread_id, "turn": {"id": turn_id, "status": "completed"}}),
    ));
}

/// Start `t1` and a first turn `turn-1` on it.
async fn busy_thread(client: &MonitorClient, backend: &ScriptedBackend) {
    backend.respond("thread/start", json!({"thread": {"id": "t1", "cwd": "/repo"}}));
    backend.respond("turn/start", json!({"turn": {"id": "turn-1"}}));
    assert_eq!(
        client.send_user_message(WORKSPACE, "first").await,
        SendOutcome::Sent {
            turn_id: "turn-1".to_string()
        }
    );
}

fn messages(client: &MonitorClient, thread_id: &str) -> Vec<(MessageRole, String)> {
    client
        .snapshot()
        .items(thread_id)
        .iter()
        .filter_map(|item| match item {
            ConversationItem::Message { role, text, .. } => Some((*role, text.clone())),
            _ => None,
        })
        .collect()
}

fn user_texts(client: &MonitorClient, thread_id: &str) -> Vec<String> {
    messages(client, thread_id)
        .into_iter()
        .filter(|(role, _)| *role == MessageRole::User)
        .map(|(_, text)| text)
        .collect()
}

#[tokio::test]
async fn first_send_starts_a_thread_then_a_turn() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client(&backend);
    backend.respond("thread/start", json!({"thread": {"id": "t1", "cwd": "/repo"}}));
    backend.respond("turn/start", json!({"turn": {"id": "turn-1"}}));

    let outcome = client
        .send_user_message(WORKSPACE, "  Hello there  ")
        .await;

    assert_eq!(
        outcome,
        SendOutcome::Sent {
            turn_id: "turn-1".to_string()
        }
    );
    assert_eq!(backend.methods(), vec!["thread/start", "turn/start"]);
    let params = backend.last_params("turn/start");
    assert_eq!(params["threadId"], json!("t1"));
    assert_eq!(params["input"], json!([{"type": "text", "text": "Hello there"}]));
    assert_eq!(params["cwd"], json!("/repo"));
    assert_eq!(params["approvalPolicy"], json!("on-request"));
    assert_eq!(
        params["sandboxPolicy"],
        json!({"type": "workspaceWrite", "writableRoots": ["/repo"], "networkAccess": true})
    );
    assert_eq!(backend.last_params("thread/start")["cwd"], json!("/repo"));

    let state = client.snapshot();
    assert_eq!(state.active_thread(WORKSPACE), Some("t1"));
    assert_eq!(state.active_turn("t1"), Some("turn-1"));
    assert!(state.status("t1").is_processing);
    assert_eq!(state.threads(WORKSPACE)[0].name, "Hello there");
    assert_eq!(user_texts(&client, "t1"), vec!["Hello there".to_string()]);
    assert!(client.is_thread_loaded("t1"));
}

#[tokio::test]
async fn blank_text_and_unknown_workspaces_are_ignored() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client(&backend);

    assert_eq!(
        client.send_user_message(WORKSPACE, "   \n").await,
        SendOutcome::Ignored
    );
    assert_eq!(
        client.send_user_message("missing", "hello").await,
        SendOutcome::Ignored
    );
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn failed_turn_start_rolls_back_and_reports_inline() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client(&backend);
    backend.respond("thread/start", json!({"thread": {"id": "t1"}}));
    backend.respond("turn/start", json!({"error": {"message": "model not found"}}));
    backend.fail("turn/start", BackendError::ConnectionClosed);
    backend.respond("turn/start", json!({}));

    for text in ["one", "two", "three"] {
        assert_eq!(
            client.send_user_message(WORKSPACE, text).await,
            SendOutcome::Failed
        );
    }

    let state = client.snapshot();
    assert!(state.status("t1").is_idle());
    assert_eq!(state.active_turn("t1"), None);
    assert_eq!(
        messages(&client, "t1"),
        vec![
            (MessageRole::User, "one".to_string()),
            (
                MessageRole::Assistant,
                "Failed to start turn: model not found".to_string()
            ),
            (MessageRole::User, "two".to_string()),
            (
                MessageRole::Assistant,
                "Failed to start turn: app-server connection closed".to_string()
            ),
            (MessageRole::User, "three".to_string()),
            (
                MessageRole::Assistant,
                "Failed to start turn: missing turn id in response".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn busy_thread_queues_and_flushes_in_order() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client(&backend);
    busy_thread(&client, &backend).await;

    assert_eq!(
        client.send_user_message(WORKSPACE, "second").await,
        SendOutcome::Queued
    );
    assert_eq!(
        client.send_user_message(WORKSPACE, "third").await,
        SendOutcome::Queued
    );
    client.flush_queued_messages(WORKSPACE).await;
    assert_eq!(backend.methods(), vec!["thread/start", "turn/start"]);

    complete_turn(&client, "t1", "turn-1");
    backend.respond("turn/start", json!({"turn": {"id": "turn-2"}}));
    client.flush_queued_messages(WORKSPACE).await;

    assert_eq!(
        backend.last_params("turn/start")["input"],
        json!([{"type": "text", "text": "second"}])
    );
    let queued: Vec<String> = client
        .queue()
        .queued("t1")
        .into_iter()
        .map(|message| message.text)
        .collect();
    assert_eq!(queued, vec!["third".to_string()]);
    assert_eq!(client.snapshot().active_turn("t1"), Some("turn-2"));
}

#[tokio::test]
async fn failing_flush_requeues_and_pauses_after_the_retry_limit() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client_with(
        &backend,
        MonitorConfig {
            queue_flush_retry_limit: 2,
            ..MonitorConfig::default()
        },
    );
    busy_thread(&client, &backend).await;
    assert_eq!(
        client.send_user_message(WORKSPACE, "second").await,
        SendOutcome::Queued
    );
    complete_turn(&client, "t1", "turn-1");

    backend.fail("turn/start", BackendError::ConnectionClosed);
    client.flush_queued_messages(WORKSPACE).await;
    assert_eq!(client.queue().queued("t1").len(), 1);
    assert!(!client.queue().is_flushing("t1"));
    assert!(!client.queue().is_paused("t1"));

    backend.fail("turn/start", BackendError::ConnectionClosed);
    client.flush_queued_messages(WORKSPACE).await;
    assert!(client.queue().is_paused("t1"));

    let sent_before = backend.requests().len();
    client.flush_queued_messages(WORKSPACE).await;
    assert_eq!(backend.requests().len(), sent_before);
    // Retries reuse the queued id, so the bubble is not duplicated.
    assert_eq!(
        user_texts(&client, "t1"),
        vec!["first".to_string(), "second".to_string()]
    );

    backend.respond("turn/start", json!({"turn": {"id": "turn-2"}}));
    assert_eq!(
        client.send_user_message(WORKSPACE, "third").await,
        SendOutcome::Queued
    );
    assert!(!client.queue().is_paused("t1"));
    assert_eq!(
        backend.last_params("turn/start")["input"],
        json!([{"type": "text", "text": "second"}])
    );
    assert_eq!(client.queue().queued("t1").len(), 1);
}

#[tokio::test]
async fn interrupt_stops_locally_even_when_the_server_fails() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client(&backend);
    busy_thread(&client, &backend).await;

    client.interrupt_turn(WORKSPACE, "t1").await;

    assert_eq!(
        backend.last_params("turn/interrupt"),
        json!({"threadId": "t1", "turnId": "turn-1"})
    );
    let state = client.snapshot();
    assert!(state.status("t1").is_idle());
    assert_eq!(state.active_turn("t1"), None);
    assert_eq!(
        messages(&client, "t1").last(),
        Some(&(MessageRole::Assistant, SESSION_STOPPED_MESSAGE.to_string()))
    );
}

#[tokio::test]
async fn interrupt_without_an_active_turn_changes_nothing() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client(&backend);
    client.store().dispatch_all([
        ThreadAction::EnsureThread {
            workspace_id: WORKSPACE.to_string(),
            thread_id: "t1".to_string(),
        },
        ThreadAction::SetActiveThreadId {
            workspace_id: WORKSPACE.to_string(),
            thread_id: Some("t1".to_string()),
        },
    ]);
    let before = client.snapshot();

    client.interrupt_turn(WORKSPACE, "t1").await;

    let after = client.snapshot();
    assert!(after.items("t1").is_empty());
    assert_eq!(after.status("t1"), before.status("t1"));
    assert_eq!(after.active_turn("t1"), None);
    assert!(!backend.methods().contains(&"turn/interrupt"));
}

#[tokio::test]
async fn review_start_marks_reviewing_and_rolls_back_on_error() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client(&backend);
    backend.respond("thread/start", json!({"thread": {"id": "t1"}}));
    backend.respond(
        "review/start",
        json!({"turn": {"id": "rev-1"}, "reviewThreadId": "t1"}),
    );

    assert_eq!(
        client.start_review(WORKSPACE, "/review base main").await,
        SendOutcome::Sent {
            turn_id: "rev-1".to_string()
        }
    );
    assert_eq!(
        backend.last_params("review/start"),
        json!({
            "threadId": "t1",
            "target": {"type": "baseBranch", "branch": "main"},
            "delivery": "inline",
        })
    );
    let state = client.snapshot();
    assert!(state.status("t1").is_reviewing);
    assert!(state.status("t1").is_processing);
    assert!(state.items("t1").iter().any(|item| matches!(
        item,
        ConversationItem::Review { state: ReviewState::Started, text, .. }
            if text == "Reviewing changes against main"
    )));

    complete_turn(&client, "t1", "rev-1");
    client.handle_event(&notification(
        "item/completed",
        json!({
            "threadId": "t1",
            "turnId": "rev-1",
            "item": {"type": "exitedReviewMode", "id": "x1", "review": "Looks good"},
        }),
    ));
    assert!(client.snapshot().status("t1").is_idle());

    backend.fail("review/start", BackendError::ConnectionClosed);
    assert_eq!(
        client.start_review(WORKSPACE, "/review").await,
        SendOutcome::Failed
    );
    let state = client.snapshot();
    assert!(state.status("t1").is_idle());
    assert_eq!(
        messages(&client, "t1").last(),
        Some(&(
            MessageRole::Assistant,
            "Failed to start review: app-server connection closed".to_string()
        ))
    );
}

#[tokio::test]
async fn resume_merges_history_once_unless_forced() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client(&backend);
    client.store().dispatch(ThreadAction::AddUserMessage {
        workspace_id: WORKSPACE.to_string(),
        thread_id: "t9".to_string(),
        item_id: "local-1".to_string(),
        text: "hi".to_string(),
        timestamp_ms: 1,
    });
    let resumed = json!({
        "thread": {
            "id": "t9",
            "preview": "hi",
            "updatedAt": 1_700,
            "cwd": "/repo",
            "name": "Greeting",
            "turns": [{
                "id": "turn-a",
                "status": "completed",
                "items": [
                    {"type": "userMessage", "id": "u1", "content": [{"type": "text", "text": "hi"}]},
                    {"type": "agentMessage", "id": "a1", "text": "Hello!"},
                    {"type": "enteredReviewMode", "id": "r1", "review": "current changes"},
                ],
            }],
        }
    });
    backend.respond("thread/resume", resumed.clone());

    assert!(client.resume_thread(WORKSPACE, "t9", false).await);
    assert!(client.resume_thread(WORKSPACE, "t9", false).await);
    assert_eq!(backend.methods(), vec!["thread/resume"]);

    let state = client.snapshot();
    assert_eq!(
        state
            .items("t9")
            .iter()
            .map(ConversationItem::id)
            .collect::<Vec<_>>(),
        vec!["u1", "a1", "r1"]
    );
    assert!(state.status("t9").is_reviewing);
    assert_eq!(
        state
            .last_agent_message("t9")
            .map(|message| (message.text.as_str(), message.timestamp_ms)),
        Some(("Hello!", 1_700_000))
    );
    assert_eq!(
        state.thread(WORKSPACE, "t9").map(|summary| summary.name.as_str()),
        Some("Greeting")
    );

    backend.respond("thread/resume", resumed);
    assert!(client.resume_thread(WORKSPACE, "t9", true).await);
    assert_eq!(backend.methods(), vec!["thread/resume", "thread/resume"]);
}

#[tokio::test]
async fn failed_resume_can_be_retried() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client(&backend);

    assert!(!client.resume_thread(WORKSPACE, "t9", false).await);
    assert!(!client.is_thread_loaded("t9"));

    backend.respond("thread/resume", json!({"thread": {"id": "t9", "turns": []}}));
    assert!(client.resume_thread(WORKSPACE, "t9", false).await);
    assert!(client.is_thread_loaded("t9"));
}

#[tokio::test]
async fn listing_filters_by_workspace_dedupes_and_ranks_by_recency() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client(&backend);
    client.store().dispatch(ThreadAction::AddUserMessage {
        workspace_id: WORKSPACE.to_string(),
        thread_id: "t1".to_string(),
        item_id: "u1".to_string(),
        text: "Recently touched".to_string(),
        timestamp_ms: 500_000,
    });
    backend.respond(
        "thread/list",
        json!({
            "data": [
                {"id": "t1", "cwd": "/repo", "createdAt": 100},
                {"id": "t2", "cwd": "/elsewhere", "createdAt": 900},
                {"id": "t3", "cwd": "/repo/", "updatedAt": 300, "name": "Named"},
            ],
            "nextCursor": "c2",
        }),
    );
    backend.respond(
        "thread/list",
        json!({
            "data": [
                {"id": "t1", "cwd": "/repo", "createdAt": 100},
                {"id": "t4", "cwd": "/repo", "createdAt": 200, "preview": "Fix the flaky test"},
            ],
            "nextCursor": null,
        }),
    );

    let summaries = client.list_threads_for_workspace(WORKSPACE).await;

    assert_eq!(
        summaries
            .iter()
            .map(|summary| (summary.id.as_str(), summary.name.as_str(), summary.updated_at_ms))
            .collect::<Vec<_>>(),
        vec![
            ("t1", "Recently touched", 500_000),
            ("t3", "Named", 300_000),
            ("t4", "Fix the flaky test", 200_000),
        ]
    );
    assert_eq!(backend.last_params("thread/list"), json!({"cursor": "c2", "limit": 50}));
    assert_eq!(client.snapshot().threads(WORKSPACE).to_vec(), summaries);
    assert_eq!(
        client
            .snapshot()
            .last_agent_message("t4")
            .map(|message| message.text.clone()),
        Some("Fix the flaky test".to_string())
    );
}

#[tokio::test]
async fn listing_failure_keeps_known_threads() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client(&backend);
    client.store().dispatch(ThreadAction::EnsureThread {
        workspace_id: WORKSPACE.to_string(),
        thread_id: "t1".to_string(),
    });

    let summaries = client.list_threads_for_workspace(WORKSPACE).await;
    assert_eq!(
        summaries
            .iter()
            .map(|summary| summary.id.as_str())
            .collect::<Vec<_>>(),
        vec!["t1"]
    );
}

#[tokio::test]
async fn archive_forgets_the_thread_only_on_success() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client(&backend);
    busy_thread(&client, &backend).await;

    backend.fail("thread/archive", BackendError::ConnectionClosed);
    assert!(!client.archive_thread(WORKSPACE, "t1").await);
    assert!(client.snapshot().thread(WORKSPACE, "t1").is_some());

    backend.respond("thread/archive", json!({}));
    assert!(client.archive_thread(WORKSPACE, "t1").await);
    let state = client.snapshot();
    assert!(state.threads(WORKSPACE).is_empty());
    assert_eq!(state.active_thread(WORKSPACE), None);
    assert!(state.items("t1").is_empty());
    assert!(!client.is_thread_loaded("t1"));
    assert_eq!(client.store().last_activity(WORKSPACE, "t1"), None);
}

#[tokio::test]
async fn approvals_are_removed_only_after_the_answer_is_sent() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client(&backend);
    client.handle_event(&WorkspaceEvent {
        workspace_id: WORKSPACE.to_string(),
        message: WorkspaceMessage::Request(JSONRPCRequest {
            id: RequestId::Integer(7),
            method: "item/commandExecution/requestApproval".to_string(),
            params: Some(json!({
                "threadId": "t1",
                "turnId": "turn-1",
                "itemId": "c1",
                "command": "cargo test",
            })),
        }),
    });
    assert_eq!(client.snapshot().approvals.len(), 1);

    assert!(
        !client
            .respond_to_approval(WORKSPACE, &RequestId::Integer(99), ApprovalDecision::Accept)
            .await
    );

    backend.reject_server_responses.store(true, Ordering::SeqCst);
    assert!(
        !client
            .respond_to_approval(WORKSPACE, &RequestId::Integer(7), ApprovalDecision::Accept)
            .await
    );
    assert_eq!(client.snapshot().approvals.len(), 1);

    backend.reject_server_responses.store(false, Ordering::SeqCst);
    assert!(
        client
            .respond_to_approval(
                WORKSPACE,
                &RequestId::Integer(7),
                ApprovalDecision::AcceptForSession
            )
            .await
    );
    assert_eq!(
        backend.server_responses(),
        vec![(RequestId::Integer(7), json!({"decision": "acceptForSession"}))]
    );
    assert!(client.snapshot().approvals.is_empty());
}

#[tokio::test]
async fn rate_limits_refresh_overwrites_the_snapshot() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client(&backend);
    backend.respond(
        "account/rateLimits/read",
        json!({"rateLimits": {"primary": {"usedPercent": 42.5, "windowDurationMins": 300}}}),
    );

    assert!(client.refresh_rate_limits(WORKSPACE).await);
    let used = client
        .snapshot()
        .rate_limits_by_workspace
        .get(WORKSPACE)
        .and_then(|snapshot| snapshot.primary.as_ref())
        .map(|window| window.used_percent);
    assert_eq!(used, Some(42.5));

    backend.respond("account/rateLimits/read", json!({}));
    assert!(!client.refresh_rate_limits(WORKSPACE).await);
}

#[tokio::test]
async fn pushed_deltas_stream_into_the_transcript() {
    let backend = Arc::new(ScriptedBackend::default());
    let client = client(&backend);
    let mut updates = client.subscribe();

    for delta in ["Hel", "lo"] {
        client.handle_event(&notification(
            "item/agentMessage/delta",
            json!({"threadId": "t1", "turnId": "turn-1", "itemId": "a1", "delta": delta}),
        ));
    }

    assert!(updates.has_changed().unwrap_or(false));
    assert_eq!(
        messages(&client, "t1"),
        vec![(MessageRole::Assistant, "Hello".to_string())]
    );
    assert!(client.snapshot().status("t1").is_processing);
}

#[tokio::test]
async fn user_activity_is_persisted_across_clients() -> anyhow::Result<()> {
    let home = TempDir::new()?;
    let backend = Arc::new(ScriptedBackend::default());
    let first = MonitorClient::from_config(
        backend.clone(),
        MonitorConfig::default(),
        home.path(),
        None,
    );
    first.store().dispatch(ThreadAction::AddUserMessage {
        workspace_id: WORKSPACE.to_string(),
        thread_id: "t1".to_string(),
        item_id: "u1".to_string(),
        text: "hello".to_string(),
        timestamp_ms: 42,
    });

    let second = MonitorClient::from_config(backend, MonitorConfig::default(), home.path(), None);
    assert_eq!(second.store().last_activity(WORKSPACE, "t1"), Some(42));
    Ok(())
}
