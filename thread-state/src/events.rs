use codex_monitor_protocol::JSONRPCNotification;
use codex_monitor_protocol::JSONRPCRequest;
use codex_monitor_protocol::ServerNotification;
use codex_monitor_protocol::ServerRequest;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::items::ConversationItem;
use crate::items::MessageRole;
use crate::items::ReviewState;
use crate::normalize::normalize_item;
use crate::normalize::normalize_rate_limits;
use crate::normalize::normalize_token_usage;
use crate::plan::normalize_plan;
use crate::reducer::ThreadAction;
use crate::state::ApprovalRequest;
use crate::state::ThreadsState;

/// One inbound message from a workspace's app-server connection.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceEvent {
    pub workspace_id: String,
    pub message: WorkspaceMessage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkspaceMessage {
    Notification(JSONRPCNotification),
    Request(JSONRPCRequest),
}

impl WorkspaceEvent {
    pub fn method(&self) -> &str {
        match &self.message {
            WorkspaceMessage::Notification(notification) => &notification.method,
            WorkspaceMessage::Request(request) => &request.method,
        }
    }
}

/// Translate one pushed event into the reducer actions it implies, in the
/// order they must be applied. Unknown or malformed events produce nothing.
pub fn actions_for_event(
    state: &ThreadsState,
    event: &WorkspaceEvent,
    now_ms: i64,
) -> Vec<ThreadAction> {
    let workspace_id = event.workspace_id.as_str();
    match &event.message {
        WorkspaceMessage::Notification(notification) => {
            match ServerNotification::try_from(notification.clone()) {
                Ok(notification) => {
                    actions_for_notification(state, workspace_id, notification, now_ms)
                }
                Err(err) => {
                    debug!(
                        method = notification.method.as_str(),
                        "ignoring notification: {err}"
                    );
                    Vec::new()
                }
            }
        }
        WorkspaceMessage::Request(request) => match ServerRequest::try_from(request.clone()) {
            Ok(server_request) => vec![ThreadAction::AddApproval {
                approval: ApprovalRequest {
                    workspace_id: workspace_id.to_string(),
                    request_id: server_request.id().clone(),
                    method: server_request.method().to_string(),
                    params: request.params.clone().unwrap_or(JsonValue::Null),
                },
            }],
            Err(err) => {
                debug!(
                    method = request.method.as_str(),
                    "ignoring server request: {err}"
                );
                Vec::new()
            }
        },
    }
}

fn actions_for_notification(
    state: &ThreadsState,
    workspace_id: &str,
    notification: ServerNotification,
    now_ms: i64,
) -> Vec<ThreadAction> {
    let ensure = |thread_id: &str| ThreadAction::EnsureThread {
        workspace_id: workspace_id.to_string(),
        thread_id: thread_id.to_string(),
    };
    let processing = |thread_id: &str, is_processing: bool| ThreadAction::MarkProcessing {
        thread_id: thread_id.to_string(),
        is_processing,
    };
    let is_active = |thread_id: &str| state.active_thread(workspace_id) == Some(thread_id);

    match notification {
        ServerNotification::AgentMessageDelta(delta) => vec![
            ensure(&delta.thread_id),
            processing(&delta.thread_id, true),
            ThreadAction::AppendAgentDelta {
                workspace_id: workspace_id.to_string(),
                thread_id: delta.thread_id,
                item_id: delta.item_id,
                delta: delta.delta,
            },
        ],
        ServerNotification::ItemStarted(started) => item_actions(
            state,
            workspace_id,
            &started.thread_id,
            &started.item,
            true,
            now_ms,
        ),
        ServerNotification::ItemCompleted(completed) => item_actions(
            state,
            workspace_id,
            &completed.thread_id,
            &completed.item,
            false,
            now_ms,
        ),
        ServerNotification::ReasoningSummaryTextDelta(delta) => vec![
            ensure(&delta.thread_id),
            ThreadAction::AppendReasoningSummary {
                thread_id: delta.thread_id,
                item_id: delta.item_id,
                delta: delta.delta,
            },
        ],
        ServerNotification::ReasoningSummaryPartAdded(part) => vec![
            ensure(&part.thread_id),
            ThreadAction::AppendReasoningSummaryBoundary {
                thread_id: part.thread_id,
                item_id: part.item_id,
            },
        ],
        ServerNotification::ReasoningTextDelta(delta) => vec![
            ensure(&delta.thread_id),
            ThreadAction::AppendReasoningContent {
                thread_id: delta.thread_id,
                item_id: delta.item_id,
                delta: delta.delta,
            },
        ],
        ServerNotification::CommandExecutionOutputDelta(delta) => vec![
            processing(&delta.thread_id, true),
            ThreadAction::AppendToolOutput {
                thread_id: delta.thread_id,
                item_id: delta.item_id,
                delta: delta.delta,
            },
        ],
        ServerNotification::FileChangeOutputDelta(delta) => vec![
            processing(&delta.thread_id, true),
            ThreadAction::AppendToolOutput {
                thread_id: delta.thread_id,
                item_id: delta.item_id,
                delta: delta.delta,
            },
        ],
        ServerNotification::TurnStarted(started) => vec![
            ensure(&started.thread_id),
            processing(&started.thread_id, true),
            ThreadAction::ClearThreadPlan {
                thread_id: started.thread_id.clone(),
            },
            ThreadAction::SetActiveTurnId {
                thread_id: started.thread_id,
                turn_id: Some(started.turn.id),
            },
        ],
        ServerNotification::TurnCompleted(completed) => vec![
            processing(&completed.thread_id, false),
            ThreadAction::SetActiveTurnId {
                thread_id: completed.thread_id,
                turn_id: None,
            },
        ],
        ServerNotification::TurnPlanUpdated(update) => vec![ThreadAction::SetThreadPlan {
            plan: normalize_plan(&update.turn_id, &update.explanation, &update.plan),
            thread_id: update.thread_id,
        }],
        ServerNotification::TurnDiffUpdated(update) => {
            if update.diff.trim().is_empty() {
                return Vec::new();
            }
            vec![ThreadAction::UpsertItem {
                workspace_id: workspace_id.to_string(),
                item: ConversationItem::Diff {
                    id: format!("diff-{}", update.turn_id),
                    title: "Turn diff".to_string(),
                    diff: update.diff,
                    status: None,
                },
                thread_id: update.thread_id,
            }]
        }
        ServerNotification::Error(error) => {
            if error.will_retry {
                return Vec::new();
            }
            let thread_id = error.thread_id;
            let mut actions = vec![
                ensure(&thread_id),
                processing(&thread_id, false),
                ThreadAction::MarkReviewing {
                    thread_id: thread_id.clone(),
                    is_reviewing: false,
                },
                ThreadAction::SetActiveTurnId {
                    thread_id: thread_id.clone(),
                    turn_id: None,
                },
                ThreadAction::UpsertItem {
                    workspace_id: workspace_id.to_string(),
                    thread_id: thread_id.clone(),
                    item: ConversationItem::assistant_message(
                        format!("error-{}-{now_ms}", error.turn_id),
                        format!("Turn failed: {}", error.error.message),
                    ),
                },
            ];
            if !is_active(&thread_id) {
                actions.push(ThreadAction::MarkUnread {
                    thread_id,
                    has_unread: true,
                });
            }
            actions
        }
        ServerNotification::ThreadTokenUsageUpdated(update) => {
            match normalize_token_usage(&update.token_usage) {
                Some(usage) => vec![ThreadAction::SetThreadTokenUsage {
                    thread_id: update.thread_id,
                    usage,
                }],
                None => {
                    debug!("ignoring unreadable token usage payload");
                    Vec::new()
                }
            }
        }
        ServerNotification::AccountRateLimitsUpdated(update) => {
            match normalize_rate_limits(&update.rate_limits) {
                Some(rate_limits) => vec![ThreadAction::SetRateLimits {
                    workspace_id: workspace_id.to_string(),
                    rate_limits,
                }],
                None => {
                    debug!("ignoring unreadable rate limit payload");
                    Vec::new()
                }
            }
        }
        ServerNotification::ThreadStarted(started) => {
            let mut actions = vec![ensure(&started.thread.id)];
            if let Some(name) = started.thread.name.filter(|name| !name.trim().is_empty()) {
                actions.push(ThreadAction::RenameThread {
                    workspace_id: workspace_id.to_string(),
                    thread_id: started.thread.id,
                    name,
                });
            }
            actions
        }
        ServerNotification::ThreadNameUpdated(update) => match update.thread_name {
            Some(name) if !name.trim().is_empty() => vec![ThreadAction::RenameThread {
                workspace_id: workspace_id.to_string(),
                thread_id: update.thread_id,
                name,
            }],
            _ => Vec::new(),
        },
    }
}

fn item_actions(
    state: &ThreadsState,
    workspace_id: &str,
    thread_id: &str,
    raw_item: &JsonValue,
    started: bool,
    now_ms: i64,
) -> Vec<ThreadAction> {
    let mut actions = vec![ThreadAction::EnsureThread {
        workspace_id: workspace_id.to_string(),
        thread_id: thread_id.to_string(),
    }];
    let item = normalize_item(raw_item);

    if !started
        && let Some(ConversationItem::Message {
            id,
            role: MessageRole::Assistant,
            text,
        }) = &item
    {
        actions.push(ThreadAction::CompleteAgentMessage {
            workspace_id: workspace_id.to_string(),
            thread_id: thread_id.to_string(),
            item_id: id.clone(),
            text: text.clone(),
        });
        let last_text = if text.trim().is_empty() {
            streamed_text(state, thread_id, id)
        } else {
            Some(text.clone())
        };
        if let Some(text) = last_text {
            actions.push(ThreadAction::SetLastAgentMessage {
                thread_id: thread_id.to_string(),
                text,
                timestamp_ms: now_ms,
            });
        }
        actions.push(ThreadAction::MarkProcessing {
            thread_id: thread_id.to_string(),
            is_processing: false,
        });
        if state.active_thread(workspace_id) != Some(thread_id) {
            actions.push(ThreadAction::MarkUnread {
                thread_id: thread_id.to_string(),
                has_unread: true,
            });
        }
        return actions;
    }

    if started {
        actions.push(ThreadAction::MarkProcessing {
            thread_id: thread_id.to_string(),
            is_processing: true,
        });
    }

    let Some(item) = item else {
        return actions;
    };

    // The optimistic local copy already shows the user's text.
    if let ConversationItem::Message {
        role: MessageRole::User,
        ..
    } = item
    {
        return actions;
    }

    let review_state = match &item {
        ConversationItem::Review { state, .. } => Some(*state),
        _ => None,
    };
    actions.push(ThreadAction::UpsertItem {
        workspace_id: workspace_id.to_string(),
        thread_id: thread_id.to_string(),
        item,
    });
    match review_state {
        Some(ReviewState::Started) => actions.push(ThreadAction::MarkReviewing {
            thread_id: thread_id.to_string(),
            is_reviewing: true,
        }),
        Some(ReviewState::Completed) => {
            actions.push(ThreadAction::MarkReviewing {
                thread_id: thread_id.to_string(),
                is_reviewing: false,
            });
            actions.push(ThreadAction::MarkProcessing {
                thread_id: thread_id.to_string(),
                is_processing: false,
            });
        }
        None => {}
    }
    actions
}

fn streamed_text(state: &ThreadsState, thread_id: &str, item_id: &str) -> Option<String> {
    state
        .items(thread_id)
        .iter()
        .find_map(|item| match item {
            ConversationItem::Message {
                id,
                role: MessageRole::Assistant,
                text,
            } if id == item_id && !text.trim().is_empty() => Some(text.clone()),
            _ => None,
        })
}

/// Convenience for callers that only carry the parsed protocol type.
pub fn notification_event(
    workspace_id: impl Into<String>,
    notification: ServerNotification,
) -> Result<WorkspaceEvent, serde_json::Error> {
    let method = notification.to_string();
    let params = notification.to_params()?;
    Ok(WorkspaceEvent {
        workspace_id: workspace_id.into(),
        message: WorkspaceMessage::Notification(JSONRPCNotification {
            method,
            params: Some(params),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduce_all;
    use crate::state::PlanStep;
    use crate::state::PlanStepStatus;
    use crate::state::TurnPlan;
    use codex_monitor_protocol::RequestId;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn notification(method: &str, params: JsonValue) -> WorkspaceEvent {
        WorkspaceEvent {
            workspace_id: "w1".to_string(),
            message: WorkspaceMessage::Notification(JSONRPCNotification {
                method: method.to_string(),
                params: Some(params),
            }),
        }
    }

    fn apply(state: ThreadsState, events: &[WorkspaceEvent]) -> ThreadsState {
        events.iter().fold(state, |state, event| {
            let actions = actions_for_event(&state, event, 1_000);
            reduce_all(state, actions)
        })
    }

    #[test]
    fn agent_delta_ensures_thread_and_marks_processing() {
        let event = notification(
            "item/agentMessage/delta",
            json!({"threadId": "t1", "turnId": "turn-1", "itemId": "m1", "delta": "Hel"}),
        );
        assert_eq!(
            actions_for_event(&ThreadsState::default(), &event, 0),
            vec![
                ThreadAction::EnsureThread {
                    workspace_id: "w1".to_string(),
                    thread_id: "t1".to_string(),
                },
                ThreadAction::MarkProcessing {
                    thread_id: "t1".to_string(),
                    is_processing: true,
                },
                ThreadAction::AppendAgentDelta {
                    workspace_id: "w1".to_string(),
                    thread_id: "t1".to_string(),
                    item_id: "m1".to_string(),
                    delta: "Hel".to_string(),
                },
            ]
        );
    }

    #[test]
    fn completed_agent_message_on_background_thread_marks_unread() {
        let state = apply(
            ThreadsState::default(),
            &[
                notification(
                    "item/agentMessage/delta",
                    json!({"threadId": "t1", "itemId": "m1", "delta": "Hel"}),
                ),
                notification(
                    "item/completed",
                    json!({
                        "threadId": "t1",
                        "turnId": "turn-1",
                        "item": {"type": "agentMessage", "id": "m1", "text": "Hello there"},
                    }),
                ),
            ],
        );
        assert_eq!(
            state.items("t1"),
            &[ConversationItem::assistant_message("m1", "Hello there")]
        );
        let status = state.status("t1");
        assert!(!status.is_processing);
        assert!(status.has_unread);
        assert_eq!(
            state.last_agent_message("t1").map(|message| message.text.as_str()),
            Some("Hello there")
        );
    }

    #[test]
    fn completed_agent_message_on_active_thread_stays_read() {
        let state = reduce_all(
            ThreadsState::default(),
            [
                ThreadAction::EnsureThread {
                    workspace_id: "w1".to_string(),
                    thread_id: "t1".to_string(),
                },
                ThreadAction::SetActiveThreadId {
                    workspace_id: "w1".to_string(),
                    thread_id: Some("t1".to_string()),
                },
            ],
        );
        let state = apply(
            state,
            &[notification(
                "item/completed",
                json!({"threadId": "t1", "item": {"type": "agentMessage", "id": "m1", "text": "Done"}}),
            )],
        );
        assert!(!state.status("t1").has_unread);
    }

    #[test]
    fn tool_lifecycle_streams_output_onto_started_item() {
        let state = apply(
            ThreadsState::default(),
            &[
                notification(
                    "item/started",
                    json!({
                        "threadId": "t1",
                        "item": {"type": "commandExecution", "id": "cmd-1", "command": "ls", "status": "inProgress"},
                    }),
                ),
                notification(
                    "item/commandExecution/outputDelta",
                    json!({"threadId": "t1", "itemId": "cmd-1", "delta": "a.txt\n"}),
                ),
                notification(
                    "item/completed",
                    json!({
                        "threadId": "t1",
                        "item": {"type": "commandExecution", "id": "cmd-1", "command": "ls", "status": "completed"},
                    }),
                ),
            ],
        );
        let ConversationItem::Tool { output, status, .. } = &state.items("t1")[0] else {
            panic!("expected tool item");
        };
        assert_eq!(output, "a.txt\n");
        assert_eq!(status.as_deref(), Some("completed"));
        assert!(state.status("t1").is_processing);
    }

    #[test]
    fn output_delta_before_start_is_dropped_but_marks_processing() {
        let state = apply(
            ThreadsState::default(),
            &[notification(
                "item/fileChange/outputDelta",
                json!({"threadId": "t1", "itemId": "fc-1", "delta": "patched"}),
            )],
        );
        assert!(state.items("t1").is_empty());
        assert!(state.status("t1").is_processing);
    }

    #[test]
    fn review_mode_items_toggle_reviewing() {
        let entered = apply(
            ThreadsState::default(),
            &[notification(
                "item/started",
                json!({"threadId": "t1", "item": {"type": "enteredReviewMode", "id": "rv-1", "review": "changes"}}),
            )],
        );
        assert!(entered.status("t1").is_reviewing);
        assert!(entered.status("t1").is_processing);

        let exited = apply(
            entered,
            &[notification(
                "item/completed",
                json!({"threadId": "t1", "item": {"type": "exitedReviewMode", "id": "rv-2", "review": "All good"}}),
            )],
        );
        let status = exited.status("t1");
        assert!(!status.is_reviewing);
        assert!(!status.is_processing);
    }

    #[test]
    fn turn_lifecycle_tracks_active_turn_and_clears_plan() {
        let state = reduce_all(
            ThreadsState::default(),
            [ThreadAction::SetThreadPlan {
                thread_id: "t1".to_string(),
                plan: Some(TurnPlan {
                    turn_id: "old".to_string(),
                    explanation: Some("old plan".to_string()),
                    steps: Vec::new(),
                }),
            }],
        );
        let started = apply(
            state,
            &[notification(
                "turn/started",
                json!({"threadId": "t1", "turn": {"id": "turn-2", "items": [], "status": "inProgress"}}),
            )],
        );
        assert_eq!(started.active_turn("t1"), Some("turn-2"));
        assert_eq!(started.plan("t1"), None);
        assert!(started.status("t1").is_processing);

        let completed = apply(
            started,
            &[notification(
                "turn/completed",
                json!({"threadId": "t1", "turn": {"id": "turn-2", "items": [], "status": "completed"}}),
            )],
        );
        assert_eq!(completed.active_turn("t1"), None);
        assert!(!completed.status("t1").is_processing);
    }

    #[test]
    fn plan_updates_are_normalized() {
        let state = apply(
            ThreadsState::default(),
            &[notification(
                "turn/plan/updated",
                json!({
                    "threadId": "t1",
                    "turnId": "turn-1",
                    "explanation": null,
                    "plan": [
                        {"step": "Write tests", "status": "in_progress"},
                        {"step": "", "status": "done"},
                    ],
                }),
            )],
        );
        assert_eq!(
            state.plan("t1"),
            Some(&TurnPlan {
                turn_id: "turn-1".to_string(),
                explanation: None,
                steps: vec![PlanStep {
                    step: "Write tests".to_string(),
                    status: PlanStepStatus::InProgress,
                }],
            })
        );
    }

    #[test]
    fn retryable_error_is_ignored() {
        let event = notification(
            "error",
            json!({"error": {"message": "reconnecting"}, "willRetry": true, "threadId": "t1", "turnId": "turn-1"}),
        );
        assert_eq!(actions_for_event(&ThreadsState::default(), &event, 0), Vec::new());
    }

    #[test]
    fn terminal_error_stops_the_turn_and_reports_inline() {
        let state = reduce_all(
            ThreadsState::default(),
            [
                ThreadAction::MarkProcessing {
                    thread_id: "t1".to_string(),
                    is_processing: true,
                },
                ThreadAction::MarkReviewing {
                    thread_id: "t1".to_string(),
                    is_reviewing: true,
                },
                ThreadAction::SetActiveTurnId {
                    thread_id: "t1".to_string(),
                    turn_id: Some("turn-1".to_string()),
                },
            ],
        );
        let state = apply(
            state,
            &[notification(
                "error",
                json!({"error": {"message": "model overloaded"}, "willRetry": false, "threadId": "t1", "turnId": "turn-1"}),
            )],
        );
        let status = state.status("t1");
        assert!(!status.is_processing);
        assert!(!status.is_reviewing);
        assert!(status.has_unread);
        assert_eq!(state.active_turn("t1"), None);
        assert_eq!(
            state.items("t1"),
            &[ConversationItem::assistant_message(
                "error-turn-1-1000",
                "Turn failed: model overloaded"
            )]
        );
    }

    #[test]
    fn approval_requests_are_queued_with_raw_params() {
        let event = WorkspaceEvent {
            workspace_id: "w1".to_string(),
            message: WorkspaceMessage::Request(JSONRPCRequest {
                id: RequestId::Integer(11),
                method: "item/fileChange/requestApproval".to_string(),
                params: Some(json!({"threadId": "t1", "turnId": "turn-1", "itemId": "fc-1"})),
            }),
        };
        let state = apply(ThreadsState::default(), &[event]);
        assert_eq!(
            state.approvals.as_slice(),
            &[ApprovalRequest {
                workspace_id: "w1".to_string(),
                request_id: RequestId::Integer(11),
                method: "item/fileChange/requestApproval".to_string(),
                params: json!({"threadId": "t1", "turnId": "turn-1", "itemId": "fc-1"}),
            }]
        );
        assert_eq!(state.approvals[0].thread_id(), Some("t1"));
    }

    #[test]
    fn unknown_methods_and_item_types_are_dropped() {
        let state = ThreadsState::default();
        assert_eq!(
            actions_for_event(&state, &notification("codex/event/foo", json!({})), 0),
            Vec::new()
        );
        let unknown_request = WorkspaceEvent {
            workspace_id: "w1".to_string(),
            message: WorkspaceMessage::Request(JSONRPCRequest {
                id: RequestId::Integer(1),
                method: "item/unknown/request".to_string(),
                params: None,
            }),
        };
        assert_eq!(actions_for_event(&state, &unknown_request, 0), Vec::new());

        let after = apply(
            state,
            &[notification(
                "item/completed",
                json!({"threadId": "t1", "item": {"type": "hologram", "id": "h1"}}),
            )],
        );
        assert!(after.items("t1").is_empty());
    }

    #[test]
    fn usage_and_rate_limits_overwrite_snapshots() {
        let state = apply(
            ThreadsState::default(),
            &[
                notification(
                    "thread/tokenUsage/updated",
                    json!({"threadId": "t1", "turnId": "turn-1", "tokenUsage": {"total": {"totalTokens": 10}, "last": {"totalTokens": 10}}}),
                ),
                notification(
                    "thread/tokenUsage/updated",
                    json!({"threadId": "t1", "turnId": "turn-1", "tokenUsage": {"total": {"totalTokens": 25}, "last": {"totalTokens": 15}}}),
                ),
                notification(
                    "account/rateLimits/updated",
                    json!({"rateLimits": {"primary": {"usedPercent": 12.0}}}),
                ),
            ],
        );
        assert_eq!(state.token_usage_by_thread["t1"].total.total_tokens, 25);
        assert_eq!(
            state.rate_limits_by_workspace["w1"]
                .primary
                .map(|window| window.used_percent),
            Some(12.0)
        );
    }

    #[test]
    fn thread_name_updates_rename_the_summary() {
        let state = apply(
            ThreadsState::default(),
            &[
                notification(
                    "thread/started",
                    json!({"thread": {"id": "t1", "preview": "", "createdAt": 1, "updatedAt": 1, "cwd": "/repo"}}),
                ),
                notification(
                    "thread/name/updated",
                    json!({"threadId": "t1", "threadName": "Fix flaky test"}),
                ),
            ],
        );
        let thread = state.thread("w1", "t1").cloned();
        assert_eq!(thread.map(|thread| thread.name), Some("Fix flaky test".to_string()));
    }

    #[test]
    fn turn_diff_becomes_a_diff_item_per_turn() {
        let diff = |text: &str| {
            notification(
                "turn/diff/updated",
                json!({"threadId": "t1", "turnId": "turn-1", "diff": text}),
            )
        };
        let state = apply(ThreadsState::default(), &[diff("@@ -1 +1 @@"), diff("@@ -1,2 +1,2 @@")]);
        assert_eq!(
            state.items("t1"),
            &[ConversationItem::Diff {
                id: "diff-turn-1".to_string(),
                title: "Turn diff".to_string(),
                diff: "@@ -1,2 +1,2 @@".to_string(),
                status: None,
            }]
        );
    }

    #[test]
    fn notification_event_round_trips_through_dispatch() -> Result<(), serde_json::Error> {
        let event = notification_event(
            "w1",
            ServerNotification::TurnCompleted(codex_monitor_protocol::TurnCompletedNotification {
                thread_id: "t1".to_string(),
                turn: codex_monitor_protocol::Turn {
                    id: "turn-1".to_string(),
                    items: Vec::new(),
                    status: codex_monitor_protocol::TurnStatus::Completed,
                    error: None,
                },
            }),
        )?;
        assert_eq!(event.method(), "turn/completed");
        assert_eq!(actions_for_event(&ThreadsState::default(), &event, 0).len(), 2);
        Ok(())
    }
}
