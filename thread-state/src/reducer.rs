use std::sync::Arc;

use codex_monitor_protocol::RequestId;
use codex_monitor_utils_string::truncate_preview;

use crate::items::ConversationItem;
use crate::items::MessageRole;
use crate::items::merge_thread_items;
use crate::items::prepare_thread_items;
use crate::items::upsert_item;
use crate::state::ApprovalRequest;
use crate::state::LastAgentMessage;
use crate::state::RateLimitSnapshot;
use crate::state::THREAD_NAME_MAX_CHARS;
use crate::state::ThreadStatus;
use crate::state::ThreadSummary;
use crate::state::ThreadTokenUsage;
use crate::state::ThreadsState;
use crate::state::TurnPlan;

/// Every state transition the monitor knows about.
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadAction {
    EnsureThread {
        workspace_id: String,
        thread_id: String,
    },
    SetActiveThreadId {
        workspace_id: String,
        thread_id: Option<String>,
    },
    RemoveThread {
        workspace_id: String,
        thread_id: String,
    },
    RenameThread {
        workspace_id: String,
        thread_id: String,
        name: String,
    },
    /// Replace a workspace's thread list, e.g. after `thread/list`.
    SetThreadSummaries {
        workspace_id: String,
        threads: Vec<ThreadSummary>,
    },
    MarkProcessing {
        thread_id: String,
        is_processing: bool,
    },
    MarkReviewing {
        thread_id: String,
        is_reviewing: bool,
    },
    MarkUnread {
        thread_id: String,
        has_unread: bool,
    },
    AddUserMessage {
        workspace_id: String,
        thread_id: String,
        item_id: String,
        text: String,
        timestamp_ms: i64,
    },
    AppendAgentDelta {
        workspace_id: String,
        thread_id: String,
        item_id: String,
        delta: String,
    },
    CompleteAgentMessage {
        workspace_id: String,
        thread_id: String,
        item_id: String,
        text: String,
    },
    AppendReasoningSummary {
        thread_id: String,
        item_id: String,
        delta: String,
    },
    /// Paragraph break between two summary parts.
    AppendReasoningSummaryBoundary {
        thread_id: String,
        item_id: String,
    },
    AppendReasoningContent {
        thread_id: String,
        item_id: String,
        delta: String,
    },
    AppendToolOutput {
        thread_id: String,
        item_id: String,
        delta: String,
    },
    UpsertItem {
        workspace_id: String,
        thread_id: String,
        item: ConversationItem,
    },
    SetThreadItems {
        thread_id: String,
        items: Vec<ConversationItem>,
    },
    /// Fold a resumed server snapshot into the local list. `baseline_revision`
    /// is the thread's item revision when the resume request went out.
    MergeThreadItems {
        thread_id: String,
        items: Vec<ConversationItem>,
        baseline_revision: u64,
    },
    SetThreadPlan {
        thread_id: String,
        plan: Option<TurnPlan>,
    },
    ClearThreadPlan {
        thread_id: String,
    },
    SetActiveTurnId {
        thread_id: String,
        turn_id: Option<String>,
    },
    AddApproval {
        approval: ApprovalRequest,
    },
    RemoveApproval {
        workspace_id: String,
        request_id: RequestId,
    },
    SetLastAgentMessage {
        thread_id: String,
        text: String,
        timestamp_ms: i64,
    },
    SetThreadTokenUsage {
        thread_id: String,
        usage: ThreadTokenUsage,
    },
    SetRateLimits {
        workspace_id: String,
        rate_limits: RateLimitSnapshot,
    },
}

/// Apply one action. Never fails; actions naming unknown threads either
/// create what they need or leave the state alone.
pub fn reduce(mut state: ThreadsState, action: ThreadAction) -> ThreadsState {
    match action {
        ThreadAction::EnsureThread {
            workspace_id,
            thread_id,
        } => ensure_thread(&mut state, &workspace_id, &thread_id),
        ThreadAction::SetActiveThreadId {
            workspace_id,
            thread_id,
        } => match thread_id {
            Some(thread_id) => {
                if let Some(status) = state.status_by_thread.get_mut(&thread_id) {
                    status.has_unread = false;
                }
                state
                    .active_thread_by_workspace
                    .insert(workspace_id, thread_id);
            }
            None => {
                state.active_thread_by_workspace.remove(&workspace_id);
            }
        },
        ThreadAction::RemoveThread {
            workspace_id,
            thread_id,
        } => remove_thread(&mut state, &workspace_id, &thread_id),
        ThreadAction::RenameThread {
            workspace_id,
            thread_id,
            name,
        } => {
            let name = name.trim();
            if !name.is_empty() {
                update_summary(&mut state, &workspace_id, &thread_id, |summary| {
                    summary.name = name.to_string();
                    summary.auto_named = false;
                });
            }
        }
        ThreadAction::SetThreadSummaries {
            workspace_id,
            threads,
        } => {
            for thread in &threads {
                state.status_by_thread.entry(thread.id.clone()).or_default();
            }
            state
                .threads_by_workspace
                .insert(workspace_id, Arc::new(threads));
        }
        ThreadAction::MarkProcessing {
            thread_id,
            is_processing,
        } => update_status(&mut state, thread_id, |status| {
            status.is_processing = is_processing;
        }),
        ThreadAction::MarkReviewing {
            thread_id,
            is_reviewing,
        } => update_status(&mut state, thread_id, |status| {
            status.is_reviewing = is_reviewing;
        }),
        ThreadAction::MarkUnread {
            thread_id,
            has_unread,
        } => update_status(&mut state, thread_id, |status| {
            status.has_unread = has_unread;
        }),
        ThreadAction::AddUserMessage {
            workspace_id,
            thread_id,
            item_id,
            text,
            timestamp_ms,
        } => add_user_message(
            &mut state,
            &workspace_id,
            &thread_id,
            item_id,
            text,
            timestamp_ms,
        ),
        ThreadAction::AppendAgentDelta {
            workspace_id,
            thread_id,
            item_id,
            delta,
        } => {
            ensure_thread(&mut state, &workspace_id, &thread_id);
            let existing = find_item(&state, &thread_id, &item_id).cloned();
            let next = match existing {
                Some(ConversationItem::Message {
                    id,
                    role: MessageRole::Assistant,
                    text,
                }) => ConversationItem::assistant_message(id, text + &delta),
                Some(_) => return state,
                None => ConversationItem::assistant_message(item_id, delta),
            };
            put_item(&mut state, &thread_id, next);
        }
        ThreadAction::CompleteAgentMessage {
            workspace_id,
            thread_id,
            item_id,
            text,
        } => {
            ensure_thread(&mut state, &workspace_id, &thread_id);
            let final_text = match find_item(&state, &thread_id, &item_id) {
                Some(ConversationItem::Message {
                    role: MessageRole::Assistant,
                    text: current,
                    ..
                }) => {
                    if text.is_empty() {
                        Some(current.clone())
                    } else {
                        Some(text)
                    }
                }
                Some(_) => None,
                None => Some(text),
            };
            if let Some(final_text) = final_text.filter(|text| !text.is_empty()) {
                put_item(
                    &mut state,
                    &thread_id,
                    ConversationItem::assistant_message(item_id, final_text),
                );
            }
        }
        ThreadAction::AppendReasoningSummary {
            thread_id,
            item_id,
            delta,
        } => append_reasoning(&mut state, &thread_id, item_id, |summary, _| {
            summary.push_str(&delta);
        }),
        ThreadAction::AppendReasoningSummaryBoundary { thread_id, item_id } => {
            append_reasoning(&mut state, &thread_id, item_id, |summary, _| {
                if !summary.is_empty() && !summary.ends_with("\n\n") {
                    summary.push_str("\n\n");
                }
            })
        }
        ThreadAction::AppendReasoningContent {
            thread_id,
            item_id,
            delta,
        } => append_reasoning(&mut state, &thread_id, item_id, |_, content| {
            content.push_str(&delta);
        }),
        ThreadAction::AppendToolOutput {
            thread_id,
            item_id,
            delta,
        } => {
            if let Some(ConversationItem::Tool {
                id,
                tool_type,
                title,
                detail,
                status,
                output,
                changes,
            }) = find_item(&state, &thread_id, &item_id).cloned()
            {
                put_item(
                    &mut state,
                    &thread_id,
                    ConversationItem::Tool {
                        id,
                        tool_type,
                        title,
                        detail,
                        status,
                        output: output + &delta,
                        changes,
                    },
                );
            }
        }
        ThreadAction::UpsertItem {
            workspace_id,
            thread_id,
            item,
        } => {
            ensure_thread(&mut state, &workspace_id, &thread_id);
            let item = match find_item(&state, &thread_id, item.id()) {
                Some(existing) => keep_streamed_text(existing, item),
                None => item,
            };
            put_item(&mut state, &thread_id, item);
        }
        ThreadAction::SetThreadItems { thread_id, items } => {
            let prepared = prepare_thread_items(&items);
            replace_items(&mut state, &thread_id, prepared);
        }
        ThreadAction::MergeThreadItems {
            thread_id,
            items,
            baseline_revision,
        } => {
            let prefer_local = state.item_revision(&thread_id) > baseline_revision;
            let merged = merge_thread_items(&items, state.items(&thread_id), prefer_local);
            replace_items(&mut state, &thread_id, merged);
        }
        ThreadAction::SetThreadPlan { thread_id, plan } => match plan {
            Some(plan) => {
                state.plan_by_thread.insert(thread_id, plan);
            }
            None => {
                state.plan_by_thread.remove(&thread_id);
            }
        },
        ThreadAction::ClearThreadPlan { thread_id } => {
            state.plan_by_thread.remove(&thread_id);
        }
        ThreadAction::SetActiveTurnId { thread_id, turn_id } => match turn_id {
            Some(turn_id) => {
                state.active_turn_by_thread.insert(thread_id, turn_id);
            }
            None => {
                state.active_turn_by_thread.remove(&thread_id);
            }
        },
        ThreadAction::AddApproval { approval } => {
            if !state.approvals.contains(&approval) {
                let mut approvals = state.approvals.as_ref().clone();
                approvals.push(approval);
                state.approvals = Arc::new(approvals);
            }
        }
        ThreadAction::RemoveApproval {
            workspace_id,
            request_id,
        } => {
            let matches = |approval: &ApprovalRequest| {
                approval.workspace_id == workspace_id && approval.request_id == request_id
            };
            if state.approvals.iter().any(matches) {
                let approvals = state
                    .approvals
                    .iter()
                    .filter(|approval| !matches(*approval))
                    .cloned()
                    .collect();
                state.approvals = Arc::new(approvals);
            }
        }
        ThreadAction::SetLastAgentMessage {
            thread_id,
            text,
            timestamp_ms,
        } => {
            let is_newer = state
                .last_agent_message_by_thread
                .get(&thread_id)
                .is_none_or(|current| timestamp_ms > current.timestamp_ms);
            if is_newer {
                state
                    .last_agent_message_by_thread
                    .insert(thread_id, LastAgentMessage { text, timestamp_ms });
            }
        }
        ThreadAction::SetThreadTokenUsage { thread_id, usage } => {
            state.token_usage_by_thread.insert(thread_id, usage);
        }
        ThreadAction::SetRateLimits {
            workspace_id,
            rate_limits,
        } => {
            state
                .rate_limits_by_workspace
                .insert(workspace_id, rate_limits);
        }
    }
    state
}

fn ensure_thread(state: &mut ThreadsState, workspace_id: &str, thread_id: &str) {
    state
        .status_by_thread
        .entry(thread_id.to_string())
        .or_default();
    let threads = state.threads(workspace_id);
    if threads.iter().any(|thread| thread.id == thread_id) {
        return;
    }
    let mut next = threads.to_vec();
    next.push(ThreadSummary {
        id: thread_id.to_string(),
        name: format!("Agent {}", threads.len() + 1),
        updated_at_ms: 0,
        auto_named: true,
    });
    state
        .threads_by_workspace
        .insert(workspace_id.to_string(), Arc::new(next));
}

fn remove_thread(state: &mut ThreadsState, workspace_id: &str, thread_id: &str) {
    let threads = state.threads(workspace_id);
    if threads.iter().any(|thread| thread.id == thread_id) {
        let remaining: Vec<ThreadSummary> = threads
            .iter()
            .filter(|thread| thread.id != thread_id)
            .cloned()
            .collect();
        state
            .threads_by_workspace
            .insert(workspace_id.to_string(), Arc::new(remaining));
    }
    state.items_by_thread.remove(thread_id);
    state.item_revision_by_thread.remove(thread_id);
    state.status_by_thread.remove(thread_id);
    state.active_turn_by_thread.remove(thread_id);
    state.plan_by_thread.remove(thread_id);
    state.token_usage_by_thread.remove(thread_id);
    state.last_agent_message_by_thread.remove(thread_id);

    if state.active_thread(workspace_id) == Some(thread_id) {
        match state.threads(workspace_id).first() {
            Some(next) => {
                let next_id = next.id.clone();
                state
                    .active_thread_by_workspace
                    .insert(workspace_id.to_string(), next_id);
            }
            None => {
                state.active_thread_by_workspace.remove(workspace_id);
            }
        }
    }
}

fn add_user_message(
    state: &mut ThreadsState,
    workspace_id: &str,
    thread_id: &str,
    item_id: String,
    text: String,
    timestamp_ms: i64,
) {
    ensure_thread(state, workspace_id, thread_id);
    let preview = truncate_preview(&text, THREAD_NAME_MAX_CHARS);
    put_item(state, thread_id, ConversationItem::user_message(item_id, text));

    let threads = state.threads(workspace_id);
    let Some(position) = threads.iter().position(|thread| thread.id == thread_id) else {
        return;
    };
    let mut next = threads.to_vec();
    let mut summary = next.remove(position);
    if summary.auto_named && !preview.is_empty() {
        summary.name = preview;
        summary.auto_named = false;
    }
    summary.updated_at_ms = summary.updated_at_ms.max(timestamp_ms);
    next.insert(0, summary);
    state
        .threads_by_workspace
        .insert(workspace_id.to_string(), Arc::new(next));
}

fn update_summary(
    state: &mut ThreadsState,
    workspace_id: &str,
    thread_id: &str,
    update: impl FnOnce(&mut ThreadSummary),
) {
    let threads = state.threads(workspace_id);
    let Some(position) = threads.iter().position(|thread| thread.id == thread_id) else {
        return;
    };
    let mut next = threads.to_vec();
    update(&mut next[position]);
    state
        .threads_by_workspace
        .insert(workspace_id.to_string(), Arc::new(next));
}

fn update_status(
    state: &mut ThreadsState,
    thread_id: String,
    update: impl FnOnce(&mut ThreadStatus),
) {
    update(state.status_by_thread.entry(thread_id).or_default());
}

fn find_item<'a>(
    state: &'a ThreadsState,
    thread_id: &str,
    item_id: &str,
) -> Option<&'a ConversationItem> {
    state
        .items(thread_id)
        .iter()
        .find(|item| item.id() == item_id)
}

/// Upsert into a fresh list so other holders of the old `Arc` keep their view.
fn put_item(state: &mut ThreadsState, thread_id: &str, item: ConversationItem) {
    let next = upsert_item(state.items(thread_id), item);
    replace_items(state, thread_id, next);
}

fn replace_items(state: &mut ThreadsState, thread_id: &str, items: Vec<ConversationItem>) {
    state
        .items_by_thread
        .insert(thread_id.to_string(), Arc::new(items));
    *state
        .item_revision_by_thread
        .entry(thread_id.to_string())
        .or_default() += 1;
}

fn append_reasoning(
    state: &mut ThreadsState,
    thread_id: &str,
    item_id: String,
    append: impl FnOnce(&mut String, &mut String),
) {
    let (id, mut summary, mut content) = match find_item(state, thread_id, &item_id) {
        Some(ConversationItem::Reasoning {
            id,
            summary,
            content,
        }) => (id.clone(), summary.clone(), content.clone()),
        Some(_) => return,
        None => (item_id, String::new(), String::new()),
    };
    append(&mut summary, &mut content);
    put_item(
        state,
        thread_id,
        ConversationItem::Reasoning {
            id,
            summary,
            content,
        },
    );
}

/// A started/completed snapshot may arrive with less text than the deltas
/// already streamed for the same id; the longer local text is kept.
fn keep_streamed_text(existing: &ConversationItem, incoming: ConversationItem) -> ConversationItem {
    match (existing, incoming) {
        (
            ConversationItem::Message {
                role: MessageRole::Assistant,
                text: current,
                ..
            },
            ConversationItem::Message {
                id,
                role: MessageRole::Assistant,
                text,
            },
        ) if text.is_empty() => ConversationItem::assistant_message(id, current.clone()),
        (
            ConversationItem::Reasoning {
                summary: current_summary,
                content: current_content,
                ..
            },
            ConversationItem::Reasoning {
                id,
                summary,
                content,
            },
        ) => ConversationItem::Reasoning {
            id,
            summary: if summary.is_empty() {
                current_summary.clone()
            } else {
                summary
            },
            content: if content.is_empty() {
                current_content.clone()
            } else {
                content
            },
        },
        (
            ConversationItem::Tool {
                output: current_output,
                ..
            },
            ConversationItem::Tool {
                id,
                tool_type,
                title,
                detail,
                status,
                output,
                changes,
            },
        ) => ConversationItem::Tool {
            id,
            tool_type,
            title,
            detail,
            status,
            output: if output.is_empty() {
                current_output.clone()
            } else {
                output
            },
            changes,
        },
        (_, incoming) => incoming,
    }
}
