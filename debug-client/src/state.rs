use std::collections::HashMap;
use std::collections::HashSet;

use codex_monitor_thread_state::ConversationItem;
use codex_monitor_thread_state::MessageRole;
use codex_monitor_thread_state::ThreadsState;
use serde_json::Value as JsonValue;

use crate::render::LineKind;
use crate::render::RenderedLine;
use crate::render::render_item;

/// A transcript line tagged with the thread it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadLine {
    pub thread_id: String,
    pub line: RenderedLine,
}

/// What has already been printed, so each state snapshot only prints what
/// changed since the last one.
#[derive(Debug, Default)]
pub struct TranscriptCursor {
    rendered: HashMap<(String, String), Vec<RenderedLine>>,
    processing: HashSet<String>,
    approvals: HashSet<String>,
}

impl TranscriptCursor {
    pub fn changes(&mut self, state: &ThreadsState, workspace_id: &str) -> Vec<ThreadLine> {
        let mut out = Vec::new();
        for summary in state.threads(workspace_id) {
            let thread_id = summary.id.as_str();
            let status = state.status(thread_id);
            let items = state.items(thread_id);
            for (index, item) in items.iter().enumerate() {
                let is_last = index + 1 == items.len();
                if is_streaming(item, is_last, status.is_processing) {
                    continue;
                }
                let lines = render_item(item);
                let key = (thread_id.to_string(), item.id().to_string());
                if self.rendered.get(&key) == Some(&lines) {
                    continue;
                }
                out.extend(lines.iter().cloned().map(|line| ThreadLine {
                    thread_id: thread_id.to_string(),
                    line,
                }));
                self.rendered.insert(key, lines);
            }

            let was_processing = self.processing.contains(thread_id);
            if was_processing && !status.is_processing {
                out.push(meta(thread_id, "turn finished"));
                self.processing.remove(thread_id);
            } else if status.is_processing {
                self.processing.insert(thread_id.to_string());
            }
        }

        for approval in state.approvals_for_workspace(workspace_id) {
            let key = approval.request_id.to_string();
            if !self.approvals.insert(key.clone()) {
                continue;
            }
            let command = approval
                .params
                .get("command")
                .and_then(JsonValue::as_str)
                .map(|command| format!(" `{command}`"))
                .unwrap_or_default();
            out.push(ThreadLine {
                thread_id: approval.thread_id().unwrap_or("?").to_string(),
                line: RenderedLine {
                    kind: LineKind::Error,
                    text: format!(
                        "approval {key}: {}{command} (:approve {key} | :decline {key})",
                        approval.method
                    ),
                },
            });
        }
        out
    }
}

/// The trailing assistant text or reasoning of a running turn is still being
/// streamed and printed once it settles. Tools print when they finish.
fn is_streaming(item: &ConversationItem, is_last: bool, is_processing: bool) -> bool {
    match item {
        ConversationItem::Message {
            role: MessageRole::Assistant,
            ..
        }
        | ConversationItem::Reasoning { .. } => is_last && is_processing,
        ConversationItem::Tool { status, .. } => {
            is_processing && matches!(status.as_deref(), Some("inProgress") | None)
        }
        _ => false,
    }
}

fn meta(thread_id: &str, text: &str) -> ThreadLine {
    ThreadLine {
        thread_id: thread_id.to_string(),
        line: RenderedLine {
            kind: LineKind::Meta,
            text: text.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use codex_monitor_thread_state::ThreadAction;
    use codex_monitor_thread_state::reduce_all;
    use pretty_assertions::assert_eq;

    use super::*;

    fn texts(lines: &[ThreadLine]) -> Vec<&str> {
        lines.iter().map(|line| line.line.text.as_str()).collect()
    }

    #[test]
    fn streamed_reply_prints_once_the_turn_settles() {
        let mut cursor = TranscriptCursor::default();
        let state = reduce_all(
            ThreadsState::default(),
            [
                ThreadAction::AddUserMessage {
                    workspace_id: "w".to_string(),
                    thread_id: "t".to_string(),
                    item_id: "u1".to_string(),
                    text: "hi".to_string(),
                    timestamp_ms: 1,
                },
                ThreadAction::MarkProcessing {
                    thread_id: "t".to_string(),
                    is_processing: true,
                },
                ThreadAction::AppendAgentDelta {
                    workspace_id: "w".to_string(),
                    thread_id: "t".to_string(),
                    item_id: "a1".to_string(),
                    delta: "Hel".to_string(),
                },
            ],
        );
        assert_eq!(texts(&cursor.changes(&state, "w")), vec!["user: hi"]);
        assert!(cursor.changes(&state, "w").is_empty());

        let state = reduce_all(
            state,
            [
                ThreadAction::CompleteAgentMessage {
                    workspace_id: "w".to_string(),
                    thread_id: "t".to_string(),
                    item_id: "a1".to_string(),
                    text: "Hello".to_string(),
                },
                ThreadAction::MarkProcessing {
                    thread_id: "t".to_string(),
                    is_processing: false,
                },
            ],
        );
        assert_eq!(
            texts(&cursor.changes(&state, "w")),
            vec!["assistant: Hello", "turn finished"]
        );
    }
}
