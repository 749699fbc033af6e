//! Conversion of raw server payloads into the typed values kept in
//! [`ThreadsState`](crate::ThreadsState).
//!
//! Items go through one tagged-enum decode ([`ThreadItem`]); token usage and
//! rate limits go through the field tables below, which list every spelling
//! the server has been seen to use.

use codex_monitor_protocol::ThreadItem;
use codex_monitor_protocol::Turn;
use codex_monitor_protocol::UserInput;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::items::ConversationItem;
use crate::items::FileChangeSummary;
use crate::items::MessageRole;
use crate::items::ReviewState;
use crate::items::ToolKind;
use crate::items::prepare_thread_items;
use crate::state::RateLimitSnapshot;
use crate::state::RateLimitWindow;
use crate::state::ThreadTokenUsage;
use crate::state::TokenUsageBreakdown;

/// Decode one raw item. Unknown kinds, malformed payloads and items without
/// an id yield `None`.
pub fn normalize_item(raw: &JsonValue) -> Option<ConversationItem> {
    let item = match ThreadItem::deserialize(raw) {
        Ok(item) => item,
        Err(err) => {
            debug!("dropping malformed item payload: {err}");
            return None;
        }
    };
    if item.id().is_none_or(|id| id.trim().is_empty()) {
        debug!("dropping item without id");
        return None;
    }
    convert_item(item)
}

fn convert_item(item: ThreadItem) -> Option<ConversationItem> {
    let converted = match item {
        ThreadItem::UserMessage { id, content } => ConversationItem::Message {
            id,
            role: MessageRole::User,
            text: user_input_text(&content),
        },
        ThreadItem::AgentMessage { id, text } => ConversationItem::Message {
            id,
            role: MessageRole::Assistant,
            text,
        },
        ThreadItem::Plan { id, text } => tool(id, ToolKind::Plan, "Plan".to_string(), text),
        ThreadItem::Reasoning {
            id,
            summary,
            content,
        } => ConversationItem::Reasoning {
            id,
            summary: summary.join("\n\n"),
            content: content.join("\n\n"),
        },
        ThreadItem::CommandExecution {
            id,
            command,
            cwd,
            status,
            aggregated_output,
            exit_code,
            ..
        } => {
            let mut detail = cwd.display().to_string();
            if let Some(code) = exit_code {
                if !detail.is_empty() {
                    detail.push_str(" · ");
                }
                detail.push_str(&format!("exit {code}"));
            }
            ConversationItem::Tool {
                id,
                tool_type: ToolKind::CommandExecution,
                title: format!("Command: {command}"),
                detail,
                status: wire_label(&status),
                output: aggregated_output.unwrap_or_default(),
                changes: Vec::new(),
            }
        }
        ThreadItem::FileChange {
            id,
            changes,
            status,
        } => {
            let changes: Vec<FileChangeSummary> = changes
                .into_iter()
                .map(|change| FileChangeSummary {
                    path: change.path,
                    kind: change_kind(&change.kind),
                    diff: Some(change.diff).filter(|diff| !diff.is_empty()),
                })
                .collect();
            ConversationItem::Tool {
                id,
                tool_type: ToolKind::FileChange,
                title: "File changes".to_string(),
                detail: changes
                    .iter()
                    .map(|change| change.path.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                status: wire_label(&status),
                output: String::new(),
                changes,
            }
        }
        ThreadItem::McpToolCall {
            id,
            server,
            tool,
            status,
            arguments,
            result,
            error,
        } => ConversationItem::Tool {
            id,
            tool_type: ToolKind::McpToolCall,
            title: format!("Tool: {server} / {tool}"),
            detail: compact_json(&arguments),
            status: wire_label(&status),
            output: error
                .or(result)
                .map(|value| compact_json(&value))
                .unwrap_or_default(),
            changes: Vec::new(),
        },
        ThreadItem::WebSearch { id, query } => {
            let mut item = tool(id, ToolKind::WebSearch, "Web search".to_string(), String::new());
            set_detail(&mut item, query);
            item
        }
        ThreadItem::ImageView { id, path } => {
            let mut item = tool(id, ToolKind::ImageView, "Image view".to_string(), String::new());
            set_detail(&mut item, path);
            item
        }
        ThreadItem::EnteredReviewMode { id, review } => ConversationItem::Review {
            id,
            state: ReviewState::Started,
            text: review,
        },
        ThreadItem::ExitedReviewMode { id, review } => ConversationItem::Review {
            id,
            state: ReviewState::Completed,
            text: review,
        },
        ThreadItem::ContextCompaction { id } => ConversationItem::Tool {
            id,
            tool_type: ToolKind::ContextCompaction,
            title: "Context compaction".to_string(),
            detail: String::new(),
            status: Some("completed".to_string()),
            output: String::new(),
            changes: Vec::new(),
        },
        ThreadItem::Unknown => return None,
    };
    Some(converted)
}

fn tool(id: String, tool_type: ToolKind, title: String, output: String) -> ConversationItem {
    ConversationItem::Tool {
        id,
        tool_type,
        title,
        detail: String::new(),
        status: None,
        output,
        changes: Vec::new(),
    }
}

fn set_detail(item: &mut ConversationItem, value: String) {
    if let ConversationItem::Tool { detail, .. } = item {
        *detail = value;
    }
}

fn user_input_text(content: &[UserInput]) -> String {
    content
        .iter()
        .filter_map(|input| match input {
            UserInput::Text { text } => Some(text.clone()),
            UserInput::Image { .. } | UserInput::LocalImage { .. } => Some("[image]".to_string()),
            UserInput::Unsupported => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn wire_label<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_value(value)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
}

fn change_kind(kind: &JsonValue) -> Option<String> {
    match kind {
        JsonValue::String(kind) => Some(kind.clone()),
        JsonValue::Object(fields) => fields
            .get("type")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn compact_json(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Flatten resumed turns into a prepared item list.
pub fn items_from_turns(turns: &[Turn]) -> Vec<ConversationItem> {
    let items: Vec<ConversationItem> = turns
        .iter()
        .flat_map(|turn| turn.items.iter())
        .filter_map(normalize_item)
        .collect();
    prepare_thread_items(&items)
}

/// True when the most recent review marker opened a review that has not
/// been closed yet.
pub fn review_in_progress(items: &[ConversationItem]) -> bool {
    items
        .iter()
        .rev()
        .find_map(|item| match item {
            ConversationItem::Review { state, .. } => Some(*state == ReviewState::Started),
            _ => None,
        })
        .unwrap_or(false)
}

/// Text of the last assistant message, if any.
pub fn last_assistant_text(items: &[ConversationItem]) -> Option<&str> {
    items.iter().rev().find_map(|item| match item {
        ConversationItem::Message {
            role: MessageRole::Assistant,
            text,
            ..
        } if !text.trim().is_empty() => Some(text.as_str()),
        _ => None,
    })
}

/// Accepted spellings for one logical field, tried in order.
type FieldAliases = &'static [&'static str];

const TOKEN_USAGE_TOTAL: FieldAliases = &["total", "totalTokenUsage", "total_token_usage"];
const TOKEN_USAGE_LAST: FieldAliases = &["last", "lastTokenUsage", "last_token_usage"];
const TOKEN_USAGE_CONTEXT_WINDOW: FieldAliases = &["modelContextWindow", "model_context_window"];

const BREAKDOWN_TOTAL_TOKENS: FieldAliases = &["totalTokens", "total_tokens"];
const BREAKDOWN_INPUT_TOKENS: FieldAliases = &["inputTokens", "input_tokens"];
const BREAKDOWN_CACHED_INPUT_TOKENS: FieldAliases = &["cachedInputTokens", "cached_input_tokens"];
const BREAKDOWN_OUTPUT_TOKENS: FieldAliases = &["outputTokens", "output_tokens"];
const BREAKDOWN_REASONING_OUTPUT_TOKENS: FieldAliases =
    &["reasoningOutputTokens", "reasoning_output_tokens"];

const RATE_LIMITS_ENVELOPE: FieldAliases = &["rateLimits", "rate_limits"];
const RATE_LIMIT_PRIMARY: FieldAliases = &["primary"];
const RATE_LIMIT_SECONDARY: FieldAliases = &["secondary"];
const WINDOW_USED_PERCENT: FieldAliases = &["usedPercent", "used_percent"];
const WINDOW_DURATION_MINS: FieldAliases = &[
    "windowDurationMins",
    "window_duration_mins",
    "windowMinutes",
    "window_minutes",
];
const WINDOW_RESETS_AT: FieldAliases = &["resetsAt", "resets_at"];

fn field<'a>(value: &'a JsonValue, aliases: FieldAliases) -> Option<&'a JsonValue> {
    aliases
        .iter()
        .find_map(|alias| value.get(*alias).filter(|value| !value.is_null()))
}

fn int_field(value: &JsonValue, aliases: FieldAliases) -> Option<i64> {
    field(value, aliases).and_then(|value| {
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|number| number as i64))
    })
}

fn token_breakdown(value: &JsonValue) -> TokenUsageBreakdown {
    TokenUsageBreakdown {
        total_tokens: int_field(value, BREAKDOWN_TOTAL_TOKENS).unwrap_or_default(),
        input_tokens: int_field(value, BREAKDOWN_INPUT_TOKENS).unwrap_or_default(),
        cached_input_tokens: int_field(value, BREAKDOWN_CACHED_INPUT_TOKENS).unwrap_or_default(),
        output_tokens: int_field(value, BREAKDOWN_OUTPUT_TOKENS).unwrap_or_default(),
        reasoning_output_tokens: int_field(value, BREAKDOWN_REASONING_OUTPUT_TOKENS)
            .unwrap_or_default(),
    }
}

/// `None` unless the payload carries at least one usage breakdown.
pub fn normalize_token_usage(raw: &JsonValue) -> Option<ThreadTokenUsage> {
    let total = field(raw, TOKEN_USAGE_TOTAL);
    let last = field(raw, TOKEN_USAGE_LAST);
    if total.is_none() && last.is_none() {
        return None;
    }
    Some(ThreadTokenUsage {
        total: total.map(token_breakdown).unwrap_or_default(),
        last: last.map(token_breakdown).unwrap_or_default(),
        model_context_window: int_field(raw, TOKEN_USAGE_CONTEXT_WINDOW),
    })
}

fn rate_limit_window(value: &JsonValue) -> Option<RateLimitWindow> {
    let used_percent = field(value, WINDOW_USED_PERCENT)?.as_f64()?;
    Some(RateLimitWindow {
        used_percent,
        window_duration_mins: int_field(value, WINDOW_DURATION_MINS),
        resets_at: int_field(value, WINDOW_RESETS_AT),
    })
}

/// Accepts a bare snapshot or one wrapped in a `rateLimits` envelope. `None`
/// when neither window can be read.
pub fn normalize_rate_limits(raw: &JsonValue) -> Option<RateLimitSnapshot> {
    let snapshot = field(raw, RATE_LIMITS_ENVELOPE).unwrap_or(raw);
    let primary = field(snapshot, RATE_LIMIT_PRIMARY).and_then(rate_limit_window);
    let secondary = field(snapshot, RATE_LIMIT_SECONDARY).and_then(rate_limit_window);
    if primary.is_none() && secondary.is_none() {
        return None;
    }
    Some(RateLimitSnapshot { primary, secondary })
}
