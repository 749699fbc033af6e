use std::collections::HashSet;

use codex_monitor_utils_string::keep_tail_with_marker;
use serde::Serialize;

/// Streamed tool output beyond this many bytes keeps only its tail.
pub const MAX_TOOL_OUTPUT_BYTES: usize = 200_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolKind {
    CommandExecution,
    FileChange,
    McpToolCall,
    WebSearch,
    ImageView,
    Plan,
    ContextCompaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewState {
    Started,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangeSummary {
    pub path: String,
    pub kind: Option<String>,
    pub diff: Option<String>,
}

/// One renderable entry of a thread transcript. `id` is the merge key and is
/// unique within a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConversationItem {
    Message {
        id: String,
        role: MessageRole,
        text: String,
    },
    Reasoning {
        id: String,
        summary: String,
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    Tool {
        id: String,
        tool_type: ToolKind,
        title: String,
        detail: String,
        status: Option<String>,
        output: String,
        changes: Vec<FileChangeSummary>,
    },
    Review {
        id: String,
        state: ReviewState,
        text: String,
    },
    Diff {
        id: String,
        title: String,
        diff: String,
        status: Option<String>,
    },
}

impl ConversationItem {
    pub fn id(&self) -> &str {
        match self {
            ConversationItem::Message { id, .. }
            | ConversationItem::Reasoning { id, .. }
            | ConversationItem::Tool { id, .. }
            | ConversationItem::Review { id, .. }
            | ConversationItem::Diff { id, .. } => id,
        }
    }

    pub fn user_message(id: impl Into<String>, text: impl Into<String>) -> Self {
        ConversationItem::Message {
            id: id.into(),
            role: MessageRole::User,
            text: text.into(),
        }
    }

    pub fn assistant_message(id: impl Into<String>, text: impl Into<String>) -> Self {
        ConversationItem::Message {
            id: id.into(),
            role: MessageRole::Assistant,
            text: text.into(),
        }
    }

    fn is_empty_placeholder(&self) -> bool {
        match self {
            ConversationItem::Message {
                role: MessageRole::Assistant,
                text,
                ..
            } => text.trim().is_empty(),
            ConversationItem::Reasoning {
                summary, content, ..
            } => summary.trim().is_empty() && content.trim().is_empty(),
            _ => false,
        }
    }

    fn user_text(&self) -> Option<&str> {
        match self {
            ConversationItem::Message {
                role: MessageRole::User,
                text,
                ..
            } => Some(text.trim()),
            _ => None,
        }
    }
}

/// Replace the item with the same id in place, or append it.
pub fn upsert_item(items: &[ConversationItem], item: ConversationItem) -> Vec<ConversationItem> {
    let mut next = items.to_vec();
    match next.iter().position(|existing| existing.id() == item.id()) {
        Some(index) => next[index] = item,
        None => next.push(item),
    }
    next
}

/// Drop empty placeholders, collapse duplicate ids onto their first position
/// and cap tool output. Surviving items keep their relative order.
pub fn prepare_thread_items(items: &[ConversationItem]) -> Vec<ConversationItem> {
    let mut prepared: Vec<ConversationItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.is_empty_placeholder() {
            continue;
        }
        let item = cap_tool_output(item.clone());
        match prepared
            .iter()
            .position(|existing| existing.id() == item.id())
        {
            Some(index) => prepared[index] = item,
            None => prepared.push(item),
        }
    }
    prepared
}

fn cap_tool_output(item: ConversationItem) -> ConversationItem {
    match item {
        ConversationItem::Tool {
            id,
            tool_type,
            title,
            detail,
            status,
            output,
            changes,
        } if output.len() > MAX_TOOL_OUTPUT_BYTES => ConversationItem::Tool {
            id,
            tool_type,
            title,
            detail,
            status,
            output: keep_tail_with_marker(&output, MAX_TOOL_OUTPUT_BYTES),
            changes,
        },
        other => other,
    }
}

/// Merge a server snapshot with the locally accumulated list for one thread.
///
/// Server order is kept. For ids present on both sides the local copy wins
/// when `prefer_local` is set. Local-only items are appended after the
/// snapshot, except optimistic user messages whose text the server already
/// recorded under its own id.
pub fn merge_thread_items(
    server: &[ConversationItem],
    local: &[ConversationItem],
    prefer_local: bool,
) -> Vec<ConversationItem> {
    let server_ids: HashSet<&str> = server.iter().map(ConversationItem::id).collect();
    let server_user_texts: HashSet<&str> = server
        .iter()
        .filter_map(ConversationItem::user_text)
        .collect();

    let mut merged: Vec<ConversationItem> = server
        .iter()
        .map(|item| {
            if prefer_local
                && let Some(local_item) = local.iter().find(|local| local.id() == item.id())
            {
                return local_item.clone();
            }
            item.clone()
        })
        .collect();

    for item in local {
        if server_ids.contains(item.id()) {
            continue;
        }
        if let Some(text) = item.user_text()
            && server_user_texts.contains(text)
        {
            continue;
        }
        merged.push(item.clone());
    }

    prepare_thread_items(&merged)
}
