use codex_monitor_thread_state::ConversationItem;
use codex_monitor_thread_state::MessageRole;
use codex_monitor_thread_state::ReviewState;

/// Tool output is shown from the end; longer output is elided.
const MAX_OUTPUT_LINES: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    User,
    Assistant,
    Tool,
    Meta,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    pub kind: LineKind,
    pub text: String,
}

impl RenderedLine {
    fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

pub fn render_item(item: &ConversationItem) -> Vec<RenderedLine> {
    let mut lines = Vec::new();
    match item {
        ConversationItem::Message { role, text, .. } => {
            let (kind, label) = match role {
                MessageRole::User => (LineKind::User, "user"),
                MessageRole::Assistant => (LineKind::Assistant, "assistant"),
            };
            push_multiline(&mut lines, kind, &format!("{label}:"), text);
        }
        ConversationItem::Reasoning { summary, .. } => {
            if !summary.trim().is_empty() {
                push_multiline(&mut lines, LineKind::Meta, "reasoning:", summary);
            }
        }
        ConversationItem::Tool {
            title,
            detail,
            status,
            output,
            changes,
            ..
        } => {
            let header = match status {
                Some(status) => format!("tool: {title} ({status})"),
                None => format!("tool: {title}"),
            };
            lines.push(RenderedLine::new(LineKind::Tool, header));
            if !detail.is_empty() {
                lines.push(RenderedLine::new(LineKind::Meta, format!("  {detail}")));
            }
            for change in changes {
                let kind = change.kind.as_deref().unwrap_or("update");
                lines.push(RenderedLine::new(
                    LineKind::Meta,
                    format!("  {kind} {}", change.path),
                ));
            }
            push_output_tail(&mut lines, output);
        }
        ConversationItem::Review { state, text, .. } => {
            let label = match state {
                ReviewState::Started => "review started:",
                ReviewState::Completed => "review:",
            };
            push_multiline(&mut lines, LineKind::Meta, label, text);
        }
        ConversationItem::Diff { title, diff, .. } => {
            lines.push(RenderedLine::new(
                LineKind::Tool,
                format!("diff: {title} ({} lines)", diff.lines().count()),
            ));
        }
    }
    lines
}

fn push_multiline(lines: &mut Vec<RenderedLine>, kind: LineKind, label: &str, text: &str) {
    let mut text_lines = text.lines();
    let first = text_lines.next().unwrap_or_default();
    lines.push(RenderedLine::new(kind, format!("{label} {first}")));
    lines.extend(text_lines.map(|line| RenderedLine::new(kind, format!("  {line}"))));
}

fn push_output_tail(lines: &mut Vec<RenderedLine>, output: &str) {
    let output_lines: Vec<&str> = output.lines().collect();
    if output_lines.is_empty() {
        return;
    }
    let skip = output_lines.len().saturating_sub(MAX_OUTPUT_LINES);
    if skip > 0 {
        lines.push(RenderedLine::new(
            LineKind::Meta,
            format!("  … {skip} earlier lines"),
        ));
    }
    lines.extend(
        output_lines[skip..]
            .iter()
            .map(|line| RenderedLine::new(LineKind::Meta, format!("  | {line}"))),
    );
}

#[cfg(test)]
mod tests {
    use codex_monitor_thread_state::FileChangeSummary;
    use codex_monitor_thread_state::ToolKind;
    use pretty_assertions::assert_eq;

    use super::*;

    fn texts(lines: &[RenderedLine]) -> Vec<&str> {
        lines.iter().map(|line| line.text.as_str()).collect()
    }

    #[test]
    fn messages_render_with_role_labels() {
        let lines = render_item(&ConversationItem::assistant_message("a1", "Hi\nthere"));
        assert_eq!(texts(&lines), vec!["assistant: Hi", "  there"]);
        assert_eq!(lines[0].kind, LineKind::Assistant);
    }

    #[test]
    fn tool_output_keeps_only_the_tail() {
        let output = (1..=15).map(|n| format!("line {n}")).collect::<Vec<_>>().join("\n");
        let lines = render_item(&ConversationItem::Tool {
            id: "c1".to_string(),
            tool_type: ToolKind::FileChange,
            title: "File changes".to_string(),
            detail: String::new(),
            status: Some("completed".to_string()),
            output,
            changes: vec![FileChangeSummary {
                path: "src/lib.rs".to_string(),
                kind: Some("add".to_string()),
                diff: None,
            }],
        });
        let texts = texts(&lines);
        assert_eq!(texts[0], "tool: File changes (completed)");
        assert_eq!(texts[1], "  add src/lib.rs");
        assert_eq!(texts[2], "  … 3 earlier lines");
        assert_eq!(texts[3], "  | line 4");
        assert_eq!(texts.len(), 3 + MAX_OUTPUT_LINES);
    }

    #[test]
    fn empty_reasoning_renders_nothing() {
        let lines = render_item(&ConversationItem::Reasoning {
            id: "r1".to_string(),
            summary: " ".to_string(),
            content: "hidden".to_string(),
        });
        assert!(lines.is_empty());
    }
}
