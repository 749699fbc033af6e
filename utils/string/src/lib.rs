/// Marker appended to text shortened for display.
pub const ELLIPSIS: char = '…';

/// Collapse whitespace runs and cut `text` to at most `max_chars` characters,
/// appending [`ELLIPSIS`] when anything was dropped.
///
/// Used for thread names derived from a message or a server preview.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(max_chars).collect();
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    out.push(ELLIPSIS);
    out
}

/// Keep the last `max_bytes` of `text`, prefixed with a marker line when
/// anything was cut. Streaming tool output is only ever read from the bottom.
pub fn keep_tail_with_marker(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let tail = tail_at_char_boundary(text, max_bytes);
    format!("{ELLIPSIS} output truncated {ELLIPSIS}\n{tail}")
}

/// Longest suffix of `text` within `max_bytes` that starts on a char boundary.
fn tail_at_char_boundary(text: &str, max_bytes: usize) -> &str {
    let mut start = text.len().saturating_sub(max_bytes);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::keep_tail_with_marker;
    use super::tail_at_char_boundary;
    use super::truncate_preview;
    use pretty_assertions::assert_eq;

    #[test]
    fn tail_never_splits_a_char() {
        assert_eq!(tail_at_char_boundary("héllo", 4), "llo");
        assert_eq!(tail_at_char_boundary("héllo", 5), "éllo");
        assert_eq!(tail_at_char_boundary("héllo", 0), "");
    }

    #[test]
    fn truncate_preview_keeps_short_text() {
        assert_eq!(truncate_preview("  fix   the build ", 38), "fix the build");
    }

    #[test]
    fn truncate_preview_adds_ellipsis() {
        assert_eq!(truncate_preview("abcdef ghij", 7), "abcdef…");
        assert_eq!(truncate_preview("abcdefghij", 4), "abcd…");
    }

    #[test]
    fn keep_tail_with_marker_drops_the_head() {
        let text = "line one\nline two\n";
        assert_eq!(keep_tail_with_marker(text, 100), text);
        assert_eq!(
            keep_tail_with_marker(text, 9),
            "… output truncated …\nline two\n"
        );
    }
}
