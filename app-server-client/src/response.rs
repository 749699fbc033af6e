//! Lenient readers for JSON-RPC results. Some server builds wrap the payload
//! in an extra `result` object; both shapes are accepted before the payload is
//! decoded into the method's typed response.

use codex_monitor_protocol::ClientMethod;
use codex_monitor_protocol::ReviewStartParams;
use codex_monitor_protocol::Thread;
use codex_monitor_protocol::ThreadListParams;
use codex_monitor_protocol::ThreadResumeParams;
use codex_monitor_protocol::ThreadStartParams;
use codex_monitor_protocol::Turn;
use codex_monitor_protocol::TurnStartParams;
use serde_json::Value as JsonValue;
use tracing::debug;

/// Requests answered with the turn they started.
pub(crate) trait StartsTurn: ClientMethod {
    fn turn(response: &Self::Response) -> &Turn;
}

impl StartsTurn for TurnStartParams {
    fn turn(response: &Self::Response) -> &Turn {
        &response.turn
    }
}

impl StartsTurn for ReviewStartParams {
    fn turn(response: &Self::Response) -> &Turn {
        &response.turn
    }
}

/// Requests answered with a full thread.
pub(crate) trait ReturnsThread: ClientMethod {
    fn into_thread(response: Self::Response) -> Thread;
}

impl ReturnsThread for ThreadStartParams {
    fn into_thread(response: Self::Response) -> Thread {
        response.thread
    }
}

impl ReturnsThread for ThreadResumeParams {
    fn into_thread(response: Self::Response) -> Thread {
        response.thread
    }
}

fn payload(result: &JsonValue) -> &JsonValue {
    match result.get("result") {
        Some(inner) if inner.is_object() => inner,
        _ => result,
    }
}

/// Error text embedded in an otherwise successful response.
pub(crate) fn embedded_error(result: &JsonValue) -> Option<String> {
    let error = result
        .get("error")
        .or_else(|| payload(result).get("error"))?;
    match error {
        JsonValue::Null => None,
        JsonValue::String(message) => Some(message.clone()),
        other => Some(
            other
                .get("message")
                .and_then(JsonValue::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        ),
    }
}

pub(crate) fn decode<M: ClientMethod>(result: &JsonValue) -> Option<M::Response> {
    match serde_json::from_value(payload(result).clone()) {
        Ok(response) => Some(response),
        Err(err) => {
            debug!("unreadable {} response: {err}", M::METHOD);
            None
        }
    }
}

pub(crate) fn turn_id<M: StartsTurn>(result: &JsonValue) -> Option<String> {
    decode::<M>(result)
        .map(|response| M::turn(&response).id.clone())
        .filter(|id| !id.is_empty())
}

pub(crate) fn thread<M: ReturnsThread>(result: &JsonValue) -> Option<Thread> {
    decode::<M>(result).map(M::into_thread)
}

/// One page of `thread/list`. When the page as a whole does not decode, the
/// entries that do are kept.
pub(crate) fn thread_page(result: &JsonValue) -> (Vec<Thread>, Option<String>) {
    let (threads, next_cursor) = match decode::<ThreadListParams>(result) {
        Some(page) => (page.data, page.next_cursor),
        None => salvage_page(payload(result)),
    };
    let next_cursor = next_cursor.filter(|cursor| !cursor.is_empty());
    (threads, next_cursor)
}

fn salvage_page(payload: &JsonValue) -> (Vec<Thread>, Option<String>) {
    let threads = payload
        .get("data")
        .and_then(JsonValue::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                .collect()
        })
        .unwrap_or_default();
    let next_cursor = payload
        .get("nextCursor")
        .or_else(|| payload.get("next_cursor"))
        .and_then(JsonValue::as_str)
        .map(str::to_string);
    (threads, next_cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn turn_id_accepts_wrapped_results() {
        assert_eq!(
            turn_id::<TurnStartParams>(&json!({"turn": {"id": "turn-1"}})),
            Some("turn-1".to_string())
        );
        assert_eq!(
            turn_id::<ReviewStartParams>(&json!({"result": {"turn": {"id": "turn-2"}}})),
            Some("turn-2".to_string())
        );
        assert_eq!(turn_id::<TurnStartParams>(&json!({"turn": {}})), None);
        assert_eq!(turn_id::<TurnStartParams>(&json!({"turn": {"id": ""}})), None);
    }

    #[test]
    fn thread_reads_start_and_resume_results() {
        let started = thread::<ThreadStartParams>(&json!({"thread": {"id": "t1"}}));
        assert_eq!(started.map(|thread| thread.id), Some("t1".to_string()));
        assert_eq!(thread::<ThreadResumeParams>(&json!({"thread": {}})), None);
    }

    #[test]
    fn embedded_error_reads_message_or_string() {
        assert_eq!(
            embedded_error(&json!({"error": {"message": "bad model"}})),
            Some("bad model".to_string())
        );
        assert_eq!(
            embedded_error(&json!({"result": {"error": "nope"}})),
            Some("nope".to_string())
        );
        assert_eq!(embedded_error(&json!({"error": null, "turn": {"id": "t"}})), None);
    }

    #[test]
    fn thread_page_decodes_typed_pages() {
        let (threads, cursor) = thread_page(&json!({
            "data": [{"id": "t1", "cwd": "/repo"}, {"id": "t2", "cwd": "/repo"}],
            "nextCursor": "abc",
        }));
        let ids: Vec<&str> = threads.iter().map(|thread| thread.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
        assert_eq!(cursor.as_deref(), Some("abc"));

        let (_, cursor) = thread_page(&json!({"data": [], "nextCursor": ""}));
        assert_eq!(cursor, None);
    }

    #[test]
    fn thread_page_skips_bad_entries() {
        let (threads, cursor) = thread_page(&json!({
            "data": [{"id": "t1", "cwd": "/repo"}, {"preview": "no id"}],
            "next_cursor": "abc",
        }));
        assert_eq!(threads.len(), 1);
        assert_eq!(cursor.as_deref(), Some("abc"));
    }
}
