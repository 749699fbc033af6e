use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

/// Where a debug entry originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugSource {
    Client,
    Server,
    Event,
    Error,
}

impl DebugSource {
    fn as_str(self) -> &'static str {
        match self {
            DebugSource::Client => "client",
            DebugSource::Server => "server",
            DebugSource::Event => "event",
            DebugSource::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugEntry {
    pub timestamp_ms: i64,
    pub source: DebugSource,
    pub label: String,
    pub payload: JsonValue,
}

impl DebugEntry {
    pub fn new(source: DebugSource, label: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            source,
            label: label.into(),
            payload,
        }
    }
}

/// Observer for request/response traffic. Never influences control flow.
pub trait DebugSink: Send + Sync {
    fn record(&self, entry: DebugEntry);
}

/// Forwards entries to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDebugSink;

impl DebugSink for TracingDebugSink {
    fn record(&self, entry: DebugEntry) {
        debug!(
            target: "codex_monitor::debug",
            source = entry.source.as_str(),
            label = entry.label.as_str(),
            timestamp_ms = entry.timestamp_ms,
            "{}",
            entry.payload
        );
    }
}
