//! Orchestration on top of the thread reducer: talks to one app-server per
//! workspace through an [`AppServerBackend`] and keeps a [`ThreadStore`] in
//! sync with what the server reports.
//!
//! All user-facing flows are infallible from the caller's point of view.
//! Failures are logged, forwarded to the optional [`DebugSink`], and, where
//! the user is waiting on a turn, surfaced as an inline message.

mod activity;
mod backend;
mod config;
mod debug;
mod error;
mod queue;
mod response;
mod review;
mod store;
mod threads;
mod turns;

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use codex_monitor_thread_state::ThreadAction;
use codex_monitor_thread_state::ThreadsState;
use codex_monitor_thread_state::WorkspaceEvent;
use codex_monitor_thread_state::actions_for_event;
use serde_json::json;
use tokio::sync::watch;
use tracing::info;

pub use activity::ActivityStore;
pub use backend::AppServerBackend;
pub use config::AccessMode;
pub use config::CONFIG_FILE_NAME;
pub use config::DEFAULT_ACTIVITY_FILE_NAME;
pub use config::MONITOR_HOME_ENV;
pub use config::MonitorConfig;
pub use config::monitor_home;
pub use debug::DebugEntry;
pub use debug::DebugSink;
pub use debug::DebugSource;
pub use debug::TracingDebugSink;
pub use error::ActivityStoreError;
pub use error::BackendError;
pub use error::ConfigError;
pub use error::Result;
pub use queue::FlushGuard;
pub use queue::MessageQueue;
pub use queue::QueuedMessage;
pub use review::parse_review_target;
pub use review::review_label;
pub use store::ThreadStore;
pub use turns::ApprovalDecision;
pub use turns::SESSION_STOPPED_MESSAGE;
pub use turns::SendOutcome;

/// A project directory served by its own app-server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceInfo {
    pub id: String,
    pub path: PathBuf,
}

impl WorkspaceInfo {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }
}

pub struct MonitorClient {
    backend: Arc<dyn AppServerBackend>,
    store: ThreadStore,
    config: MonitorConfig,
    workspaces: Mutex<HashMap<String, WorkspaceInfo>>,
    /// Threads whose history has been fetched (or that were created here).
    /// Claimed before the resume request is awaited so concurrent sends do
    /// not resume twice.
    loaded_threads: Mutex<HashSet<String>>,
    queue: MessageQueue,
    /// Serializes implicit `thread/start` so two quick sends on a workspace
    /// without an active thread share one new thread.
    thread_start: tokio::sync::Mutex<()>,
}

impl MonitorClient {
    pub fn new(
        backend: Arc<dyn AppServerBackend>,
        config: MonitorConfig,
        activity: ActivityStore,
        debug_sink: Option<Arc<dyn DebugSink>>,
    ) -> Self {
        Self {
            backend,
            store: ThreadStore::new(activity, debug_sink),
            config,
            workspaces: Mutex::new(HashMap::new()),
            loaded_threads: Mutex::new(HashSet::new()),
            queue: MessageQueue::default(),
            thread_start: tokio::sync::Mutex::new(()),
        }
    }

    /// Build a client whose activity map lives where `config` says, relative
    /// to `home`.
    pub fn from_config(
        backend: Arc<dyn AppServerBackend>,
        config: MonitorConfig,
        home: &Path,
        debug_sink: Option<Arc<dyn DebugSink>>,
    ) -> Self {
        let activity = match config.activity_path(home) {
            Some(path) => ActivityStore::load(path),
            None => ActivityStore::in_memory(),
        };
        Self::new(backend, config, activity, debug_sink)
    }

    pub fn store(&self) -> &ThreadStore {
        &self.store
    }

    pub fn subscribe(&self) -> watch::Receiver<ThreadsState> {
        self.store.subscribe()
    }

    pub fn snapshot(&self) -> ThreadsState {
        self.store.snapshot()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    pub fn connect_workspace(&self, workspace: WorkspaceInfo) {
        info!(
            workspace_id = workspace.id.as_str(),
            path = %workspace.path.display(),
            "workspace connected"
        );
        self.workspaces_lock()
            .insert(workspace.id.clone(), workspace);
    }

    pub fn disconnect_workspace(&self, workspace_id: &str) {
        if self.workspaces_lock().remove(workspace_id).is_some() {
            info!(workspace_id, "workspace disconnected");
        }
    }

    pub fn workspace(&self, workspace_id: &str) -> Option<WorkspaceInfo> {
        self.workspaces_lock().get(workspace_id).cloned()
    }

    pub fn set_active_thread(&self, workspace_id: &str, thread_id: Option<&str>) {
        self.store.dispatch(ThreadAction::SetActiveThreadId {
            workspace_id: workspace_id.to_string(),
            thread_id: thread_id.map(str::to_string),
        });
    }

    /// Apply one pushed notification or server request.
    ///
    /// Actions are computed against the state they are applied to, so events
    /// handled one at a time keep their arrival order per thread.
    pub fn handle_event(&self, event: &WorkspaceEvent) {
        self.store.debug(
            DebugSource::Event,
            event.method(),
            json!({ "workspaceId": event.workspace_id }),
        );
        let now = now_ms();
        self.store
            .dispatch_with(|state| actions_for_event(state, event, now));
    }

    fn workspaces_lock(&self) -> MutexGuard<'_, HashMap<String, WorkspaceInfo>> {
        self.workspaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn loaded_lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.loaded_threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_thread_loaded(&self, thread_id: &str) -> bool {
        self.loaded_lock().contains(thread_id)
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
