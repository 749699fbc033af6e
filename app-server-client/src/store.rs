use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use codex_monitor_thread_state::ThreadAction;
use codex_monitor_thread_state::ThreadsState;
use codex_monitor_thread_state::reduce;
use serde_json::Value as JsonValue;
use tokio::sync::watch;
use tracing::warn;

use crate::activity::ActivityStore;
use crate::debug::DebugEntry;
use crate::debug::DebugSink;
use crate::debug::DebugSource;

/// Owner of the [`ThreadsState`] tree.
///
/// `dispatch` runs the pure reducer and then performs the side effects that
/// belong to an action: persisting user activity and publishing the new state
/// to subscribers. The state lock is never held across an `.await`.
pub struct ThreadStore {
    state: watch::Sender<ThreadsState>,
    activity: Mutex<ActivityStore>,
    debug_sink: Option<Arc<dyn DebugSink>>,
}

impl ThreadStore {
    pub fn new(activity: ActivityStore, debug_sink: Option<Arc<dyn DebugSink>>) -> Self {
        let (state, _) = watch::channel(ThreadsState::default());
        Self {
            state,
            activity: Mutex::new(activity),
            debug_sink,
        }
    }

    pub fn snapshot(&self) -> ThreadsState {
        self.state.borrow().clone()
    }

    /// Read from the current state without cloning it.
    pub fn read<T>(&self, f: impl FnOnce(&ThreadsState) -> T) -> T {
        f(&self.state.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<ThreadsState> {
        self.state.subscribe()
    }

    pub fn dispatch(&self, action: ThreadAction) {
        self.dispatch_all(std::iter::once(action));
    }

    /// Apply `actions` in order and notify subscribers once.
    pub fn dispatch_all(&self, actions: impl IntoIterator<Item = ThreadAction>) {
        self.dispatch_with(|_| actions.into_iter().collect());
    }

    /// Compute actions from the current state and apply them under the same
    /// lock, so nothing else lands in between.
    pub fn dispatch_with(&self, plan: impl FnOnce(&ThreadsState) -> Vec<ThreadAction>) {
        let mut touched_activity = false;
        self.state.send_modify(|state| {
            for action in plan(state) {
                if let ThreadAction::AddUserMessage {
                    workspace_id,
                    thread_id,
                    timestamp_ms,
                    ..
                } = &action
                {
                    self.activity_store()
                        .record(workspace_id, thread_id, *timestamp_ms);
                    touched_activity = true;
                }
                let current = std::mem::take(state);
                *state = reduce(current, action);
            }
        });
        if touched_activity {
            self.persist_activity();
        }
    }

    pub fn last_activity(&self, workspace_id: &str, thread_id: &str) -> Option<i64> {
        self.activity_store().get(workspace_id, thread_id)
    }

    pub fn forget_activity(&self, workspace_id: &str, thread_id: &str) {
        self.activity_store().forget(workspace_id, thread_id);
        self.persist_activity();
    }

    pub fn debug(&self, source: DebugSource, label: &str, payload: JsonValue) {
        if let Some(sink) = &self.debug_sink {
            sink.record(DebugEntry::new(source, label, payload));
        }
    }

    fn activity_store(&self) -> std::sync::MutexGuard<'_, ActivityStore> {
        self.activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn persist_activity(&self) {
        if let Err(err) = self.activity_store().save() {
            warn!("failed to persist thread activity: {err}");
        }
    }
}
