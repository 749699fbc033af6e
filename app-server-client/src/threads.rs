use std::cmp::Reverse;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;

use codex_monitor_protocol::AskForApproval;
use codex_monitor_protocol::GetAccountRateLimitsParams;
use codex_monitor_protocol::Thread;
use codex_monitor_protocol::ThreadArchiveParams;
use codex_monitor_protocol::ThreadListParams;
use codex_monitor_protocol::ThreadResumeParams;
use codex_monitor_protocol::ThreadStartParams;
use codex_monitor_thread_state::THREAD_NAME_MAX_CHARS;
use codex_monitor_thread_state::ThreadAction;
use codex_monitor_thread_state::ThreadSummary;
use codex_monitor_thread_state::items_from_turns;
use codex_monitor_thread_state::last_assistant_text;
use codex_monitor_thread_state::normalize_rate_limits;
use codex_monitor_thread_state::review_in_progress;
use codex_monitor_utils_string::truncate_preview;
use serde_json::Value as JsonValue;
use serde_json::json;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::MonitorClient;
use crate::debug::DebugSource;
use crate::response;
use crate::response::ReturnsThread;

impl MonitorClient {
    /// `thread/start` in the workspace directory; the new thread becomes
    /// active.
    pub async fn start_thread(&self, workspace_id: &str) -> Option<String> {
        let Some(workspace) = self.workspace(workspace_id) else {
            debug!(workspace_id, "cannot start a thread for an unknown workspace");
            return None;
        };
        let params = ThreadStartParams {
            model: self.config.model.clone(),
            cwd: Some(workspace.path.to_string_lossy().into_owned()),
            approval_policy: Some(AskForApproval::OnRequest),
            sandbox: Some(self.config.access_mode.sandbox_mode()),
            ..Default::default()
        };
        self.debug_request("thread/start", &params);
        let result = self.backend.start_thread(workspace_id, params).await;
        let thread = self.thread_or_log::<ThreadStartParams>(result)?;

        self.loaded_lock().insert(thread.id.clone());
        self.store.dispatch_all([
            ThreadAction::EnsureThread {
                workspace_id: workspace_id.to_string(),
                thread_id: thread.id.clone(),
            },
            ThreadAction::SetActiveThreadId {
                workspace_id: workspace_id.to_string(),
                thread_id: Some(thread.id.clone()),
            },
        ]);
        info!(workspace_id, thread_id = thread.id.as_str(), "thread started");
        Some(thread.id)
    }

    /// Fetch a thread's history and merge it with what is shown locally.
    ///
    /// Without `force` a thread already loaded in this session is left alone.
    /// Local items win over the fetched ones only when they changed while the
    /// request was in flight.
    pub async fn resume_thread(&self, workspace_id: &str, thread_id: &str, force: bool) -> bool {
        {
            let mut loaded = self.loaded_lock();
            if loaded.contains(thread_id) && !force {
                return true;
            }
            loaded.insert(thread_id.to_string());
        }
        let baseline_revision = self.store.read(|state| state.item_revision(thread_id));

        let params = ThreadResumeParams {
            thread_id: thread_id.to_string(),
            ..Default::default()
        };
        self.debug_request("thread/resume", &params);
        let result = self.backend.resume_thread(workspace_id, params).await;
        let Some(thread) = self.thread_or_log::<ThreadResumeParams>(result) else {
            self.loaded_lock().remove(thread_id);
            return false;
        };

        let items = items_from_turns(&thread.turns);
        let is_reviewing = review_in_progress(&items);
        let last_agent_text = last_assistant_text(&items).map(str::to_string);
        let server_ms = server_timestamp_ms(&thread);

        self.store.dispatch_with(|state| {
            let mut actions = vec![
                ThreadAction::EnsureThread {
                    workspace_id: workspace_id.to_string(),
                    thread_id: thread_id.to_string(),
                },
                ThreadAction::MergeThreadItems {
                    thread_id: thread_id.to_string(),
                    items,
                    baseline_revision,
                },
                ThreadAction::MarkReviewing {
                    thread_id: thread_id.to_string(),
                    is_reviewing,
                },
            ];
            if let Some(text) = last_agent_text {
                actions.push(ThreadAction::SetLastAgentMessage {
                    thread_id: thread_id.to_string(),
                    text,
                    timestamp_ms: server_ms,
                });
            }
            let auto_named = state
                .thread(workspace_id, thread_id)
                .is_none_or(|summary| summary.auto_named);
            let name = server_name(&thread).or_else(|| {
                auto_named
                    .then(|| preview_name(&thread))
                    .flatten()
            });
            if let Some(name) = name {
                actions.push(ThreadAction::RenameThread {
                    workspace_id: workspace_id.to_string(),
                    thread_id: thread_id.to_string(),
                    name,
                });
            }
            actions
        });
        info!(workspace_id, thread_id, "thread resumed");
        true
    }

    /// Page through `thread/list`, keep the threads rooted at the workspace
    /// directory and rank them by recency.
    ///
    /// Recency is the later of the locally recorded user activity and the
    /// server's own timestamps. Threads created in this session that the
    /// server does not list yet are kept.
    pub async fn list_threads_for_workspace(&self, workspace_id: &str) -> Vec<ThreadSummary> {
        let Some(workspace) = self.workspace(workspace_id) else {
            return Vec::new();
        };
        let mut listed: Vec<Thread> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut fetched_any = false;

        for _ in 0..self.config.max_thread_list_pages {
            let params = ThreadListParams {
                cursor: cursor.clone(),
                limit: Some(self.config.thread_list_page_size),
                model_providers: None,
            };
            self.debug_request("thread/list", &params);
            let result = match self.backend.list_threads(workspace_id, params).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(workspace_id, "thread/list failed: {err}");
                    self.store.debug(
                        DebugSource::Error,
                        "thread/list",
                        json!({ "error": err.to_string() }),
                    );
                    break;
                }
            };
            self.store
                .debug(DebugSource::Server, "thread/list", result.clone());
            if let Some(message) = response::embedded_error(&result) {
                warn!(workspace_id, "thread/list returned an error: {message}");
                break;
            }
            fetched_any = true;

            let (page, next_cursor) = response::thread_page(&result);
            for thread in page {
                if same_directory(&thread.cwd, &workspace.path) && seen.insert(thread.id.clone()) {
                    listed.push(thread);
                }
            }
            match next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        if !fetched_any {
            return self.store.read(|state| state.threads(workspace_id).to_vec());
        }

        let activity: HashMap<String, i64> = listed
            .iter()
            .filter_map(|thread| {
                self.store
                    .last_activity(workspace_id, &thread.id)
                    .map(|ms| (thread.id.clone(), ms))
            })
            .collect();
        let loaded: HashSet<String> = self.loaded_lock().clone();

        let mut summaries = Vec::new();
        self.store.dispatch_with(|state| {
            let existing = state.threads(workspace_id);
            let mut next: Vec<ThreadSummary> = listed
                .iter()
                .map(|thread| {
                    let previous = existing.iter().find(|summary| summary.id == thread.id);
                    let server_ms = server_timestamp_ms(thread);
                    let local_ms = activity.get(&thread.id).copied().unwrap_or(0);
                    let updated_at_ms = server_ms
                        .max(local_ms)
                        .max(previous.map_or(0, |summary| summary.updated_at_ms));
                    let (name, auto_named) = match (server_name(thread), previous) {
                        (Some(name), _) => (name, false),
                        (None, Some(previous)) if !previous.auto_named => {
                            (previous.name.clone(), false)
                        }
                        (None, previous) => match preview_name(thread) {
                            Some(name) => (name, false),
                            None => (
                                previous.map_or_else(String::new, |summary| summary.name.clone()),
                                true,
                            ),
                        },
                    };
                    ThreadSummary {
                        id: thread.id.clone(),
                        name,
                        updated_at_ms,
                        auto_named,
                    }
                })
                .collect();
            next.extend(
                existing
                    .iter()
                    .filter(|summary| loaded.contains(&summary.id) && !seen.contains(&summary.id))
                    .cloned(),
            );
            next.sort_by_key(|summary| Reverse(summary.updated_at_ms));
            for (index, summary) in next.iter_mut().enumerate() {
                if summary.name.is_empty() {
                    summary.name = format!("Agent {}", index + 1);
                }
            }

            let mut actions = vec![ThreadAction::SetThreadSummaries {
                workspace_id: workspace_id.to_string(),
                threads: next.clone(),
            }];
            actions.extend(listed.iter().filter_map(|thread| {
                let preview = thread.preview.trim();
                (!preview.is_empty()).then(|| ThreadAction::SetLastAgentMessage {
                    thread_id: thread.id.clone(),
                    text: preview.to_string(),
                    timestamp_ms: server_timestamp_ms(thread),
                })
            }));
            summaries = next;
            actions
        });
        summaries
    }

    /// `thread/archive`, then forget everything kept locally for the thread.
    pub async fn archive_thread(&self, workspace_id: &str, thread_id: &str) -> bool {
        let params = ThreadArchiveParams {
            thread_id: thread_id.to_string(),
        };
        self.debug_request("thread/archive", &params);
        match self.backend.archive_thread(workspace_id, params).await {
            Ok(result) => {
                self.store
                    .debug(DebugSource::Server, "thread/archive", result.clone());
                if let Some(message) = response::embedded_error(&result) {
                    warn!(thread_id, "thread/archive returned an error: {message}");
                    return false;
                }
                if response::decode::<ThreadArchiveParams>(&result).is_none() {
                    return false;
                }
            }
            Err(err) => {
                warn!(thread_id, "thread/archive failed: {err}");
                self.store.debug(
                    DebugSource::Error,
                    "thread/archive",
                    json!({ "error": err.to_string() }),
                );
                return false;
            }
        }

        self.store.dispatch(ThreadAction::RemoveThread {
            workspace_id: workspace_id.to_string(),
            thread_id: thread_id.to_string(),
        });
        self.loaded_lock().remove(thread_id);
        self.queue.remove_thread(thread_id);
        self.store.forget_activity(workspace_id, thread_id);
        info!(workspace_id, thread_id, "thread archived");
        true
    }

    pub async fn refresh_rate_limits(&self, workspace_id: &str) -> bool {
        let result = match self.backend.account_rate_limits(workspace_id).await {
            Ok(result) => result,
            Err(err) => {
                warn!(workspace_id, "account/rateLimits/read failed: {err}");
                return false;
            }
        };
        self.store
            .debug(DebugSource::Server, "account/rateLimits/read", result.clone());
        let rate_limits = response::decode::<GetAccountRateLimitsParams>(&result)
            .and_then(|response| normalize_rate_limits(&response.rate_limits));
        match rate_limits {
            Some(rate_limits) => {
                self.store.dispatch(ThreadAction::SetRateLimits {
                    workspace_id: workspace_id.to_string(),
                    rate_limits,
                });
                true
            }
            None => {
                debug!(workspace_id, "rate limit response had no readable window");
                false
            }
        }
    }

    fn thread_or_log<M: ReturnsThread>(&self, result: crate::Result<JsonValue>) -> Option<Thread> {
        let label = M::METHOD;
        let result = match result {
            Ok(result) => result,
            Err(err) => {
                warn!("{label} failed: {err}");
                self.store
                    .debug(DebugSource::Error, label, json!({ "error": err.to_string() }));
                return None;
            }
        };
        self.store.debug(DebugSource::Server, label, result.clone());
        if let Some(message) = response::embedded_error(&result) {
            warn!("{label} returned an error: {message}");
            return None;
        }
        let thread = response::thread::<M>(&result);
        if thread.is_none() {
            warn!("{label} response carried no thread");
        }
        thread
    }
}

fn server_timestamp_ms(thread: &Thread) -> i64 {
    thread.created_at.max(thread.updated_at).saturating_mul(1000)
}

fn server_name(thread: &Thread) -> Option<String> {
    thread
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn preview_name(thread: &Thread) -> Option<String> {
    let name = truncate_preview(&thread.preview, THREAD_NAME_MAX_CHARS);
    (!name.is_empty()).then_some(name)
}

/// Paths compare equal regardless of a trailing separator.
fn same_directory(a: &Path, b: &Path) -> bool {
    fn normalized(path: &Path) -> String {
        let text = path.to_string_lossy();
        let trimmed = text.trim_end_matches(['/', '\\']);
        if trimmed.is_empty() {
            text.into_owned()
        } else {
            trimmed.to_string()
        }
    }
    normalized(a) == normalized(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn trailing_separator_is_ignored() {
        assert!(same_directory(Path::new("/repo/"), Path::new("/repo")));
        assert!(!same_directory(Path::new("/repo/a"), Path::new("/repo")));
        assert!(same_directory(Path::new("/"), Path::new("/")));
    }

    #[test]
    fn server_timestamp_prefers_the_later_field() {
        let thread: Thread = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "createdAt": 10,
            "updatedAt": 25,
        }))
        .unwrap_or_else(|err| panic!("thread fixture: {err}"));
        assert_eq!(server_timestamp_ms(&thread), 25_000);
    }
}
