use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMessage {
    pub id: String,
    pub text: String,
    pub created_at_ms: i64,
}

#[derive(Debug, Default)]
struct ThreadQueue {
    messages: VecDeque<QueuedMessage>,
    flushing: bool,
    consecutive_failures: u32,
    paused: bool,
}

/// Messages typed while a thread was busy, held per thread until it goes
/// idle. At most one queued message per thread is in flight at a time.
#[derive(Debug, Default)]
pub struct MessageQueue {
    threads: Mutex<HashMap<String, ThreadQueue>>,
}

impl MessageQueue {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ThreadQueue>> {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the back. A new user message also lifts a retry pause.
    pub fn enqueue(&self, thread_id: &str, message: QueuedMessage) {
        let mut threads = self.lock();
        let queue = threads.entry(thread_id.to_string()).or_default();
        queue.messages.push_back(message);
        queue.paused = false;
        queue.consecutive_failures = 0;
    }

    pub fn queued(&self, thread_id: &str) -> Vec<QueuedMessage> {
        self.lock()
            .get(thread_id)
            .map(|queue| queue.messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_pending(&self, thread_id: &str) -> bool {
        self.lock()
            .get(thread_id)
            .is_some_and(|queue| !queue.messages.is_empty())
    }

    pub fn is_paused(&self, thread_id: &str) -> bool {
        self.lock()
            .get(thread_id)
            .is_some_and(|queue| queue.paused)
    }

    pub fn is_flushing(&self, thread_id: &str) -> bool {
        self.lock()
            .get(thread_id)
            .is_some_and(|queue| queue.flushing)
    }

    /// Threads holding messages that are neither paused nor mid-flush.
    pub fn ready_threads(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(_, queue)| !queue.messages.is_empty() && !queue.flushing && !queue.paused)
            .map(|(thread_id, _)| thread_id.clone())
            .collect()
    }

    pub fn remove_thread(&self, thread_id: &str) {
        self.lock().remove(thread_id);
    }

    /// Pop the next message and mark the thread as flushing. The returned
    /// guard clears the flag when dropped and puts the message back at the
    /// front unless [`FlushGuard::succeeded`] was called.
    pub fn begin_flush(&self, thread_id: &str) -> Option<FlushGuard<'_>> {
        let mut threads = self.lock();
        let queue = threads.get_mut(thread_id)?;
        if queue.flushing || queue.paused {
            return None;
        }
        let message = queue.messages.pop_front()?;
        queue.flushing = true;
        Some(FlushGuard {
            queue: self,
            thread_id: thread_id.to_string(),
            message: Some(message),
            retry_limit: None,
        })
    }
}

pub struct FlushGuard<'a> {
    queue: &'a MessageQueue,
    thread_id: String,
    message: Option<QueuedMessage>,
    retry_limit: Option<u32>,
}

impl FlushGuard<'_> {
    pub fn message(&self) -> Option<&QueuedMessage> {
        self.message.as_ref()
    }

    pub fn succeeded(mut self) {
        self.message = None;
        let mut threads = self.queue.lock();
        if let Some(queue) = threads.get_mut(&self.thread_id) {
            queue.consecutive_failures = 0;
        }
    }

    /// Requeue at the front and count the failure; after `retry_limit`
    /// consecutive failures the thread's queue pauses.
    pub fn failed(mut self, retry_limit: u32) {
        self.retry_limit = Some(retry_limit);
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        let mut threads = self.queue.lock();
        let queue = threads.entry(self.thread_id.clone()).or_default();
        queue.flushing = false;
        let Some(message) = self.message.take() else {
            return;
        };
        queue.messages.push_front(message);
        if let Some(limit) = self.retry_limit {
            queue.consecutive_failures += 1;
            if queue.consecutive_failures >= limit {
                warn!(
                    thread_id = self.thread_id.as_str(),
                    failures = queue.consecutive_failures,
                    "pausing queued messages until the next send"
                );
                queue.paused = true;
            }
        }
    }
}
