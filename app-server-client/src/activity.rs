use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use tracing::warn;

use crate::error::ActivityStoreError;

type ActivityMap = HashMap<String, HashMap<String, i64>>;

/// Last user activity per `workspace -> thread`, in epoch milliseconds.
///
/// Backed by a single JSON file. A missing or unreadable file is an empty map;
/// writes are best effort and the last writer wins.
#[derive(Debug, Default)]
pub struct ActivityStore {
    path: Option<PathBuf>,
    entries: ActivityMap,
}

impl ActivityStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn load(path: PathBuf) -> Self {
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!("ignoring corrupt activity file {}: {err}", path.display());
                ActivityMap::new()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => ActivityMap::new(),
            Err(err) => {
                warn!("failed to read activity file {}: {err}", path.display());
                ActivityMap::new()
            }
        };
        Self {
            path: Some(path),
            entries,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, workspace_id: &str, thread_id: &str) -> Option<i64> {
        self.entries
            .get(workspace_id)
            .and_then(|threads| threads.get(thread_id))
            .copied()
    }

    pub fn record(&mut self, workspace_id: &str, thread_id: &str, timestamp_ms: i64) {
        self.entries
            .entry(workspace_id.to_string())
            .or_default()
            .insert(thread_id.to_string(), timestamp_ms);
    }

    pub fn forget(&mut self, workspace_id: &str, thread_id: &str) {
        if let Some(threads) = self.entries.get_mut(workspace_id) {
            threads.remove(thread_id);
            if threads.is_empty() {
                self.entries.remove(workspace_id);
            }
        }
    }

    pub fn save(&self) -> Result<(), ActivityStoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(&self.entries)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ActivityStoreError::Write {
                path: path.clone(),
                source,
            })?;
        }
        std::fs::write(path, bytes).map_err(|source| ActivityStoreError::Write {
            path: path.clone(),
            source,
        })
    }
}
