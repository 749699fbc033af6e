use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;

use codex_monitor_protocol::ReasoningEffort;
use codex_monitor_protocol::SandboxMode;
use codex_monitor_protocol::SandboxPolicy;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;

/// Overrides the monitor home directory.
pub const MONITOR_HOME_ENV: &str = "CODEX_MONITOR_HOME";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_ACTIVITY_FILE_NAME: &str = "thread-activity.json";
const DEFAULT_HOME_DIR_NAME: &str = ".codex-monitor";

/// Directory holding `config.toml` and the activity file: `$CODEX_MONITOR_HOME`
/// when set, else `~/.codex-monitor`. It need not exist yet; a missing config
/// means defaults and the activity file creates its parent on first save.
pub fn monitor_home() -> Result<PathBuf, ConfigError> {
    monitor_home_from(std::env::var_os(MONITOR_HOME_ENV), dirs::home_dir())
}

fn monitor_home_from(
    env_value: Option<OsString>,
    user_home: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    let home = match env_value.filter(|value| !value.is_empty()) {
        Some(value) => std::path::absolute(PathBuf::from(value)).map_err(ConfigError::Home)?,
        None => user_home
            .ok_or(ConfigError::NoUserHome)?
            .join(DEFAULT_HOME_DIR_NAME),
    };
    if home.exists() && !home.is_dir() {
        return Err(ConfigError::HomeNotADirectory(home));
    }
    Ok(home)
}

/// How much of the machine a turn may touch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    ReadOnly,
    /// Write access limited to the workspace.
    #[default]
    Current,
    FullAccess,
}

impl AccessMode {
    pub fn sandbox_mode(self) -> SandboxMode {
        match self {
            AccessMode::ReadOnly => SandboxMode::ReadOnly,
            AccessMode::Current => SandboxMode::WorkspaceWrite,
            AccessMode::FullAccess => SandboxMode::DangerFullAccess,
        }
    }

    pub fn sandbox_policy(self, workspace_path: &Path) -> SandboxPolicy {
        match self {
            AccessMode::ReadOnly => SandboxPolicy::ReadOnly,
            AccessMode::Current => SandboxPolicy::WorkspaceWrite {
                writable_roots: vec![workspace_path.to_path_buf()],
                network_access: true,
            },
            AccessMode::FullAccess => SandboxPolicy::DangerFullAccess,
        }
    }
}

/// Settings read from `$CODEX_MONITOR_HOME/config.toml`. Every field is
/// optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Model override sent with every `turn/start`.
    pub model: Option<String>,
    pub effort: Option<ReasoningEffort>,
    pub access_mode: AccessMode,
    pub thread_list_page_size: u32,
    /// Upper bound on `thread/list` pages fetched per refresh.
    pub max_thread_list_pages: usize,
    /// Consecutive failed sends of one queued message before the thread's
    /// queue pauses until the next user send.
    pub queue_flush_retry_limit: u32,
    /// Where last-activity timestamps are persisted. Relative paths resolve
    /// against the monitor home. `None` keeps them in memory only.
    pub activity_file: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            model: None,
            effort: None,
            access_mode: AccessMode::default(),
            thread_list_page_size: 50,
            max_thread_list_pages: 10,
            queue_flush_retry_limit: 3,
            activity_file: Some(PathBuf::from(DEFAULT_ACTIVITY_FILE_NAME)),
        }
    }
}

impl MonitorConfig {
    /// Load from the monitor home, falling back to defaults when the file is
    /// absent.
    pub fn load() -> Result<(Self, PathBuf), ConfigError> {
        let home = monitor_home()?;
        let config = Self::load_from_dir(&home)?;
        Ok((config, home))
    }

    pub fn load_from_dir(home: &Path) -> Result<Self, ConfigError> {
        let path = home.join(CONFIG_FILE_NAME);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn activity_path(&self, home: &Path) -> Option<PathBuf> {
        self.activity_file.as_ref().map(|file| {
            if file.is_absolute() {
                file.clone()
            } else {
                home.join(file)
            }
        })
    }
}
