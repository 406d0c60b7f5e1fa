//! Sync configuration for one workspace connection.

use crate::error::SyncError;
use opsboard_engine::scope;
use std::path::PathBuf;
use std::time::Duration;

/// Timeout applied to each pull/push HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Extra slack the pending guard allows past the request timeout
/// before it forcibly clears a stuck in-flight state.
pub const DEFAULT_GUARD_SLACK: Duration = Duration::from_secs(5);

/// Interval between automatic silent pulls.
pub const DEFAULT_PULL_INTERVAL: Duration = Duration::from_secs(15);

/// Debounce window coalescing mutation-triggered pushes.
pub const DEFAULT_PUSH_DEBOUNCE: Duration = Duration::from_millis(1200);

/// Settings for a [`SyncSession`](crate::SyncSession).
///
/// A session is constructed per workspace connection; changing the
/// endpoint or workspace means constructing a new session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the sync server, without a trailing slash.
    pub api_url: Option<String>,
    /// Normalized workspace key scoping this session's records.
    pub workspace_key: Option<String>,
    /// File the store snapshot is persisted to, when set.
    pub snapshot_path: Option<PathBuf>,
    pub request_timeout: Duration,
    pub guard_slack: Duration,
    pub pull_interval: Duration,
    pub push_debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::local_only()
    }
}

impl SyncConfig {
    /// Configuration for a device that never talks to a sync server.
    pub fn local_only() -> Self {
        Self {
            api_url: None,
            workspace_key: None,
            snapshot_path: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            guard_slack: DEFAULT_GUARD_SLACK,
            pull_interval: DEFAULT_PULL_INTERVAL,
            push_debounce: DEFAULT_PUSH_DEBOUNCE,
        }
    }

    /// Configuration for a shared workspace.
    ///
    /// The API URL is normalized and the workspace key validated the
    /// same way the server validates it, so a key the server would
    /// reject fails here instead of on the first request.
    pub fn shared(api_url: &str, workspace_key: &str) -> Result<Self, SyncError> {
        let api_url = normalize_api_url(api_url).ok_or(SyncError::NotConfigured)?;
        let workspace_key = scope::workspace_key(workspace_key)?;
        Ok(Self {
            api_url: Some(api_url),
            workspace_key: Some(workspace_key),
            ..Self::local_only()
        })
    }

    /// Persist local state to `path` after every mutation and pull.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Whether both endpoint and workspace key are set.
    pub fn is_ready(&self) -> bool {
        self.api_url.is_some() && self.workspace_key.is_some()
    }

    pub(crate) fn endpoint(&self) -> Option<(String, String)> {
        match (&self.api_url, &self.workspace_key) {
            (Some(api_url), Some(key)) => Some((api_url.clone(), key.clone())),
            _ => None,
        }
    }
}

/// Strip trailing `?`/`#` characters and trailing slashes from a raw
/// API URL. Returns `None` when nothing usable remains.
pub fn normalize_api_url(raw: &str) -> Option<String> {
    let value = raw
        .trim()
        .trim_end_matches(['?', '#'])
        .trim_end_matches('/');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
