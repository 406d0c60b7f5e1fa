//! User-facing sync status for the persistent status line.
//!
//! Sync failures never block local editing; they only change what this
//! status reports. The rendered label combines the last outcome message
//! with a relative "last sync" age.

use opsboard_engine::timestamp;

const STATUS_MESSAGE_LIMIT: usize = 220;

/// Visual tone of the status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusKind {
    #[default]
    Neutral,
    Ok,
    Error,
}

/// Snapshot of the sync state presented to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub kind: StatusKind,
    /// Message from the last pull/push outcome, empty before any sync.
    pub message: String,
    /// When the last successful pull or push finished.
    pub last_synced_at: Option<String>,
    /// Whether a request is currently in flight.
    pub pending: bool,
    /// Whether the session has an API URL and workspace key.
    pub configured: bool,
}

impl SyncStatus {
    pub(crate) fn initial(configured: bool) -> Self {
        Self {
            configured,
            ..Self::default()
        }
    }

    /// The status line text.
    pub fn label(&self) -> String {
        if self.pending {
            return "Sync in progress...".to_string();
        }
        if !self.message.is_empty() {
            return match &self.last_synced_at {
                Some(at) => {
                    format!("{} Last sync {}.", self.message, timestamp::relative_age(at))
                }
                None => self.message.clone(),
            };
        }
        if !self.configured {
            return "Local only. Set API URL and workspace key to share data.".to_string();
        }
        "Team sync ready. Use Pull Shared Data to load the latest workspace snapshot.".to_string()
    }
}

/// Collapse whitespace and truncate long error text for the status line.
pub(crate) fn compact_message(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.len() <= STATUS_MESSAGE_LIMIT {
        return collapsed;
    }
    let mut cut = STATUS_MESSAGE_LIMIT - 3;
    while !collapsed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &collapsed[..cut])
}
