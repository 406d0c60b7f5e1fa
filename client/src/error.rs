//! Error types for the sync client.

use thiserror::Error;

/// All failure modes a pull or push can surface.
///
/// Display strings double as user-facing status text, so they are
/// written as sentences rather than debug dumps.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The session has no API URL or workspace key.
    #[error("Local only. Set API URL and workspace key to share data.")]
    NotConfigured,

    /// Another pull or push is already in flight.
    #[error("Sync in progress. Please wait.")]
    Busy,

    /// The HTTP request hit the per-request timeout.
    #[error("Request timed out after {seconds}s")]
    RequestTimeout { seconds: u64 },

    /// The pending guard expired before the request handler resolved.
    #[error("Sync timed out. Please retry.")]
    GuardTimeout,

    /// The server answered with a non-success status.
    #[error("Server rejected the request ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Connection-level failure.
    #[error("{0}")]
    Transport(String),

    /// Validation or state error from the sync engine.
    #[error(transparent)]
    Engine(#[from] opsboard_engine::Error),

    /// Snapshot file could not be read or written.
    #[error("snapshot io: {0}")]
    Snapshot(#[from] std::io::Error),
}

impl SyncError {
    /// Status-line form of the error: whitespace collapsed and long
    /// text truncated so one bad response cannot flood the UI.
    pub fn compact(&self) -> String {
        crate::status::compact_message(&self.to_string())
    }
}
