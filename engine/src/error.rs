//! Error types for the sync engine.

use thiserror::Error;

/// All possible errors from the sync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Scope errors
    #[error("invalid workspace key: {0}")]
    InvalidWorkspaceKey(String),

    #[error("invalid app key: {0}")]
    InvalidAppKey(String),

    // Payload validation errors
    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    // Sync request errors
    #[error("sync request must contain at least one upsert or deletion")]
    EmptySyncRequest,

    #[error("too many {kind} entries: {len} (max {max})")]
    SyncBatchTooLarge {
        kind: &'static str,
        len: usize,
        max: usize,
    },

    // State errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
