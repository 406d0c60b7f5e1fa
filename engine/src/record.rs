//! Record and tombstone types.

use crate::{timestamp, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use uuid::Uuid;

/// A live record within one (workspace, app) scope.
///
/// The payload is opaque to the sync core; `updated_at` is the sole
/// conflict-resolution key. Whichever side of a conflict carries the
/// later value replaces the other wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Stable client-generated identifier
    pub id: RecordId,
    /// Last modification time (ISO-8601)
    pub updated_at: String,
    /// App data, never inspected beyond validation
    pub payload: Value,
}

impl Record {
    /// Create a record with a fresh id, stamped at the current instant.
    pub fn new(payload: Value) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), payload)
    }

    /// Create a record with a caller-supplied id, stamped at the
    /// current instant.
    pub fn with_id(id: impl Into<RecordId>, payload: Value) -> Self {
        let mut record = Self {
            id: id.into(),
            updated_at: timestamp::now_iso(),
            payload,
        };
        record.embed_timestamp();
        record
    }

    /// Adopt a remote payload at the given timestamp.
    pub fn from_remote(id: impl Into<RecordId>, updated_at: String, payload: Value) -> Self {
        let mut record = Self {
            id: id.into(),
            updated_at,
            payload,
        };
        record.embed_timestamp();
        record
    }

    /// Advance `updated_at` to the current instant.
    ///
    /// `updated_at` is non-decreasing across a record's local edit
    /// history: if the clock reads earlier than the stored value, the
    /// stored value is kept.
    pub fn touch(&mut self) {
        let now = timestamp::now_iso();
        if timestamp::compare(&now, &self.updated_at) != Ordering::Less {
            self.updated_at = now;
        }
        self.embed_timestamp();
    }

    /// Replace the payload and advance `updated_at`.
    pub fn replace_payload(&mut self, payload: Value) {
        self.payload = payload;
        self.touch();
    }

    /// Mirror `updated_at` into the payload so payloads round-trip
    /// through other replicas with their timestamp intact. Non-object
    /// payloads are left alone.
    fn embed_timestamp(&mut self) {
        if let Some(obj) = self.payload.as_object_mut() {
            obj.insert(
                "updatedAt".to_string(),
                Value::String(self.updated_at.clone()),
            );
        }
    }

    /// The timestamp embedded in the payload itself, if any.
    pub fn embedded_timestamp(&self) -> Option<&str> {
        self.payload.get("updatedAt").and_then(Value::as_str)
    }
}

/// A deletion marker, kept locally until a push is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    /// Id of the deleted record
    pub id: RecordId,
    /// When the deletion occurred (ISO-8601)
    pub updated_at: String,
}

impl Tombstone {
    /// Create a tombstone at the given timestamp.
    pub fn new(id: impl Into<RecordId>, updated_at: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            updated_at: updated_at.into(),
        }
    }
}
