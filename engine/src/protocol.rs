//! Wire types shared by the sync client and the remote store.
//!
//! All bodies are JSON with camelCase field names. Deserialization is
//! tolerant of the older snake_case spellings that earlier dashboard
//! builds emitted.

use crate::error::{Error, Result};
use crate::{Record, Tombstone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum entries per list in one sync request.
pub const MAX_SYNC_ENTRIES: usize = 10_000;

/// One record as it appears in a remote listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    /// Record id
    #[serde(alias = "client_id", alias = "id")]
    pub client_id: String,
    /// Remote modification time; when absent, reconciliation falls
    /// back to the payload's embedded timestamp
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<String>,
    /// Deletion marker
    #[serde(default)]
    pub deleted: bool,
    /// Record payload; absent for deletions
    #[serde(default)]
    pub payload: Option<Value>,
}

impl RemoteRecord {
    /// Live-record entry mirroring a local record.
    pub fn from_record(record: &Record) -> Self {
        Self {
            client_id: record.id.clone(),
            updated_at: Some(record.updated_at.clone()),
            deleted: false,
            payload: Some(record.payload.clone()),
        }
    }

    /// Deletion entry mirroring a local tombstone.
    pub fn from_tombstone(tombstone: &Tombstone) -> Self {
        Self {
            client_id: tombstone.id.clone(),
            updated_at: Some(tombstone.updated_at.clone()),
            deleted: true,
            payload: None,
        }
    }
}

/// Response body for `GET /ops/workspaces/{workspaceKey}/records`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsResponse {
    pub workspace_key: String,
    pub app_key: String,
    pub records: Vec<RemoteRecord>,
}

/// One upsert entry in a sync request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertEntry {
    pub id: String,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<String>,
    pub payload: Value,
}

/// One deletion entry in a sync request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionEntry {
    pub id: String,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<String>,
}

/// Request body for `POST /ops/workspaces/{workspaceKey}/sync`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    pub upserts: Vec<UpsertEntry>,
    #[serde(default)]
    pub deletions: Vec<DeletionEntry>,
}

impl SyncRequest {
    /// Build a request from the full local state: every live record as
    /// an upsert, every pending tombstone as a deletion.
    pub fn from_state(records: &[Record], tombstones: &[Tombstone]) -> Self {
        Self {
            upserts: records
                .iter()
                .map(|record| UpsertEntry {
                    id: record.id.clone(),
                    updated_at: Some(record.updated_at.clone()),
                    payload: record.payload.clone(),
                })
                .collect(),
            deletions: tombstones
                .iter()
                .map(|tombstone| DeletionEntry {
                    id: tombstone.id.clone(),
                    updated_at: Some(tombstone.updated_at.clone()),
                })
                .collect(),
        }
    }

    /// Validate list sizes: at least one entry overall, neither list
    /// over [`MAX_SYNC_ENTRIES`].
    pub fn validate(&self) -> Result<()> {
        if self.upserts.is_empty() && self.deletions.is_empty() {
            return Err(Error::EmptySyncRequest);
        }
        if self.upserts.len() > MAX_SYNC_ENTRIES {
            return Err(Error::SyncBatchTooLarge {
                kind: "upserts",
                len: self.upserts.len(),
                max: MAX_SYNC_ENTRIES,
            });
        }
        if self.deletions.len() > MAX_SYNC_ENTRIES {
            return Err(Error::SyncBatchTooLarge {
                kind: "deletions",
                len: self.deletions.len(),
                max: MAX_SYNC_ENTRIES,
            });
        }
        Ok(())
    }

    /// Total number of entries across both lists.
    pub fn len(&self) -> usize {
        self.upserts.len() + self.deletions.len()
    }

    /// True when both lists are empty.
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletions.is_empty()
    }
}

/// Response body for `POST /ops/workspaces/{workspaceKey}/sync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    /// Upserts the store actually applied (stale ones are skipped)
    pub applied_upserts: u64,
    /// Deletions the store actually applied
    pub applied_deletions: u64,
    /// Store-side clock at response time (ISO-8601)
    pub server_time: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn remote_record_accepts_older_spellings() {
        let entry: RemoteRecord = serde_json::from_value(json!({
            "client_id": "c1",
            "updated_at": "2024-01-01T00:00:00.000Z",
            "payload": {"name": "Acme"},
        }))
        .unwrap();
        assert_eq!(entry.client_id, "c1");
        assert_eq!(entry.updated_at.as_deref(), Some("2024-01-01T00:00:00.000Z"));
        assert!(!entry.deleted);

        let entry: RemoteRecord =
            serde_json::from_value(json!({"id": "c2", "deleted": true})).unwrap();
        assert_eq!(entry.client_id, "c2");
        assert!(entry.deleted);
        assert_eq!(entry.payload, None);
    }

    #[test]
    fn wire_fields_are_camel_case() {
        let response = SyncResponse {
            applied_upserts: 3,
            applied_deletions: 1,
            server_time: "2024-01-01T00:00:00.000Z".to_string(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["appliedUpserts"], 3);
        assert_eq!(value["appliedDeletions"], 1);
        assert!(value["serverTime"].is_string());

        let request = SyncRequest::from_state(
            &[Record::from_remote(
                "c1",
                "2024-01-01T00:00:00.000Z".to_string(),
                json!({"name": "Acme"}),
            )],
            &[Tombstone::new("c2", "2024-01-02T00:00:00.000Z")],
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["upserts"][0]["id"], "c1");
        assert_eq!(value["upserts"][0]["updatedAt"], "2024-01-01T00:00:00.000Z");
        assert_eq!(value["deletions"][0]["id"], "c2");
    }

    #[test]
    fn validate_rejects_empty_request() {
        let request = SyncRequest::default();
        assert_eq!(request.validate(), Err(Error::EmptySyncRequest));
    }

    #[test]
    fn validate_rejects_oversized_lists() {
        let upsert = UpsertEntry {
            id: "c1".to_string(),
            updated_at: None,
            payload: json!({}),
        };
        let request = SyncRequest {
            upserts: vec![upsert; MAX_SYNC_ENTRIES + 1],
            deletions: Vec::new(),
        };
        assert!(matches!(
            request.validate(),
            Err(Error::SyncBatchTooLarge { kind: "upserts", .. })
        ));

        let deletion = DeletionEntry {
            id: "c1".to_string(),
            updated_at: None,
        };
        let request = SyncRequest {
            upserts: Vec::new(),
            deletions: vec![deletion; MAX_SYNC_ENTRIES + 1],
        };
        assert!(matches!(
            request.validate(),
            Err(Error::SyncBatchTooLarge { kind: "deletions", .. })
        ));
    }

    #[test]
    fn validate_accepts_boundary_sizes() {
        let deletion = DeletionEntry {
            id: "c1".to_string(),
            updated_at: None,
        };
        let request = SyncRequest {
            upserts: Vec::new(),
            deletions: vec![deletion; MAX_SYNC_ENTRIES],
        };
        assert!(request.validate().is_ok());
    }
}
