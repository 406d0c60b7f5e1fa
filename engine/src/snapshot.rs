//! Snapshot types for persisting and restoring store state.
//!
//! A snapshot is the on-disk form of one app's local state: a format
//! version, the live records, and the pending tombstones. Loading
//! tolerates the legacy bare-array layout (records only, no version
//! tag) and treats corrupt data as an empty store rather than failing.

use crate::error::{Error, Result};
use crate::store::LocalStore;
use crate::{timestamp, Record, Tombstone};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 2;

/// A point-in-time snapshot of one store's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Format version this document was written with
    pub version: u32,
    /// Live records
    pub records: Vec<Record>,
    /// Tombstones not yet acknowledged by the server
    pub deleted_records: Vec<Tombstone>,
}

impl StoreSnapshot {
    /// Capture the current state of a store.
    pub fn capture(store: &LocalStore) -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            records: store.records(),
            deleted_records: store.tombstones(),
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|err| Error::InvalidSnapshot(err.to_string()))
    }

    /// Parse a snapshot from JSON.
    ///
    /// Accepts the current versioned layout and the legacy bare-array
    /// form (a plain list of records, written before tombstones were
    /// persisted). Snapshots from a newer format version are rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|err| Error::InvalidSnapshot(err.to_string()))?;

        if let Some(records) = value.as_array() {
            let records = parse_records(records);
            return Ok(Self {
                version: SNAPSHOT_FORMAT_VERSION,
                records,
                deleted_records: Vec::new(),
            });
        }

        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidSnapshot("expected an object or array".to_string()))?;
        let version = object
            .get("version")
            .and_then(Value::as_u64)
            .unwrap_or(SNAPSHOT_FORMAT_VERSION as u64) as u32;
        if version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot version {version}"
            )));
        }

        let records = object
            .get("records")
            .and_then(Value::as_array)
            .map(|items| parse_records(items))
            .unwrap_or_default();
        let deleted_records = object
            .get("deletedRecords")
            .and_then(Value::as_array)
            .map(|items| parse_tombstones(items))
            .unwrap_or_default();

        Ok(Self {
            version: SNAPSHOT_FORMAT_VERSION,
            records,
            deleted_records,
        })
    }

    /// Restore a store from this snapshot, dropping records the schema
    /// rejects and deduplicating by id.
    pub fn restore_into(self, store: &mut LocalStore) {
        let mut records: HashMap<String, Record> = HashMap::new();
        for record in self.records {
            let Ok(payload) = store.schema().sanitize(&record.payload) else {
                continue;
            };
            let candidate = Record::from_remote(record.id.clone(), record.updated_at, payload);
            match records.get(&record.id) {
                Some(existing)
                    if timestamp::compare(&existing.updated_at, &candidate.updated_at)
                        != std::cmp::Ordering::Less => {}
                _ => {
                    records.insert(record.id.clone(), candidate);
                }
            }
        }

        let mut tombstones: HashMap<String, String> = HashMap::new();
        for tombstone in self.deleted_records {
            match tombstones.get(&tombstone.id) {
                Some(existing)
                    if timestamp::compare(existing, &tombstone.updated_at)
                        != std::cmp::Ordering::Less => {}
                _ => {
                    tombstones.insert(tombstone.id, tombstone.updated_at);
                }
            }
        }
        // A live record shadows an older tombstone for the same id.
        tombstones.retain(|id, deleted_at| match records.get(id) {
            Some(record) => {
                timestamp::compare(deleted_at, &record.updated_at) == std::cmp::Ordering::Greater
            }
            None => true,
        });
        records.retain(|id, _| !tombstones.contains_key(id));

        store.restore(
            records.into_values().collect(),
            tombstones
                .into_iter()
                .map(|(id, updated_at)| Tombstone { id, updated_at })
                .collect(),
        );
    }
}

/// Load a store from snapshot JSON, falling back to empty on corrupt data.
pub fn load_or_default(store: &mut LocalStore, json: &str) {
    match StoreSnapshot::from_json(json) {
        Ok(snapshot) => snapshot.restore_into(store),
        Err(_) => store.restore(Vec::new(), Vec::new()),
    }
}

fn parse_records(items: &[Value]) -> Vec<Record> {
    items
        .iter()
        .filter_map(|item| {
            let object = item.as_object()?;
            let id = object.get("id").and_then(Value::as_str)?.trim();
            if id.is_empty() {
                return None;
            }
            let updated_at = object
                .get("updatedAt")
                .and_then(Value::as_str)
                .map(str::to_string);
            let payload = object.get("payload").cloned().unwrap_or(item.clone());
            Some(Record::from_remote(
                id,
                timestamp::normalize(updated_at.as_deref()),
                payload,
            ))
        })
        .collect()
}

fn parse_tombstones(items: &[Value]) -> Vec<Tombstone> {
    items
        .iter()
        .filter_map(|item| {
            let object = item.as_object()?;
            let id = object.get("id").and_then(Value::as_str)?.trim();
            if id.is_empty() {
                return None;
            }
            let updated_at = object.get("updatedAt").and_then(Value::as_str);
            Some(Tombstone::new(id, timestamp::normalize(updated_at)))
        })
        .collect()
}
