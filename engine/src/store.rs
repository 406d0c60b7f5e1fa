//! Local store for one app's records and pending tombstones.
//!
//! The store is the client-side state container: live records keyed by
//! id plus the tombstones still waiting to be pushed. Local mutations
//! validate against the app schema and stamp fresh timestamps; remote
//! batches flow through the [`Reconciler`]. Persistence is handled by
//! the snapshot module, not here.

use crate::error::Result;
use crate::protocol::RemoteRecord;
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::{timestamp, AppSchema, Record, RecordId, Tombstone};
use serde_json::Value;
use std::collections::HashMap;

/// In-memory state for one workspace app.
#[derive(Debug, Clone)]
pub struct LocalStore {
    schema: AppSchema,
    records: HashMap<RecordId, Record>,
    tombstones: HashMap<RecordId, String>,
}

impl LocalStore {
    /// Create an empty store validating payloads against `schema`.
    pub fn new(schema: AppSchema) -> Self {
        Self {
            schema,
            records: HashMap::new(),
            tombstones: HashMap::new(),
        }
    }

    /// The schema this store validates against.
    pub fn schema(&self) -> &AppSchema {
        &self.schema
    }

    /// Create a record from a payload, assigning a fresh id and timestamp.
    pub fn create(&mut self, payload: Value) -> Result<Record> {
        let sanitized = self.schema.sanitize(&payload)?;
        let record = Record::new(sanitized);
        self.tombstones.remove(&record.id);
        self.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    /// Replace a record's payload, stamping a fresh timestamp.
    ///
    /// Returns `Ok(None)` when no record with that id exists.
    pub fn update(&mut self, id: &str, payload: Value) -> Result<Option<Record>> {
        let sanitized = self.schema.sanitize(&payload)?;
        match self.records.get_mut(id) {
            Some(record) => {
                record.replace_payload(sanitized);
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    /// Delete a record, leaving a tombstone for the next push.
    ///
    /// Unknown ids still get a tombstone so a deletion made on another
    /// device before its record arrived here is not lost. An existing
    /// tombstone never moves backward: the stamp is the later of its
    /// current value and the local clock.
    pub fn remove(&mut self, id: &str) -> Option<Record> {
        let removed = self.records.remove(id);
        let now = timestamp::now_iso();
        let existing = self.tombstones.get(id).map(String::as_str);
        let stamp = timestamp::newer(existing, Some(&now)).unwrap_or(now);
        self.tombstones.insert(id.to_string(), stamp);
        removed
    }

    /// Delete every record, tombstoning each one.
    pub fn clear_all(&mut self) -> usize {
        let now = timestamp::now_iso();
        let count = self.records.len();
        for id in self.records.keys() {
            self.tombstones.insert(id.clone(), now.clone());
        }
        self.records.clear();
        count
    }

    /// Look up a record by id.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no live records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Live records, newest first.
    pub fn records(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self.records.values().cloned().collect();
        records.sort_by(|a, b| {
            timestamp::compare(&b.updated_at, &a.updated_at).then_with(|| a.id.cmp(&b.id))
        });
        records
    }

    /// Pending tombstones awaiting push.
    pub fn tombstones(&self) -> Vec<Tombstone> {
        let mut tombstones: Vec<Tombstone> = self
            .tombstones
            .iter()
            .map(|(id, updated_at)| Tombstone::new(id, updated_at))
            .collect();
        tombstones.sort_by(|a, b| {
            timestamp::compare(&b.updated_at, &a.updated_at).then_with(|| a.id.cmp(&b.id))
        });
        tombstones
    }

    /// Merge a remote batch through last-writer-wins reconciliation.
    pub fn apply_remote(&mut self, batch: Vec<RemoteRecord>) -> ReconcileOutcome {
        let records = self.records.values().cloned().collect();
        let tombstones = self
            .tombstones
            .iter()
            .map(|(id, updated_at)| Tombstone::new(id, updated_at))
            .collect();

        let reconciler = Reconciler::new(&self.schema);
        let (merged, merged_tombstones, outcome) =
            reconciler.reconcile(records, tombstones, batch);

        self.records = merged
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        self.tombstones = merged_tombstones
            .into_iter()
            .map(|tombstone| (tombstone.id, tombstone.updated_at))
            .collect();
        outcome
    }

    /// Clear tombstones after the server acknowledged a push.
    ///
    /// Only the ids that were actually sent are cleared; deletions made
    /// while the push was in flight keep their tombstones.
    pub fn acknowledge_push(&mut self, pushed: &[Tombstone]) {
        for tombstone in pushed {
            if self
                .tombstones
                .get(&tombstone.id)
                .is_some_and(|current| current == &tombstone.updated_at)
            {
                self.tombstones.remove(&tombstone.id);
            }
        }
    }

    /// Replace the store's contents wholesale, used by snapshot loading.
    pub(crate) fn restore(&mut self, records: Vec<Record>, tombstones: Vec<Tombstone>) {
        self.records = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        self.tombstones = tombstones
            .into_iter()
            .map(|tombstone| (tombstone.id, tombstone.updated_at))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use serde_json::json;

    fn store() -> LocalStore {
        LocalStore::new(AppSchema::new("boards", &["name"]))
    }

    #[test]
    fn create_assigns_id_and_timestamp() {
        let mut store = store();
        let record = store.create(json!({"name": "Kickoff"})).unwrap();
        assert!(!record.id.is_empty());
        assert!(!record.updated_at.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn create_rejects_invalid_payload() {
        let mut store = store();
        let err = store.create(json!({"name": "   "})).unwrap_err();
        assert_eq!(err, Error::MissingRequiredField("name".to_string()));
        assert!(store.is_empty());
    }

    #[test]
    fn update_replaces_payload_and_advances_timestamp() {
        let mut store = store();
        let record = store.create(json!({"name": "Before"})).unwrap();
        let id = record.id.clone();
        let first = record.updated_at.clone();

        let updated = store.update(&id, json!({"name": "After"})).unwrap().unwrap();
        assert_eq!(updated.payload["name"], "After");
        assert!(updated.updated_at >= first);
    }

    #[test]
    fn update_unknown_id_returns_none() {
        let mut store = store();
        let result = store.update("ghost", json!({"name": "X"})).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn remove_leaves_tombstone() {
        let mut store = store();
        let id = store.create(json!({"name": "Doomed"})).unwrap().id.clone();

        let removed = store.remove(&id);
        assert!(removed.is_some());
        assert!(store.is_empty());
        assert_eq!(store.tombstones().len(), 1);
        assert_eq!(store.tombstones()[0].id, id);
    }

    #[test]
    fn remove_unknown_id_still_tombstones() {
        let mut store = store();
        assert!(store.remove("never-seen").is_none());
        assert_eq!(store.tombstones().len(), 1);
    }

    #[test]
    fn remove_keeps_newer_tombstone_timestamp() {
        let mut store = store();
        store.apply_remote(vec![RemoteRecord {
            client_id: "c1".to_string(),
            updated_at: Some("2999-01-01T00:00:00.000Z".to_string()),
            deleted: true,
            payload: None,
        }]);

        // Deleting again locally must not pull the tombstone back to
        // the local clock.
        store.remove("c1");
        let tombstones = store.tombstones();
        assert_eq!(tombstones.len(), 1);
        assert_eq!(tombstones[0].updated_at, "2999-01-01T00:00:00.000Z");

        // A record dated between the local clock and the deletion
        // still loses to the tombstone.
        let outcome = store.apply_remote(vec![RemoteRecord {
            client_id: "c1".to_string(),
            updated_at: Some("2998-01-01T00:00:00.000Z".to_string()),
            deleted: false,
            payload: Some(json!({"name": "Zombie"})),
        }]);
        assert_eq!(outcome.ignored_stale, 1);
        assert!(store.get("c1").is_none());
    }

    #[test]
    fn remove_advances_older_tombstone() {
        let mut store = store();
        store.apply_remote(vec![RemoteRecord {
            client_id: "c1".to_string(),
            updated_at: Some("2000-01-01T00:00:00.000Z".to_string()),
            deleted: true,
            payload: None,
        }]);

        store.remove("c1");
        let tombstones = store.tombstones();
        assert!(tombstones[0].updated_at.as_str() > "2000-01-01T00:00:00.000Z");
    }

    #[test]
    fn clear_all_tombstones_everything() {
        let mut store = store();
        store.create(json!({"name": "One"})).unwrap();
        store.create(json!({"name": "Two"})).unwrap();

        let cleared = store.clear_all();
        assert_eq!(cleared, 2);
        assert!(store.is_empty());
        assert_eq!(store.tombstones().len(), 2);
    }

    #[test]
    fn restore_replaces_state_wholesale() {
        let mut store = store();
        store.remove("recycled");
        assert_eq!(store.tombstones().len(), 1);

        store.restore(
            vec![Record::with_id("recycled", json!({"name": "Back"}))],
            Vec::new(),
        );
        assert!(store.get("recycled").is_some());
        assert!(store.tombstones().is_empty());
    }

    #[test]
    fn records_sorted_newest_first() {
        let mut store = store();
        store.restore(
            vec![
                Record::from_remote("a", "2024-01-01T00:00:00.000Z".into(), json!({"name": "Old"})),
                Record::from_remote("b", "2024-03-01T00:00:00.000Z".into(), json!({"name": "New"})),
            ],
            Vec::new(),
        );

        let records = store.records();
        assert_eq!(records[0].id, "b");
        assert_eq!(records[1].id, "a");
    }

    #[test]
    fn apply_remote_merges_batch() {
        let mut store = store();
        store.restore(
            vec![Record::from_remote(
                "c1",
                "2024-01-01T00:00:00.000Z".into(),
                json!({"name": "Old"}),
            )],
            Vec::new(),
        );

        let outcome = store.apply_remote(vec![RemoteRecord {
            client_id: "c1".to_string(),
            updated_at: Some("2024-01-02T00:00:00.000Z".to_string()),
            deleted: false,
            payload: Some(json!({"name": "New"})),
        }]);

        assert_eq!(outcome.applied, 1);
        assert_eq!(store.get("c1").unwrap().payload["name"], "New");
    }

    #[test]
    fn acknowledge_push_clears_only_sent_tombstones() {
        let mut store = store();
        store.remove("sent");
        let pushed = store.tombstones();

        store.remove("late");
        store.acknowledge_push(&pushed);

        let remaining = store.tombstones();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "late");
    }

    #[test]
    fn acknowledge_push_keeps_retombstoned_id() {
        let mut store = store();
        store.remove("twice");
        let pushed = vec![Tombstone::new("twice", "2000-01-01T00:00:00.000Z")];

        // The in-flight copy carried an older timestamp than the
        // current tombstone, so the current one must survive.
        store.acknowledge_push(&pushed);
        assert_eq!(store.tombstones().len(), 1);
    }
}
