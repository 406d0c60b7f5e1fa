//! Last-writer-wins reconciliation of a remote batch into local state.
//!
//! # Algorithm
//!
//! For each entry in the remote batch:
//!
//! 1. Compute the local latest timestamp for that id: the later of the
//!    live record's `updatedAt` and the tombstone's, absent when
//!    neither exists.
//! 2. Deletions: when the local latest is absent or the remote
//!    timestamp is greater or equal, drop the live record and keep a
//!    tombstone at the remote timestamp. Otherwise the deletion is
//!    stale and ignored.
//! 3. Live records: sanitize the payload (invalid entries are skipped
//!    individually and never abort the batch); the stored timestamp
//!    becomes the later of the entry timestamp and the payload's
//!    embedded one, in canonical form; the same greater-or-equal check
//!    decides whether the remote copy replaces the local record and
//!    clears its tombstone.
//!
//! Ties favor the remote side (`>=`, not `>`) so that multiple pulling
//! clients converge on the store's copy instead of each keeping its own.

use crate::protocol::RemoteRecord;
use crate::{timestamp, AppSchema, Record, RecordId, Tombstone};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Counters describing what one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Remote live records that replaced or created a local record
    pub applied: usize,
    /// Remote deletions that removed a local record or refreshed a tombstone
    pub deleted: usize,
    /// Entries dropped: blank id, missing payload, failed validation
    pub skipped: usize,
    /// Entries ignored because local state was newer
    pub ignored_stale: usize,
}

impl ReconcileOutcome {
    /// Total number of batch entries examined.
    pub fn total(&self) -> usize {
        self.applied + self.deleted + self.skipped + self.ignored_stale
    }
}

/// Merges remote batches into local state, one entry at a time.
pub struct Reconciler<'a> {
    schema: &'a AppSchema,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler validating payloads against `schema`.
    pub fn new(schema: &'a AppSchema) -> Self {
        Self { schema }
    }

    /// Merge a remote batch into the local records and tombstones.
    ///
    /// Returns the merged records (descending by `updatedAt`), the
    /// merged tombstone set, and counters for status reporting. Pure:
    /// persistence and re-rendering are the caller's concern.
    pub fn reconcile(
        &self,
        records: Vec<Record>,
        tombstones: Vec<Tombstone>,
        batch: Vec<RemoteRecord>,
    ) -> (Vec<Record>, Vec<Tombstone>, ReconcileOutcome) {
        let mut live: HashMap<RecordId, Record> = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        let mut deleted: HashMap<RecordId, String> = tombstones
            .into_iter()
            .map(|tombstone| (tombstone.id, tombstone.updated_at))
            .collect();
        let mut outcome = ReconcileOutcome::default();

        for entry in batch {
            self.apply_entry(entry, &mut live, &mut deleted, &mut outcome);
        }

        let mut merged: Vec<Record> = live.into_values().collect();
        merged.sort_by(|a, b| {
            timestamp::compare(&b.updated_at, &a.updated_at).then_with(|| a.id.cmp(&b.id))
        });

        let mut merged_tombstones: Vec<Tombstone> = deleted
            .into_iter()
            .map(|(id, updated_at)| Tombstone { id, updated_at })
            .collect();
        merged_tombstones.sort_by(|a, b| {
            timestamp::compare(&b.updated_at, &a.updated_at).then_with(|| a.id.cmp(&b.id))
        });

        (merged, merged_tombstones, outcome)
    }

    fn apply_entry(
        &self,
        entry: RemoteRecord,
        live: &mut HashMap<RecordId, Record>,
        deleted: &mut HashMap<RecordId, String>,
        outcome: &mut ReconcileOutcome,
    ) {
        let id = entry.client_id.trim();
        if id.is_empty() {
            outcome.skipped += 1;
            return;
        }
        let id = id.to_string();

        // Entry timestamp, falling back to the payload's embedded one,
        // then to the current instant.
        let embedded = entry
            .payload
            .as_ref()
            .and_then(|payload| payload.get("updatedAt"))
            .and_then(Value::as_str);
        let raw_updated_at = entry
            .updated_at
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .or(embedded);
        let remote_updated_at = timestamp::normalize(raw_updated_at);

        let local_live = live.get(&id).map(|record| record.updated_at.clone());
        let local_deleted = deleted.get(&id).cloned();
        let local_latest = timestamp::newer(local_live.as_deref(), local_deleted.as_deref());

        let remote_wins = match &local_latest {
            None => true,
            Some(latest) => timestamp::compare(&remote_updated_at, latest) != Ordering::Less,
        };

        if entry.deleted {
            if remote_wins {
                live.remove(&id);
                deleted.insert(id, remote_updated_at);
                outcome.deleted += 1;
            } else {
                outcome.ignored_stale += 1;
            }
            return;
        }

        let Some(payload) = entry.payload else {
            outcome.skipped += 1;
            return;
        };
        let sanitized = match self.schema.sanitize(&payload) {
            Ok(cleaned) => cleaned,
            Err(_) => {
                outcome.skipped += 1;
                return;
            }
        };

        if !remote_wins {
            outcome.ignored_stale += 1;
            return;
        }

        // Stored timestamp is the later of the entry timestamp and the
        // payload's own embedded one, always in canonical form.
        let effective = match sanitized.get("updatedAt").and_then(Value::as_str) {
            Some(own) if timestamp::compare(own, &remote_updated_at) == Ordering::Greater => {
                // Winning against a normalized timestamp implies the value
                // parses, so this never falls back to the current instant.
                timestamp::normalize(Some(own))
            }
            _ => remote_updated_at,
        };

        deleted.remove(&id);
        live.insert(id.clone(), Record::from_remote(id, effective, sanitized));
        outcome.applied += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> AppSchema {
        AppSchema::new("boards", &["name"])
    }

    fn local_record(id: &str, updated_at: &str, name: &str) -> Record {
        Record::from_remote(id, updated_at.to_string(), json!({"name": name}))
    }

    fn live_entry(id: &str, updated_at: &str, name: &str) -> RemoteRecord {
        RemoteRecord {
            client_id: id.to_string(),
            updated_at: Some(updated_at.to_string()),
            deleted: false,
            payload: Some(json!({"name": name})),
        }
    }

    fn deletion_entry(id: &str, updated_at: &str) -> RemoteRecord {
        RemoteRecord {
            client_id: id.to_string(),
            updated_at: Some(updated_at.to_string()),
            deleted: true,
            payload: None,
        }
    }

    #[test]
    fn newer_remote_replaces_local() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        let (records, tombstones, outcome) = reconciler.reconcile(
            vec![local_record("c1", "2024-01-01T00:00:00.000Z", "Old")],
            Vec::new(),
            vec![live_entry("c1", "2024-01-02T00:00:00.000Z", "New")],
        );

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload["name"], "New");
        assert_eq!(records[0].updated_at, "2024-01-02T00:00:00.000Z");
        assert!(tombstones.is_empty());
        assert_eq!(outcome.applied, 1);
    }

    #[test]
    fn stale_remote_is_ignored() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        let (records, _, outcome) = reconciler.reconcile(
            vec![local_record("c1", "2024-01-05T00:00:00.000Z", "Current")],
            Vec::new(),
            vec![live_entry("c1", "2024-01-01T00:00:00.000Z", "Stale")],
        );

        assert_eq!(records[0].payload["name"], "Current");
        assert_eq!(outcome.ignored_stale, 1);
        assert_eq!(outcome.applied, 0);
    }

    #[test]
    fn equal_timestamps_favor_remote() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        let (records, _, outcome) = reconciler.reconcile(
            vec![local_record("c1", "2024-01-03T00:00:00.000Z", "Mine")],
            Vec::new(),
            vec![live_entry("c1", "2024-01-03T00:00:00.000Z", "Theirs")],
        );

        assert_eq!(records[0].payload["name"], "Theirs");
        assert_eq!(outcome.applied, 1);
    }

    #[test]
    fn unknown_id_always_applies() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        let (records, _, outcome) = reconciler.reconcile(
            Vec::new(),
            Vec::new(),
            vec![live_entry("c9", "2020-01-01T00:00:00.000Z", "Ancient")],
        );

        // No local state means the remote copy wins no matter how old.
        assert_eq!(records.len(), 1);
        assert_eq!(outcome.applied, 1);
    }

    #[test]
    fn deletion_removes_live_record_and_keeps_tombstone() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        let (records, tombstones, outcome) = reconciler.reconcile(
            vec![local_record("c1", "2024-01-01T00:00:00.000Z", "Gone")],
            Vec::new(),
            vec![deletion_entry("c1", "2024-01-02T00:00:00.000Z")],
        );

        assert!(records.is_empty());
        assert_eq!(
            tombstones,
            vec![Tombstone::new("c1", "2024-01-02T00:00:00.000Z")]
        );
        assert_eq!(outcome.deleted, 1);
    }

    #[test]
    fn stale_deletion_is_ignored() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        let (records, tombstones, outcome) = reconciler.reconcile(
            vec![local_record("c1", "2024-01-05T00:00:00.000Z", "Alive")],
            Vec::new(),
            vec![deletion_entry("c1", "2024-01-01T00:00:00.000Z")],
        );

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload["name"], "Alive");
        assert!(tombstones.is_empty());
        assert_eq!(outcome.ignored_stale, 1);
    }

    #[test]
    fn deletion_for_unknown_id_creates_tombstone() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        let (records, tombstones, _) = reconciler.reconcile(
            Vec::new(),
            Vec::new(),
            vec![deletion_entry("ghost", "2024-01-01T00:00:00.000Z")],
        );

        assert!(records.is_empty());
        assert_eq!(tombstones.len(), 1);
        assert_eq!(tombstones[0].id, "ghost");
    }

    #[test]
    fn newer_live_record_clears_local_tombstone() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        let (records, tombstones, _) = reconciler.reconcile(
            Vec::new(),
            vec![Tombstone::new("c1", "2024-01-01T00:00:00.000Z")],
            vec![live_entry("c1", "2024-01-02T00:00:00.000Z", "Back")],
        );

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload["name"], "Back");
        assert!(tombstones.is_empty());
    }

    #[test]
    fn tombstone_blocks_older_live_record() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        let (records, tombstones, outcome) = reconciler.reconcile(
            Vec::new(),
            vec![Tombstone::new("c1", "2024-01-05T00:00:00.000Z")],
            vec![live_entry("c1", "2024-01-01T00:00:00.000Z", "Zombie")],
        );

        assert!(records.is_empty());
        assert_eq!(tombstones.len(), 1);
        assert_eq!(outcome.ignored_stale, 1);
    }

    #[test]
    fn blank_id_entry_is_skipped_rest_applies() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        let mut batch = vec![RemoteRecord {
            client_id: "   ".to_string(),
            updated_at: Some("2024-01-01T00:00:00.000Z".to_string()),
            deleted: false,
            payload: Some(json!({"name": "Nameless"})),
        }];
        for n in 0..9 {
            batch.push(live_entry(
                &format!("c{n}"),
                "2024-01-01T00:00:00.000Z",
                "Fine",
            ));
        }

        let (records, _, outcome) = reconciler.reconcile(Vec::new(), Vec::new(), batch);

        assert_eq!(records.len(), 9);
        assert_eq!(outcome.applied, 9);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn invalid_payload_is_skipped() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        let batch = vec![
            RemoteRecord {
                client_id: "bad".to_string(),
                updated_at: Some("2024-01-01T00:00:00.000Z".to_string()),
                deleted: false,
                payload: Some(json!({"name": ""})),
            },
            RemoteRecord {
                client_id: "missing".to_string(),
                updated_at: Some("2024-01-01T00:00:00.000Z".to_string()),
                deleted: false,
                payload: None,
            },
            live_entry("good", "2024-01-01T00:00:00.000Z", "Fine"),
        ];

        let (records, _, outcome) = reconciler.reconcile(Vec::new(), Vec::new(), batch);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "good");
        assert_eq!(outcome.skipped, 2);
    }

    #[test]
    fn entry_timestamp_falls_back_to_payload() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        let batch = vec![RemoteRecord {
            client_id: "c1".to_string(),
            updated_at: None,
            deleted: false,
            payload: Some(json!({"name": "Embedded", "updatedAt": "2024-02-01T00:00:00.000Z"})),
        }];

        let (records, _, _) = reconciler.reconcile(Vec::new(), Vec::new(), batch);
        assert_eq!(records[0].updated_at, "2024-02-01T00:00:00.000Z");
    }

    #[test]
    fn effective_timestamp_takes_later_of_entry_and_payload() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        // Payload timestamp ahead of the entry timestamp.
        let batch = vec![RemoteRecord {
            client_id: "c1".to_string(),
            updated_at: Some("2024-01-01T00:00:00.000Z".to_string()),
            deleted: false,
            payload: Some(json!({"name": "Ahead", "updatedAt": "2024-03-01T00:00:00.000Z"})),
        }];
        let (records, _, _) = reconciler.reconcile(Vec::new(), Vec::new(), batch);
        assert_eq!(records[0].updated_at, "2024-03-01T00:00:00.000Z");

        // Entry timestamp ahead of the payload timestamp.
        let batch = vec![RemoteRecord {
            client_id: "c2".to_string(),
            updated_at: Some("2024-03-01T00:00:00.000Z".to_string()),
            deleted: false,
            payload: Some(json!({"name": "Behind", "updatedAt": "2024-01-01T00:00:00.000Z"})),
        }];
        let (records, _, _) = reconciler.reconcile(Vec::new(), Vec::new(), batch);
        assert_eq!(records[0].updated_at, "2024-03-01T00:00:00.000Z");
        assert_eq!(records[0].embedded_timestamp(), Some("2024-03-01T00:00:00.000Z"));
    }

    #[test]
    fn winning_payload_timestamp_is_canonicalized() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        // Date-only spelling outranks the entry timestamp.
        let batch = vec![RemoteRecord {
            client_id: "c1".to_string(),
            updated_at: Some("2024-01-01T00:00:00.000Z".to_string()),
            deleted: false,
            payload: Some(json!({"name": "Loose", "updatedAt": "2024-03-01"})),
        }];
        let (records, _, _) = reconciler.reconcile(Vec::new(), Vec::new(), batch);
        assert_eq!(records[0].updated_at, "2024-03-01T00:00:00.000Z");

        // Offset spelling converts to UTC.
        let batch = vec![RemoteRecord {
            client_id: "c2".to_string(),
            updated_at: Some("2024-01-01T00:00:00.000Z".to_string()),
            deleted: false,
            payload: Some(json!({"name": "Offset", "updatedAt": "2024-03-01T10:00:00+02:00"})),
        }];
        let (records, _, _) = reconciler.reconcile(Vec::new(), Vec::new(), batch);
        assert_eq!(records[0].updated_at, "2024-03-01T08:00:00.000Z");
        assert_eq!(records[0].embedded_timestamp(), Some("2024-03-01T08:00:00.000Z"));
    }

    #[test]
    fn merged_records_sorted_descending() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        let batch = vec![
            live_entry("a", "2024-01-01T00:00:00.000Z", "Oldest"),
            live_entry("b", "2024-03-01T00:00:00.000Z", "Newest"),
            live_entry("c", "2024-02-01T00:00:00.000Z", "Middle"),
        ];

        let (records, _, _) = reconciler.reconcile(Vec::new(), Vec::new(), batch);
        let ids: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn later_batch_entry_wins_for_same_id() {
        let schema = schema();
        let reconciler = Reconciler::new(&schema);

        let batch = vec![
            live_entry("c1", "2024-01-01T00:00:00.000Z", "First"),
            live_entry("c1", "2024-01-02T00:00:00.000Z", "Second"),
        ];

        let (records, _, _) = reconciler.reconcile(Vec::new(), Vec::new(), batch);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload["name"], "Second");
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_id() -> impl Strategy<Value = String> {
            prop_oneof![
                Just("c1".to_string()),
                Just("c2".to_string()),
                Just("c3".to_string()),
            ]
        }

        fn arb_timestamp() -> impl Strategy<Value = String> {
            (2023u32..2026, 1u32..13, 1u32..28, 0u32..24)
                .prop_map(|(y, m, d, h)| format!("{y:04}-{m:02}-{d:02}T{h:02}:00:00.000Z"))
        }

        fn arb_entry() -> impl Strategy<Value = RemoteRecord> {
            (arb_id(), arb_timestamp(), any::<bool>()).prop_map(|(id, ts, deleted)| {
                RemoteRecord {
                    client_id: id,
                    updated_at: Some(ts),
                    deleted,
                    payload: if deleted {
                        None
                    } else {
                        Some(json!({"name": "Remote"}))
                    },
                }
            })
        }

        fn arb_local() -> impl Strategy<Value = (Vec<Record>, Vec<Tombstone>)> {
            (
                proptest::collection::vec((arb_id(), arb_timestamp()), 0..3),
                proptest::collection::vec((arb_id(), arb_timestamp()), 0..2),
            )
                .prop_map(|(lives, dels)| {
                    let mut records: Vec<Record> = Vec::new();
                    for (id, ts) in lives {
                        if !records.iter().any(|r| r.id == id) {
                            records.push(Record::from_remote(id, ts, json!({"name": "Local"})));
                        }
                    }
                    let mut tombstones: Vec<Tombstone> = Vec::new();
                    for (id, ts) in dels {
                        let live = records.iter().any(|r| r.id == id);
                        if !live && !tombstones.iter().any(|t| t.id == id) {
                            tombstones.push(Tombstone::new(id, ts));
                        }
                    }
                    (records, tombstones)
                })
        }

        proptest! {
            #[test]
            fn prop_reconcile_deterministic(
                (records, tombstones) in arb_local(),
                batch in proptest::collection::vec(arb_entry(), 0..8),
            ) {
                let schema = schema();
                let reconciler = Reconciler::new(&schema);

                let (r1, t1, _) = reconciler.reconcile(
                    records.clone(), tombstones.clone(), batch.clone());
                let (r2, t2, _) = reconciler.reconcile(records, tombstones, batch);

                prop_assert_eq!(r1, r2);
                prop_assert_eq!(t1, t2);
            }

            #[test]
            fn prop_reconcile_idempotent(
                (records, tombstones) in arb_local(),
                batch in proptest::collection::vec(arb_entry(), 0..8),
            ) {
                // Timestamped batches: applying twice equals applying once.
                let schema = schema();
                let reconciler = Reconciler::new(&schema);

                let (r1, t1, _) = reconciler.reconcile(records, tombstones, batch.clone());
                let (r2, t2, _) = reconciler.reconcile(r1.clone(), t1.clone(), batch);

                prop_assert_eq!(r1, r2);
                prop_assert_eq!(t1, t2);
            }

            #[test]
            fn prop_no_id_both_live_and_tombstoned(
                (records, tombstones) in arb_local(),
                batch in proptest::collection::vec(arb_entry(), 0..8),
            ) {
                let schema = schema();
                let reconciler = Reconciler::new(&schema);

                let (merged, merged_tombstones, _) =
                    reconciler.reconcile(records, tombstones, batch);

                for record in &merged {
                    prop_assert!(
                        !merged_tombstones.iter().any(|t| t.id == record.id),
                        "id {} is both live and tombstoned", record.id
                    );
                }
            }

            #[test]
            fn prop_tombstone_blocks_strictly_older_revival(
                ts_delete in arb_timestamp(),
                ts_revive in arb_timestamp(),
            ) {
                prop_assume!(ts_revive < ts_delete);

                let schema = schema();
                let reconciler = Reconciler::new(&schema);

                let (records, tombstones, _) = reconciler.reconcile(
                    Vec::new(),
                    Vec::new(),
                    vec![deletion_entry("c1", &ts_delete)],
                );
                prop_assert!(records.is_empty());

                let (records, tombstones, _) = reconciler.reconcile(
                    records,
                    tombstones,
                    vec![live_entry("c1", &ts_revive, "Zombie")],
                );

                prop_assert!(records.is_empty());
                prop_assert_eq!(tombstones.len(), 1);
            }
        }
    }
}
