//! # OpsBoard Engine
//!
//! A deterministic last-writer-wins sync core for local-first workspace apps.
//!
//! This crate provides the shared-data logic behind the OpsBoard tools:
//! records, tombstones, timestamp ordering, payload validation, and the
//! reconciliation that merges a remote batch into local state with
//! guaranteed determinism - the same inputs always produce the same outputs.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never touches files, sockets, or platform APIs
//! - **Deterministic**: reconciliation is a pure function of its inputs
//! - **Testable**: plain values in, plain values out, no mocks required
//! - **Whole-record**: sync replaces entire records, never merges fields
//!
//! ## Core Concepts
//!
//! ### Records and Tombstones
//!
//! Data is stored as records with a client-generated id, an ISO-8601
//! `updatedAt` timestamp, and a JSON payload. Deletions leave a
//! [`Tombstone`] (id plus deletion timestamp) that is held locally until
//! the server acknowledges the push, so offline deletions survive a
//! restart.
//!
//! ### Last-writer-wins
//!
//! The [`Reconciler`] compares each remote entry's timestamp against the
//! later of the local record's and its tombstone's. The remote side wins
//! ties, so every client pulling the same store converges on the same
//! state. Timestamps that fail to parse fall back to string comparison
//! rather than aborting.
//!
//! ### Validation
//!
//! Each app supplies an [`AppSchema`] naming its required fields. Invalid
//! remote entries are skipped individually; one malformed record never
//! poisons a batch.
//!
//! ## Quick Start
//!
//! ```rust
//! use opsboard_engine::{AppSchema, LocalStore, RemoteRecord};
//! use serde_json::json;
//!
//! // 1. Create a store for one app
//! let mut store = LocalStore::new(AppSchema::sprints());
//!
//! // 2. Mutate locally
//! let record = store
//!     .create(json!({
//!         "name": "Sprint 12",
//!         "startDate": "2024-03-04",
//!         "endDate": "2024-03-15",
//!     }))
//!     .unwrap();
//! let id = record.id.clone();
//!
//! // 3. Merge a remote batch
//! let outcome = store.apply_remote(vec![RemoteRecord {
//!     client_id: id.clone(),
//!     updated_at: Some("2999-01-01T00:00:00.000Z".to_string()),
//!     deleted: false,
//!     payload: Some(json!({
//!         "name": "Sprint 12 (renamed)",
//!         "startDate": "2024-03-04",
//!         "endDate": "2024-03-15",
//!     })),
//! }]);
//!
//! assert_eq!(outcome.applied, 1);
//! assert_eq!(store.get(&id).unwrap().payload["name"], "Sprint 12 (renamed)");
//! ```
//!
//! ## Persistence
//!
//! Use [`StoreSnapshot::capture`] and [`snapshot::load_or_default`] for
//! persistence. Snapshots carry a format version and tolerate the legacy
//! bare-array layout; corrupt data loads as an empty store.

pub mod error;
pub mod protocol;
pub mod reconcile;
pub mod record;
pub mod schema;
pub mod scope;
pub mod snapshot;
pub mod store;
pub mod timestamp;

// Re-export main types at crate root
pub use error::Error;
pub use protocol::{
    DeletionEntry, RecordsResponse, RemoteRecord, SyncRequest, SyncResponse, UpsertEntry,
    MAX_SYNC_ENTRIES,
};
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use record::{Record, Tombstone};
pub use schema::AppSchema;
pub use snapshot::{StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::LocalStore;

/// Type aliases for clarity
pub type RecordId = String;
pub type WorkspaceKey = String;
pub type AppKey = String;
