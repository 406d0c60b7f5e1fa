//! # OpsBoard Client
//!
//! Pull/push orchestration for shared OpsBoard workspaces.
//!
//! This crate wraps the [`opsboard_engine`] sync core with everything a
//! device needs to participate in a shared workspace: an HTTP client
//! against the sync server, snapshot persistence, a status line, and
//! optional auto sync (periodic silent pulls plus debounced pushes).
//!
//! Local editing never blocks on the network. Mutations land in the
//! local store immediately; sync failures only change the reported
//! status, and a later pull or push reconciles the difference.
//!
//! ## Quick Start
//!
//! ```no_run
//! use opsboard_client::{SyncConfig, SyncSession};
//! use opsboard_engine::AppSchema;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), opsboard_client::SyncError> {
//! let config = SyncConfig::shared("https://ops.example.com", "my-team")?
//!     .with_snapshot_path("onboarding.json");
//! let session = SyncSession::new_shared(AppSchema::onboarding(), config)?;
//!
//! // Restore whatever this device saw last time.
//! session.load_snapshot();
//!
//! // Merge the shared workspace state.
//! session.pull(false).await?;
//!
//! // Edit locally; auto sync pushes it out after the debounce window.
//! session.start_auto_sync();
//! session.create(json!({
//!     "name": "Acme Corp",
//!     "company": "Acme",
//!     "product": "Starter",
//!     "owner": "Dana",
//! }))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod session;
pub mod status;

pub use config::{normalize_api_url, SyncConfig};
pub use error::SyncError;
pub use session::SyncSession;
pub use status::{StatusKind, SyncStatus};
