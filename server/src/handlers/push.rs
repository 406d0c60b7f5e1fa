//! Push handler - applies client upserts and deletions to stored state.

use crate::db;
use crate::error::Result;
use chrono::{DateTime, Utc};
use opsboard_engine::{timestamp, SyncRequest, SyncResponse};
use sqlx::PgPool;

/// Process a push request from a client.
///
/// Each entry is applied conditionally: a row only changes when no row
/// exists for its id or the stored timestamp is not newer than the
/// incoming one. Stale entries are counted as skipped, so retrying an
/// identical request is harmless.
pub async fn handle_push(
    pool: &PgPool,
    workspace_key: &str,
    app_key: &str,
    request: SyncRequest,
) -> Result<SyncResponse> {
    request.validate()?;

    let mut applied_upserts = 0u64;
    let mut applied_deletions = 0u64;

    for entry in &request.upserts {
        let client_id = entry.id.trim();
        if client_id.is_empty() {
            continue;
        }
        let updated_at = entry_instant(entry.updated_at.as_deref());
        let applied = db::upsert_record(
            pool,
            workspace_key,
            app_key,
            client_id,
            &entry.payload,
            updated_at,
        )
        .await?;
        if applied {
            applied_upserts += 1;
        }
    }

    for entry in &request.deletions {
        let client_id = entry.id.trim();
        if client_id.is_empty() {
            continue;
        }
        let updated_at = entry_instant(entry.updated_at.as_deref());
        let applied = db::mark_deleted(pool, workspace_key, app_key, client_id, updated_at).await?;
        if applied {
            applied_deletions += 1;
        }
    }

    Ok(SyncResponse {
        applied_upserts,
        applied_deletions,
        server_time: timestamp::now_iso(),
    })
}

/// Parse an entry timestamp, falling back to the current instant when
/// the value is missing or unparseable.
fn entry_instant(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(timestamp::parse).unwrap_or_else(Utc::now)
}
