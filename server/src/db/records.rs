//! Database operations for the workspace_records table.

use chrono::{DateTime, Utc};
use opsboard_engine::{timestamp, RemoteRecord};
use sqlx::{PgPool, Row};

/// A stored record row from the database.
#[derive(Debug)]
pub struct StoredRecord {
    pub client_id: String,
    pub payload: Option<serde_json::Value>,
    pub deleted: bool,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredRecord {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredRecord {
            client_id: row.try_get("client_id")?,
            payload: row.try_get("payload")?,
            deleted: row.try_get("deleted")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredRecord {
    /// Convert a database row to a wire-format record.
    pub fn to_remote(&self) -> RemoteRecord {
        RemoteRecord {
            client_id: self.client_id.clone(),
            updated_at: Some(timestamp::format_iso(self.updated_at)),
            deleted: self.deleted,
            payload: self.payload.clone(),
        }
    }
}

/// Get every stored row for a workspace scope, newest first.
pub async fn list_records(
    pool: &PgPool,
    workspace_key: &str,
    app_key: &str,
) -> Result<Vec<StoredRecord>, sqlx::Error> {
    sqlx::query_as::<_, StoredRecord>(
        r#"
        SELECT client_id, payload, deleted, updated_at
        FROM workspace_records
        WHERE workspace_key = $1 AND app_key = $2
        ORDER BY updated_at DESC, client_id ASC
        "#,
    )
    .bind(workspace_key)
    .bind(app_key)
    .fetch_all(pool)
    .await
}

/// Conditionally upsert a live record.
///
/// The row only changes when none exists yet or the stored timestamp is
/// not newer than the incoming one. Returns whether a row was written.
pub async fn upsert_record(
    pool: &PgPool,
    workspace_key: &str,
    app_key: &str,
    client_id: &str,
    payload: &serde_json::Value,
    updated_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO workspace_records (
            workspace_key, app_key, client_id, payload, deleted, updated_at
        )
        VALUES ($1, $2, $3, $4, false, $5)
        ON CONFLICT (workspace_key, app_key, client_id) DO UPDATE SET
            payload = EXCLUDED.payload,
            deleted = false,
            updated_at = EXCLUDED.updated_at
        WHERE workspace_records.updated_at <= EXCLUDED.updated_at
        "#,
    )
    .bind(workspace_key)
    .bind(app_key)
    .bind(client_id)
    .bind(payload)
    .bind(updated_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Conditionally tombstone a record.
///
/// Same timestamp predicate as [`upsert_record`]; the payload is cleared
/// so deleted rows only carry their id and deletion time.
pub async fn mark_deleted(
    pool: &PgPool,
    workspace_key: &str,
    app_key: &str,
    client_id: &str,
    updated_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO workspace_records (
            workspace_key, app_key, client_id, payload, deleted, updated_at
        )
        VALUES ($1, $2, $3, NULL, true, $4)
        ON CONFLICT (workspace_key, app_key, client_id) DO UPDATE SET
            payload = NULL,
            deleted = true,
            updated_at = EXCLUDED.updated_at
        WHERE workspace_records.updated_at <= EXCLUDED.updated_at
        "#,
    )
    .bind(workspace_key)
    .bind(app_key)
    .bind(client_id)
    .bind(updated_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
