//! Pull handler - serves the full record set for a workspace scope.

use crate::db;
use crate::error::Result;
use opsboard_engine::RecordsResponse;
use sqlx::PgPool;

/// Process a pull request: load every stored row for the scope, newest
/// first, including tombstoned rows so clients can drop their copies.
pub async fn handle_pull(
    pool: &PgPool,
    workspace_key: &str,
    app_key: &str,
) -> Result<RecordsResponse> {
    let stored = db::list_records(pool, workspace_key, app_key).await?;

    let records = stored.iter().map(|row| row.to_remote()).collect();

    Ok(RecordsResponse {
        workspace_key: workspace_key.to_string(),
        app_key: app_key.to_string(),
        records,
    })
}
