//! Sync endpoint routes.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::Result;
use crate::handlers::{handle_pull, handle_push};
use crate::AppState;
use opsboard_engine::{scope, RecordsResponse, SyncRequest, SyncResponse};

/// Query parameters carrying the app scope.
#[derive(Debug, Deserialize)]
pub struct ScopeQuery {
    pub app: Option<String>,
}

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/ops/workspaces/{workspace_key}/records",
            get(records_handler),
        )
        .route("/ops/workspaces/{workspace_key}/sync", post(sync_handler))
}

/// GET /ops/workspaces/{workspace_key}/records - Pull the full record set.
async fn records_handler(
    State(state): State<AppState>,
    Path(workspace_key): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<RecordsResponse>> {
    let workspace_key = scope::workspace_key(&workspace_key)?;
    let app_key = scope::app_key(query.app.as_deref().unwrap_or_default())?;

    let response = handle_pull(&state.pool, &workspace_key, &app_key).await?;
    Ok(Json(response))
}

/// POST /ops/workspaces/{workspace_key}/sync - Apply upserts and deletions.
async fn sync_handler(
    State(state): State<AppState>,
    Path(workspace_key): Path<String>,
    Query(query): Query<ScopeQuery>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>> {
    let workspace_key = scope::workspace_key(&workspace_key)?;
    let app_key = scope::app_key(query.app.as_deref().unwrap_or_default())?;

    let response = handle_push(&state.pool, &workspace_key, &app_key, request).await?;
    Ok(Json(response))
}
