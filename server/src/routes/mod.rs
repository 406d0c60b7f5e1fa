//! Route registration.

mod health;
mod sync;

use crate::AppState;
use axum::Router;

/// Assemble the full route table.
pub fn create_routes() -> Router<AppState> {
    Router::new().merge(health::routes()).merge(sync::routes())
}
