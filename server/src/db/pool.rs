//! Pool setup and schema migrations.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connection pool shared by every handler.
pub type Pool = PgPool;

/// Upper bound on pooled Postgres connections.
const MAX_CONNECTIONS: u32 = 10;

/// Connect to Postgres and size the pool.
pub async fn create_pool(database_url: &str) -> Result<Pool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

/// Apply any pending migrations from the embedded `migrations/` directory.
pub async fn run_migrations(pool: &Pool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
