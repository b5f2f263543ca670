pub mod models;
pub mod validation;

use sqlx::{PgPool, migrate::MigrateError, postgres::PgPoolOptions};

/// Default number of connections used by the migration tool.
/// Can be overridden via the `STROFLO_PG_MAX_CONNECTIONS` environment variable.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

pub fn get_max_connections() -> u32 {
    std::env::var("STROFLO_PG_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_MAX_CONNECTIONS)
}

/// Applies the hosted schema (tables, row-level security policies, the card
/// history trigger and `apply_positions`) to the backend's Postgres.
pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let max_connections = get_max_connections();
    tracing::debug!(max_connections, "Connecting to Postgres");
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
