//! Connection pool construction and migration bootstrap.

use std::time::Duration;

use schedula_core::CoreError;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Bounds applied to the pool, per the configuration surface in §6. All
/// fields are required; callers pick defaults in their own configuration
/// layer rather than here.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            max_lifetime: Duration::from_secs(30 * 60),
            idle_timeout: Duration::from_secs(10 * 60),
        }
    }
}

/// Build a connection pool against `database_url` and run pending migrations.
///
/// Migrations are embedded at compile time from `./migrations` and applied
/// unconditionally at startup; there is no separate migration step in this
/// core.
pub async fn build_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, CoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .connect(database_url)
        .await
        .map_err(|e| CoreError::internal(format!("failed to connect to database: {e}")))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| CoreError::internal(format!("failed to run migrations: {e}")))?;

    tracing::info!("database pool established and migrations applied");

    Ok(pool)
}
