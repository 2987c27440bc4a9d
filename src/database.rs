//! # Database Bootstrap
//!
//! Pool construction and embedded schema migrations. The pool is shared by
//! the stores, the broker adapter, and the advisory lock.

use crate::error::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Connect to Postgres with service defaults.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    info!("Database pool established");
    Ok(pool)
}

/// Apply outstanding migrations from the embedded `migrations/` set.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| crate::error::CoreError::Database(e.to_string()))?;
    info!("Database migrations applied");
    Ok(())
}
