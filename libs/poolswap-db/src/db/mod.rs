use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::sync::schema;

/// Connects and bootstraps the pool schema. Every binary entry point goes
/// through here so a fresh database works on first run.
pub async fn connect(database_url: &str) -> SyncResult<PgPool> {
    if !database_url.starts_with("postgres://") && !database_url.starts_with("postgresql://") {
        return Err(SyncError::Validation(
            "database URL must start with postgres:// or postgresql://".into(),
        ));
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    ensure_schema(&pool).await?;
    Ok(pool)
}

/// Idempotent: creates the pool table, its secondary indexes, and the
/// updated_at trigger when missing. Statements run one at a time, the
/// extended query protocol rejects multi-statement strings.
pub async fn ensure_schema(pool: &PgPool) -> SyncResult<()> {
    for statement in schema::ensure_pool_statements() {
        sqlx::query(&statement).execute(pool).await?;
    }
    debug!("pool schema ensured");
    Ok(())
}
