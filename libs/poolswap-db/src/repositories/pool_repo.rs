use std::time::Instant;

use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::SyncResult;
use crate::models::stats::{HealthReport, HealthStatus};
use crate::sync::ident::{self, POOL_TABLE};

/// Read-side operations on the live pool table.
#[derive(Debug, Clone)]
pub struct PoolRepository {
    pool: PgPool,
}

impl PoolRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn count(&self) -> SyncResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM pool")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Empties the live table in place. TRUNCATE resets the heap without a
    /// per-row scan and keeps indexes and triggers attached.
    pub async fn clear_all(&self) -> SyncResult<()> {
        sqlx::query("TRUNCATE TABLE pool")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Never errors: an unreachable database is itself a health answer.
    pub async fn health_check(&self) -> HealthReport {
        let started = Instant::now();
        match self.count().await {
            Ok(record_count) => HealthReport {
                status: if record_count > 0 {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Empty
                },
                record_count,
                response_time_ms: started.elapsed().as_millis() as u64,
                error: None,
            },
            Err(err) => {
                let mut report = HealthReport::unreachable(err.to_string());
                report.response_time_ms = started.elapsed().as_millis() as u64;
                report
            }
        }
    }

    /// Drops staging and backup tables left behind by runs that died between
    /// creating them and cleaning up. Returns the names it removed.
    pub async fn prune_orphans(&self) -> SyncResult<Vec<String>> {
        // a bare _ is a single-character wildcard in LIKE, escape it so the
        // patterns match the literal prefixes only
        let orphans: Vec<String> = sqlx::query_scalar(
            "SELECT tablename::text FROM pg_tables \
             WHERE schemaname = 'public' \
             AND (tablename LIKE $1 OR tablename LIKE $2) \
             ORDER BY tablename",
        )
        .bind(format!("{POOL_TABLE}\\_staging\\_%"))
        .bind(format!("{POOL_TABLE}\\_backup\\_%"))
        .fetch_all(&self.pool)
        .await?;

        let mut dropped = Vec::with_capacity(orphans.len());
        for table in orphans {
            if !ident::is_swap_table(&table) {
                warn!(table = %table, "skipping table outside the swap namespace");
                continue;
            }
            match sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
                .execute(&self.pool)
                .await
            {
                Ok(_) => {
                    info!(table = %table, "dropped orphaned swap table");
                    dropped.push(table);
                }
                Err(err) => {
                    warn!(table = %table, error = %err, "failed to drop orphaned swap table");
                }
            }
        }
        Ok(dropped)
    }
}
