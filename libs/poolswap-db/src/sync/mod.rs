//! Swap-based batch synchronization of the `pool` table.
//!
//! A run never mutates the live table in place. Records land in a staging
//! table named after a per-run token, the staging row count is verified, and
//! a single transaction renames the live table aside and the staging table
//! into its place. Readers see either the old pool or the new one, never a
//! half-written mix.

pub mod dedup;
pub mod ident;
pub mod retry;
pub mod schema;

use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::error::{CleanupWarning, SyncError, SyncResult};
use crate::models::proxy::ProxyRecord;
use crate::sync::dedup::DedupOutcome;
use crate::sync::ident::RunToken;
use crate::sync::retry::RetryPolicy;

/// What a completed run did. `swapped` is false only for an empty batch,
/// which never touches the store. `warnings` holds post-commit cleanup
/// failures; the new pool is already live when any of them occur.
#[derive(Debug)]
pub struct SwapOutcome {
    pub records_synced: u64,
    pub duplicates_found: u64,
    pub swapped: bool,
    pub warnings: Vec<CleanupWarning>,
}

pub struct SwapSynchronizer {
    pool: PgPool,
    chunk_size: usize,
    retry: RetryPolicy,
}

impl SwapSynchronizer {
    pub fn new(pool: PgPool, chunk_size: usize, retry: RetryPolicy) -> Self {
        Self {
            pool,
            chunk_size: chunk_size.max(1),
            retry,
        }
    }

    /// Replaces the live pool with `records`. An empty batch reports zero
    /// synced records and leaves the live table untouched.
    pub async fn synchronize(&self, records: Vec<ProxyRecord>) -> SyncResult<SwapOutcome> {
        let DedupOutcome { unique, dropped } = dedup::dedupe_by_proxy(records);
        let duplicates_found = dropped.len() as u64;
        if duplicates_found > 0 {
            info!(
                duplicates = duplicates_found,
                sample = dropped.first().map(String::as_str),
                "dropped duplicate proxy keys before staging"
            );
        }

        if unique.is_empty() {
            info!("empty batch, leaving the live pool untouched");
            return Ok(SwapOutcome {
                records_synced: 0,
                duplicates_found,
                swapped: false,
                warnings: Vec::new(),
            });
        }

        let token = self
            .retry
            .run("stage-and-swap", || self.stage_and_swap(&unique))
            .await?;

        let mut warnings = Vec::new();
        self.restore_read_path(&mut warnings).await;
        self.drop_backup(&token, &mut warnings).await;

        info!(
            records = unique.len(),
            duplicates = duplicates_found,
            warnings = warnings.len(),
            run = token.as_str(),
            "pool swap complete"
        );

        Ok(SwapOutcome {
            records_synced: unique.len() as u64,
            duplicates_found,
            swapped: true,
            warnings,
        })
    }

    /// One retryable attempt. Each attempt gets a fresh token so a leftover
    /// staging table from a failed predecessor can never collide with it.
    async fn stage_and_swap(&self, unique: &[ProxyRecord]) -> SyncResult<RunToken> {
        let token = RunToken::generate();
        match self.try_stage_and_swap(&token, unique).await {
            Ok(()) => Ok(token),
            Err(err) => {
                self.drop_staging_best_effort(&token).await;
                Err(err)
            }
        }
    }

    async fn try_stage_and_swap(&self, token: &RunToken, unique: &[ProxyRecord]) -> SyncResult<()> {
        let staging = ident::staging_table(token);

        sqlx::query(&schema::create_table_sql(&staging, false))
            .execute(&self.pool)
            .await?;
        debug!(table = %staging, "staging table created");

        let insert = schema::insert_sql(&staging);
        let mut chunks = 0usize;
        for chunk in unique.chunks(self.chunk_size) {
            let mut tx = self.pool.begin().await?;
            for record in chunk {
                sqlx::query(&insert)
                    .bind(&record.proxy)
                    .bind(&record.protocol)
                    .bind(&record.host)
                    .bind(record.port)
                    .bind(&record.ip)
                    .bind(&record.country)
                    .bind(&record.city)
                    .bind(&record.org)
                    .bind(&record.region)
                    .bind(&record.timezone)
                    .bind(&record.loc)
                    .bind(&record.hostname)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
            chunks += 1;
        }
        debug!(table = %staging, rows = unique.len(), chunks, "staging table loaded");

        let expected = unique.len() as i64;
        let staged: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {staging}"))
            .fetch_one(&self.pool)
            .await?;
        if staged != expected {
            return Err(SyncError::CountMismatch {
                table: staging,
                expected,
                actual: staged,
            });
        }

        let mut tx = self.pool.begin().await?;
        for statement in schema::swap_statements(token) {
            sqlx::query(&statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        info!(run = token.as_str(), "swap transaction committed");

        Ok(())
    }

    async fn drop_staging_best_effort(&self, token: &RunToken) {
        let staging = ident::staging_table(token);
        if let Err(err) = sqlx::query(&format!("DROP TABLE IF EXISTS {staging}"))
            .execute(&self.pool)
            .await
        {
            warn!(table = %staging, error = %err, "failed to clean up staging table");
        }
    }

    /// Recreates secondary indexes and the updated_at trigger on the freshly
    /// swapped-in table. The swap is already committed, so failures degrade
    /// to warnings instead of failing the run.
    async fn restore_read_path(&self, warnings: &mut Vec<CleanupWarning>) {
        for column in schema::SECONDARY_INDEX_COLUMNS {
            let name = schema::index_name(column);
            if let Err(err) = sqlx::query(&schema::secondary_index_sql(column))
                .execute(&self.pool)
                .await
            {
                warn!(index = %name, error = %err, "failed to recreate index after swap");
                warnings.push(CleanupWarning::Index {
                    name,
                    detail: err.to_string(),
                });
            }
        }

        for statement in [
            schema::TRIGGER_FUNCTION_SQL,
            schema::DROP_TRIGGER_SQL,
            schema::CREATE_TRIGGER_SQL,
        ] {
            if let Err(err) = sqlx::query(statement).execute(&self.pool).await {
                warn!(error = %err, "failed to restore updated_at trigger after swap");
                warnings.push(CleanupWarning::Trigger {
                    detail: err.to_string(),
                });
                // the remaining statements depend on the failed one
                break;
            }
        }
    }

    async fn drop_backup(&self, token: &RunToken, warnings: &mut Vec<CleanupWarning>) {
        let backup = ident::backup_table(token);
        if let Err(err) = sqlx::query(&format!("DROP TABLE IF EXISTS {backup}"))
            .execute(&self.pool)
            .await
        {
            warn!(table = %backup, error = %err, "failed to drop backup table after swap");
            warnings.push(CleanupWarning::DropBackup {
                table: backup,
                detail: err.to_string(),
            });
        }
    }
}
