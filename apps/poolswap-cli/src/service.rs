use std::path::Path;
use std::time::Duration;

use poolswap_db::models::stats::{RunReport, RunStats};
use poolswap_db::sqlx::PgPool;
use poolswap_db::sync::retry::RetryPolicy;
use poolswap_db::{PoolRepository, SwapSynchronizer, SyncError, SyncResult};
use tracing::{error, info, warn};

use crate::parser::{self, ParseSummary};

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub database_url: String,
    pub source_path: String,
    pub chunk_size: usize,
    pub max_attempts: u32,
    pub base_delay: Duration,
}

/// Rejects settings that could never produce a working run. Caught here so
/// they surface as configuration errors instead of failed runs.
pub fn validate_settings(settings: &SyncSettings) -> SyncResult<()> {
    if !settings.database_url.starts_with("postgres://")
        && !settings.database_url.starts_with("postgresql://")
    {
        return Err(SyncError::Validation(
            "database URL must start with postgres:// or postgresql://".into(),
        ));
    }
    if settings.source_path.trim().is_empty() {
        return Err(SyncError::Validation("source path must not be empty".into()));
    }
    if settings.chunk_size == 0 {
        return Err(SyncError::Validation("chunk size must be at least 1".into()));
    }
    if settings.max_attempts == 0 {
        return Err(SyncError::Validation("max attempts must be at least 1".into()));
    }
    Ok(())
}

/// Drives one batch refresh end to end: parse, swap, verify. Owns the run
/// counters so repeated runs through one service accumulate.
pub struct SyncService {
    settings: SyncSettings,
    stats: RunStats,
}

impl SyncService {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            settings,
            stats: RunStats::default(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// `Err` means the run never started (bad settings or unreadable source).
    /// Everything after that folds into the report, including failures.
    pub async fn run(&mut self) -> SyncResult<RunReport> {
        validate_settings(&self.settings)?;
        let summary = parser::parse_source(Path::new(&self.settings.source_path))?;
        info!(
            source = %self.settings.source_path,
            records = summary.records.len(),
            invalid = summary.invalid_lines,
            "source file parsed"
        );
        Ok(self.execute(summary).await)
    }

    async fn execute(&mut self, summary: ParseSummary) -> RunReport {
        let invalid_lines = summary.invalid_lines;

        let pool = match poolswap_db::connect(&self.settings.database_url).await {
            Ok(pool) => pool,
            Err(err) => {
                error!(error = %err, "could not reach the database");
                return self.fail(invalid_lines, err);
            }
        };

        let result = self.sync_on(&pool, summary).await;
        pool.close().await;

        match result {
            Ok(report) => {
                self.stats.record_success(report.records_synced);
                report
            }
            Err(err) => {
                error!(error = %err, "sync run failed");
                self.fail(invalid_lines, err)
            }
        }
    }

    async fn sync_on(&self, pool: &PgPool, summary: ParseSummary) -> SyncResult<RunReport> {
        let retry = RetryPolicy::new(self.settings.max_attempts, self.settings.base_delay);
        let synchronizer = SwapSynchronizer::new(pool.clone(), self.settings.chunk_size, retry);
        let outcome = synchronizer.synchronize(summary.records).await?;

        // an empty batch left the previous pool in place, so there is
        // nothing to verify against
        let post_count_matches = if outcome.swapped {
            let repo = PoolRepository::new(pool.clone());
            match repo.count().await {
                Ok(live) if live == outcome.records_synced as i64 => true,
                Ok(live) => {
                    warn!(
                        expected = outcome.records_synced,
                        actual = live,
                        "live row count does not match the synced batch"
                    );
                    false
                }
                Err(err) => {
                    warn!(error = %err, "could not verify the live row count");
                    false
                }
            }
        } else {
            true
        };

        Ok(RunReport {
            success: true,
            records_synced: outcome.records_synced,
            duplicates_found: outcome.duplicates_found,
            invalid_lines: summary.invalid_lines,
            post_count_matches,
            warnings: outcome.warnings,
            error: None,
        })
    }

    fn fail(&mut self, invalid_lines: u64, err: SyncError) -> RunReport {
        self.stats.record_failure(err.to_string());
        let mut report = RunReport::failed(err.to_string());
        report.invalid_lines = invalid_lines;
        report
    }
}
