use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CleanupWarning;

/// Cumulative statistics across sync runs. Owned by the caller and updated in
/// one step per run, so repeated or test runs never interfere through shared
/// process state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub last_record_count: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl RunStats {
    pub fn record_success(&mut self, records_synced: u64) {
        self.total_runs += 1;
        self.successful_runs += 1;
        self.last_record_count = records_synced;
        self.last_run_at = Some(Utc::now());
        self.last_error = None;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.total_runs += 1;
        self.failed_runs += 1;
        self.last_run_at = Some(Utc::now());
        self.last_error = Some(error.into());
    }
}

/// Result of one end-to-end sync run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub success: bool,
    pub records_synced: u64,
    pub duplicates_found: u64,
    pub invalid_lines: u64,
    pub post_count_matches: bool,
    pub warnings: Vec<CleanupWarning>,
    pub error: Option<String>,
}

impl RunReport {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            records_synced: 0,
            duplicates_found: 0,
            invalid_lines: 0,
            post_count_matches: true,
            warnings: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Empty,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Empty => "empty",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

/// Snapshot from a timed count query against the live pool table.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub record_count: i64,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

impl HealthReport {
    /// Report for a store that could not be reached at all.
    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            record_count: 0,
            response_time_ms: 0,
            error: Some(error.into()),
        }
    }
}
