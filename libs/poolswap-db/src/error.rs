use serde::Serialize;
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Failures a sync run can hit, classified by how they are handled.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Bad record or bad configuration. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Connect, query or transaction failure from the store. Retried with backoff.
    #[error("database error: {0}")]
    Connectivity(#[from] sqlx::Error),

    /// Row-count verification failed. Aborts the attempt; the attempt is retried
    /// against a fresh staging table.
    #[error("row count mismatch on {table}: expected {expected}, found {actual}")]
    CountMismatch {
        table: String,
        expected: i64,
        actual: i64,
    },
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SyncError::Validation(_))
    }
}

/// Non-fatal failures from the best-effort steps after a committed swap.
/// Collected into the outcome instead of raised, so callers can report them.
#[derive(Debug, Clone, Error, Serialize)]
pub enum CleanupWarning {
    #[error("failed to recreate index {name}: {detail}")]
    Index { name: String, detail: String },

    #[error("failed to recreate updated_at trigger: {detail}")]
    Trigger { detail: String },

    #[error("failed to drop backup table {table}: {detail}")]
    DropBackup { table: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_not_retryable() {
        assert!(!SyncError::Validation("missing proxy".into()).is_retryable());
    }

    #[test]
    fn connectivity_and_count_mismatch_are_retryable() {
        let conn = SyncError::Connectivity(sqlx::Error::Protocol("connection reset".into()));
        assert!(conn.is_retryable());

        let mismatch = SyncError::CountMismatch {
            table: "pool_staging_abc".into(),
            expected: 10,
            actual: 7,
        };
        assert!(mismatch.is_retryable());
    }

    #[test]
    fn count_mismatch_message_names_table_and_counts() {
        let err = SyncError::CountMismatch {
            table: "pool_staging_abc".into(),
            expected: 3,
            actual: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("pool_staging_abc"));
        assert!(msg.contains("expected 3"));
        assert!(msg.contains("found 2"));
    }

    #[test]
    fn cleanup_warning_messages_name_the_object() {
        let warning = CleanupWarning::Index {
            name: "idx_pool_protocol".into(),
            detail: "permission denied".into(),
        };
        assert!(warning.to_string().contains("idx_pool_protocol"));

        let warning = CleanupWarning::DropBackup {
            table: "pool_backup_abc".into(),
            detail: "lock timeout".into(),
        };
        assert!(warning.to_string().contains("pool_backup_abc"));
    }
}
