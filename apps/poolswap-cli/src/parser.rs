use std::fs;
use std::path::Path;

use poolswap_db::{ProxyRecord, SyncError, SyncResult};
use tracing::warn;

/// Outcome of reading one source file. Malformed lines are counted, not
/// fatal: one bad row must not block the rest of the batch.
#[derive(Debug, Default)]
pub struct ParseSummary {
    pub records: Vec<ProxyRecord>,
    pub invalid_lines: u64,
    pub total_lines: u64,
}

/// Parses pipe-delimited source content, one proxy per line. Blank lines are
/// skipped; anything else counts toward `total_lines`.
pub fn parse_lines(content: &str) -> ParseSummary {
    let mut summary = ParseSummary::default();
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        summary.total_lines += 1;
        let fields: Vec<&str> = trimmed.split('|').collect();
        match ProxyRecord::from_fields(&fields) {
            Ok(record) => summary.records.push(record),
            Err(err) => {
                summary.invalid_lines += 1;
                warn!(line = idx + 1, error = %err, "skipping malformed source line");
            }
        }
    }
    summary
}

pub fn parse_source(path: &Path) -> SyncResult<ParseSummary> {
    let content = fs::read_to_string(path).map_err(|err| {
        SyncError::Validation(format!("cannot read source file {}: {err}", path.display()))
    })?;
    Ok(parse_lines(&content))
}
