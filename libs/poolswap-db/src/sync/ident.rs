use uuid::Uuid;

/// Name of the live table downstream readers query.
pub const POOL_TABLE: &str = "pool";

/// PostgreSQL truncates identifiers beyond this (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

const STAGING_PREFIX: &str = "pool_staging_";
const BACKUP_PREFIX: &str = "pool_backup_";

/// Token scoping one sync attempt. Every staging/backup object name derives
/// from it, so concurrent runs and retries of the same run can never collide
/// on a name, and nothing user-controlled is ever interpolated into DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunToken(String);

impl RunToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn staging_table(token: &RunToken) -> String {
    format!("{STAGING_PREFIX}{}", token.as_str())
}

pub fn backup_table(token: &RunToken) -> String {
    format!("{BACKUP_PREFIX}{}", token.as_str())
}

/// Backup-scoped name for a secondary index parked with the old live table
/// during the swap, freeing the canonical name for recreation.
pub fn backup_index(token: &RunToken, column: &str) -> String {
    format!("idx_{BACKUP_PREFIX}{}_{column}", token.as_str())
}

/// True for names a swap run created: an exact staging or backup prefix with
/// nothing outside the safe charset. Pruning refuses to drop anything else.
pub fn is_swap_table(name: &str) -> bool {
    (name.starts_with(STAGING_PREFIX) || name.starts_with(BACKUP_PREFIX))
        && is_safe_identifier(name)
}

/// True for names this engine is willing to splice into DDL: lowercase
/// alphanumerics and underscores, starting with a letter or underscore,
/// within the store's length cap.
pub fn is_safe_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_IDENTIFIER_LEN {
        return false;
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('0');
    if !(first.is_ascii_lowercase() || first == '_') {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
