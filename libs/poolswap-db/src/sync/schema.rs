//! Single source of truth for the pool table's DDL: the live table, its
//! per-run staging twins, secondary indexes, and the updated_at trigger.

use crate::sync::ident::{self, POOL_TABLE, RunToken};

/// Columns carrying a non-unique index on the live table.
pub const SECONDARY_INDEX_COLUMNS: [&str; 6] =
    ["protocol", "country", "city", "host", "region", "hostname"];

pub const TRIGGER_FUNCTION_SQL: &str = r#"
CREATE OR REPLACE FUNCTION pool_touch_updated_at() RETURNS trigger AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql
"#;

pub const DROP_TRIGGER_SQL: &str = "DROP TRIGGER IF EXISTS pool_touch_updated_at ON pool";

pub const CREATE_TRIGGER_SQL: &str = "CREATE TRIGGER pool_touch_updated_at \
     BEFORE UPDATE ON pool \
     FOR EACH ROW EXECUTE FUNCTION pool_touch_updated_at()";

/// Table DDL shared by the live pool and every staging table. The primary-key
/// constraint carries the table's own name so staging pkeys never collide with
/// the one parked on a backup.
pub fn create_table_sql(table: &str, if_not_exists: bool) -> String {
    debug_assert!(ident::is_safe_identifier(table));
    let if_not_exists = if if_not_exists { "IF NOT EXISTS " } else { "" };
    format!(
        r#"
CREATE TABLE {if_not_exists}{table} (
    proxy      TEXT NOT NULL,
    protocol   TEXT NOT NULL,
    host       TEXT NOT NULL,
    port       INTEGER NOT NULL,
    ip         TEXT NOT NULL,
    country    TEXT,
    city       TEXT,
    org        TEXT,
    region     TEXT,
    timezone   TEXT,
    loc        TEXT,
    hostname   TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT {table}_pkey PRIMARY KEY (proxy)
)
"#
    )
}

pub fn insert_sql(table: &str) -> String {
    debug_assert!(ident::is_safe_identifier(table));
    format!(
        "INSERT INTO {table} \
         (proxy, protocol, host, port, ip, country, city, org, region, timezone, loc, hostname) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
    )
}

pub fn index_name(column: &str) -> String {
    format!("idx_{POOL_TABLE}_{column}")
}

pub fn secondary_index_sql(column: &str) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {POOL_TABLE} ({column})",
        index_name(column)
    )
}

/// Recreates the read-path extras on a freshly swapped-in pool table.
pub fn index_and_trigger_statements() -> Vec<String> {
    let mut statements: Vec<String> = SECONDARY_INDEX_COLUMNS
        .iter()
        .map(|column| secondary_index_sql(column))
        .collect();
    statements.push(TRIGGER_FUNCTION_SQL.to_string());
    statements.push(DROP_TRIGGER_SQL.to_string());
    statements.push(CREATE_TRIGGER_SQL.to_string());
    statements
}

/// Idempotent bootstrap run at connect time. Without it the first swap would
/// have no `pool` table to rename aside.
pub fn ensure_pool_statements() -> Vec<String> {
    let mut statements = vec![create_table_sql(POOL_TABLE, true)];
    statements.extend(index_and_trigger_statements());
    statements
}

/// The atomic swap, executed inside a single transaction. The old live table
/// moves aside under a backup name together with its secondary indexes —
/// index names are schema-global in PostgreSQL, and leaving them behind would
/// make the later `CREATE INDEX IF NOT EXISTS` a silent no-op until the
/// backup drop deleted the only copy.
pub fn swap_statements(token: &RunToken) -> Vec<String> {
    let staging = ident::staging_table(token);
    let backup = ident::backup_table(token);

    let mut statements = vec![format!("ALTER TABLE {POOL_TABLE} RENAME TO {backup}")];
    for column in SECONDARY_INDEX_COLUMNS {
        statements.push(format!(
            "ALTER INDEX IF EXISTS {} RENAME TO {}",
            index_name(column),
            ident::backup_index(token, column)
        ));
    }
    statements.push(format!("ALTER TABLE {staging} RENAME TO {POOL_TABLE}"));
    statements
}
