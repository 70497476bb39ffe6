use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{SyncError, SyncResult};

/// Number of pipe-delimited fields in one source line.
pub const FIELD_COUNT: usize = 12;

/// One proxy entry. Built once per source line, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ProxyRecord {
    pub proxy: String,
    pub protocol: String,
    pub host: String,
    pub port: i32,
    pub ip: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub org: Option<String>,
    pub region: Option<String>,
    pub timezone: Option<String>,
    pub loc: Option<String>,
    pub hostname: Option<String>,
}

impl ProxyRecord {
    /// Builds a record from the 12 fields of one source line, in file order:
    /// proxy|protocol|host|port|ip|country|city|org|region|timezone|loc|hostname.
    ///
    /// Returns a `Validation` error unless `proxy`, `protocol`, `host` and `ip`
    /// are non-empty and `port` parses as an integer. Invalid records are never
    /// admitted into a batch.
    pub fn from_fields(fields: &[&str]) -> SyncResult<Self> {
        if fields.len() != FIELD_COUNT {
            return Err(SyncError::Validation(format!(
                "expected {FIELD_COUNT} fields, got {}",
                fields.len()
            )));
        }

        let proxy = required(fields[0], "proxy")?;
        let protocol = required(fields[1], "protocol")?;
        let host = required(fields[2], "host")?;
        let port: i32 = fields[3].trim().parse().map_err(|_| {
            SyncError::Validation(format!("invalid port '{}' for {proxy}", fields[3].trim()))
        })?;
        let ip = required(fields[4], "ip")?;

        Ok(Self {
            proxy,
            protocol,
            host,
            port,
            ip,
            country: optional(fields[5]),
            city: optional(fields[6]),
            org: optional(fields[7]),
            region: optional(fields[8]),
            timezone: optional(fields[9]),
            loc: optional(fields[10]),
            hostname: optional(fields[11]),
        })
    }
}

fn required(raw: &str, name: &str) -> SyncResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(SyncError::Validation(format!("missing required field '{name}'")));
    }
    Ok(value.to_string())
}

fn optional(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
