use std::collections::HashSet;

use crate::models::proxy::ProxyRecord;

/// Result of collapsing a batch on the `proxy` key.
#[derive(Debug, Default)]
pub struct DedupOutcome {
    /// Surviving records, input order preserved.
    pub unique: Vec<ProxyRecord>,
    /// One entry per dropped occurrence, so `dropped.len()` is the exact
    /// number of rows that never reach the staging table.
    pub dropped: Vec<String>,
}

/// Collapses duplicate `proxy` keys, keeping the first occurrence of each.
/// The staging table's primary key would reject duplicates anyway; dropping
/// them here keeps the chunked insert free of partial-failure handling.
pub fn dedupe_by_proxy(records: Vec<ProxyRecord>) -> DedupOutcome {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    let mut outcome = DedupOutcome {
        unique: Vec::with_capacity(records.len()),
        dropped: Vec::new(),
    };

    for record in records {
        if seen.insert(record.proxy.clone()) {
            outcome.unique.push(record);
        } else {
            outcome.dropped.push(record.proxy);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(proxy: &str, port: i32) -> ProxyRecord {
        ProxyRecord {
            proxy: proxy.to_string(),
            protocol: "socks5".to_string(),
            host: "10.0.0.1".to_string(),
            port,
            ip: "10.0.0.1".to_string(),
            country: None,
            city: None,
            org: None,
            region: None,
            timezone: None,
            loc: None,
            hostname: None,
        }
    }

    #[test]
    fn first_occurrence_wins_and_order_is_preserved() {
        let outcome = dedupe_by_proxy(vec![
            record("socks5://a:1080", 1080),
            record("socks5://b:1080", 1080),
            record("socks5://a:1080", 9999),
        ]);

        assert_eq!(outcome.unique.len(), 2);
        assert_eq!(outcome.unique[0].proxy, "socks5://a:1080");
        assert_eq!(outcome.unique[0].port, 1080, "first occurrence must win");
        assert_eq!(outcome.unique[1].proxy, "socks5://b:1080");
        assert_eq!(outcome.dropped, vec!["socks5://a:1080".to_string()]);
    }

    #[test]
    fn triple_duplicate_reports_two_drops() {
        let outcome = dedupe_by_proxy(vec![
            record("socks5://a:1080", 1),
            record("socks5://a:1080", 2),
            record("socks5://a:1080", 3),
        ]);

        assert_eq!(outcome.unique.len(), 1);
        assert_eq!(outcome.dropped.len(), 2);
        assert!(outcome.dropped.iter().all(|p| p == "socks5://a:1080"));
    }

    #[test]
    fn empty_batch_passes_through() {
        let outcome = dedupe_by_proxy(Vec::new());
        assert!(outcome.unique.is_empty());
        assert!(outcome.dropped.is_empty());
    }
}
