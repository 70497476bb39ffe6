//! End-to-end swap tests against a real database.
//!
//! Run with: DATABASE_URL=postgres://... cargo test --test live_sync -- --ignored --test-threads=1
//! The tests share the one `pool` table, so they are not parallel-safe.

use std::time::Duration;

use poolswap_db::models::stats::HealthStatus;
use poolswap_db::sync::retry::RetryPolicy;
use poolswap_db::{PoolRepository, ProxyRecord, SwapSynchronizer};
use sqlx::PgPool;

async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must point at a scratch PostgreSQL database");
    poolswap_db::connect(&url).await.expect("connect and bootstrap schema")
}

fn synchronizer(pool: PgPool) -> SwapSynchronizer {
    SwapSynchronizer::new(pool, 500, RetryPolicy::new(3, Duration::from_millis(50)))
}

fn record(proxy: &str, port: i32) -> ProxyRecord {
    ProxyRecord {
        proxy: proxy.to_string(),
        protocol: "socks5".to_string(),
        host: "198.51.100.7".to_string(),
        port,
        ip: "198.51.100.7".to_string(),
        country: Some("NL".to_string()),
        city: None,
        org: None,
        region: None,
        timezone: None,
        loc: None,
        hostname: None,
    }
}

async fn live_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM pool")
        .fetch_one(pool)
        .await
        .expect("count live pool")
}

#[tokio::test]
#[ignore] // Requires a live PostgreSQL (DATABASE_URL)
async fn swap_replaces_previous_pool_contents() {
    let pool = test_pool().await;
    let sync = synchronizer(pool.clone());

    let first = vec![record("socks5://old-a:1080", 1080), record("socks5://old-b:1080", 1080)];
    sync.synchronize(first).await.expect("first swap");
    assert_eq!(live_count(&pool).await, 2);

    let second = vec![record("socks5://new-a:9050", 9050)];
    let outcome = sync.synchronize(second).await.expect("second swap");
    assert_eq!(outcome.records_synced, 1);
    assert!(outcome.warnings.is_empty());

    assert_eq!(live_count(&pool).await, 1);
    let survivors: Vec<String> = sqlx::query_scalar("SELECT proxy FROM pool")
        .fetch_all(&pool)
        .await
        .expect("list survivors");
    assert_eq!(survivors, vec!["socks5://new-a:9050".to_string()]);
}

#[tokio::test]
#[ignore] // Requires a live PostgreSQL (DATABASE_URL)
async fn identical_batches_are_idempotent() {
    let pool = test_pool().await;
    let sync = synchronizer(pool.clone());

    let batch = || {
        vec![
            record("socks5://stable-a:1080", 1080),
            record("socks5://stable-b:4145", 4145),
        ]
    };

    sync.synchronize(batch()).await.expect("first run");
    let outcome = sync.synchronize(batch()).await.expect("second run");
    assert_eq!(outcome.records_synced, 2);

    let mut proxies: Vec<String> = sqlx::query_scalar("SELECT proxy FROM pool ORDER BY proxy")
        .fetch_all(&pool)
        .await
        .expect("list pool");
    proxies.sort();
    assert_eq!(
        proxies,
        vec!["socks5://stable-a:1080".to_string(), "socks5://stable-b:4145".to_string()]
    );
}

#[tokio::test]
#[ignore] // Requires a live PostgreSQL (DATABASE_URL)
async fn duplicate_keys_keep_first_occurrence() {
    let pool = test_pool().await;
    let sync = synchronizer(pool.clone());

    let mut first = record("http://192.0.2.10:8080", 8080);
    first.city = Some("Dallas".to_string());
    first.org = Some("AS64500 First".to_string());
    let mut shadow = record("http://192.0.2.10:8080", 8080);
    shadow.city = Some("Reno".to_string());
    shadow.org = Some("AS64501 Shadow".to_string());

    let batch = vec![first, record("socks4://198.51.100.5:1080", 1080), shadow];
    let outcome = sync.synchronize(batch).await.expect("swap with duplicates");
    assert_eq!(outcome.records_synced, 2);
    assert_eq!(outcome.duplicates_found, 1);
    assert!(outcome.swapped);

    let (city, org): (Option<String>, Option<String>) =
        sqlx::query_as("SELECT city, org FROM pool WHERE proxy = $1")
            .bind("http://192.0.2.10:8080")
            .fetch_one(&pool)
            .await
            .expect("fetch surviving duplicate");
    assert_eq!(city.as_deref(), Some("Dallas"), "first occurrence must win");
    assert_eq!(org.as_deref(), Some("AS64500 First"));
}

#[tokio::test]
#[ignore] // Requires a live PostgreSQL (DATABASE_URL)
async fn empty_batch_leaves_pool_unchanged() {
    let pool = test_pool().await;
    let sync = synchronizer(pool.clone());

    sync.synchronize(vec![record("socks5://survivor:1080", 1080)])
        .await
        .expect("seed swap");

    let outcome = sync.synchronize(Vec::new()).await.expect("empty run");
    assert_eq!(outcome.records_synced, 0);
    assert!(!outcome.swapped);
    assert_eq!(live_count(&pool).await, 1, "previous pool must survive an empty batch");
}

#[tokio::test]
#[ignore] // Requires a live PostgreSQL (DATABASE_URL)
async fn insert_failure_keeps_previous_pool_and_drops_staging() {
    let pool = test_pool().await;
    let sync = synchronizer(pool.clone());

    sync.synchronize(vec![record("socks5://keeper:1080", 1080)])
        .await
        .expect("seed swap");

    // PostgreSQL rejects NUL bytes in TEXT, so the chunk insert fails on
    // every attempt
    let mut poisoned = record("socks5://poison:1080", 1080);
    poisoned.org = Some("AS64500\0Poison".to_string());

    let err = sync
        .synchronize(vec![record("socks5://fresh:3128", 3128), poisoned])
        .await
        .expect_err("a rejected insert must fail the run");
    assert!(err.is_retryable(), "store-side failures stay retryable");

    assert_eq!(live_count(&pool).await, 1, "previous pool must survive a failed run");
    let survivors: Vec<String> = sqlx::query_scalar("SELECT proxy FROM pool")
        .fetch_all(&pool)
        .await
        .expect("list survivors");
    assert_eq!(survivors, vec!["socks5://keeper:1080".to_string()]);

    let leftovers: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pg_tables WHERE schemaname = 'public' \
         AND (tablename LIKE 'pool\\_staging\\_%' OR tablename LIKE 'pool\\_backup\\_%')",
    )
    .fetch_one(&pool)
    .await
    .expect("count leftovers");
    assert_eq!(leftovers, 0, "every failed attempt must drop its staging table");
}

#[tokio::test]
#[ignore] // Requires a live PostgreSQL (DATABASE_URL)
async fn repeated_swaps_leave_no_leftovers_and_keep_indexes() {
    let pool = test_pool().await;
    let sync = synchronizer(pool.clone());

    for round in 0..3 {
        let batch = vec![record(&format!("socks5://round-{round}:1080"), 1080)];
        sync.synchronize(batch).await.expect("swap round");
    }

    let leftovers: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pg_tables WHERE schemaname = 'public' \
         AND (tablename LIKE 'pool\\_staging\\_%' OR tablename LIKE 'pool\\_backup\\_%')",
    )
    .fetch_one(&pool)
    .await
    .expect("count leftovers");
    assert_eq!(leftovers, 0, "staging and backup tables must not accumulate");

    let indexes: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pg_indexes WHERE schemaname = 'public' \
         AND tablename = 'pool' AND indexname LIKE 'idx_pool_%'",
    )
    .fetch_one(&pool)
    .await
    .expect("count indexes");
    assert_eq!(indexes, 6, "every secondary index must survive the swaps");
}

#[tokio::test]
#[ignore] // Requires a live PostgreSQL (DATABASE_URL)
async fn prune_removes_orphaned_swap_tables() {
    let pool = test_pool().await;
    let repo = PoolRepository::new(pool.clone());

    sqlx::query("CREATE TABLE IF NOT EXISTS pool_staging_deadbeef (proxy TEXT PRIMARY KEY)")
        .execute(&pool)
        .await
        .expect("plant orphan staging table");
    sqlx::query("CREATE TABLE IF NOT EXISTS pool_backup_deadbeef (proxy TEXT PRIMARY KEY)")
        .execute(&pool)
        .await
        .expect("plant orphan backup table");
    // only matches the catalog patterns if the underscores act as wildcards
    sqlx::query("CREATE TABLE IF NOT EXISTS poolxstagingxdata (proxy TEXT PRIMARY KEY)")
        .execute(&pool)
        .await
        .expect("plant unrelated table");

    let dropped = repo.prune_orphans().await.expect("prune");
    assert!(dropped.contains(&"pool_staging_deadbeef".to_string()));
    assert!(dropped.contains(&"pool_backup_deadbeef".to_string()));
    assert!(
        !dropped.contains(&"poolxstagingxdata".to_string()),
        "prune must not touch tables outside the swap namespace"
    );

    let remaining: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pg_tables WHERE tablename IN ('pool_staging_deadbeef', 'pool_backup_deadbeef')",
    )
    .fetch_one(&pool)
    .await
    .expect("count planted orphans");
    assert_eq!(remaining, 0);

    let unrelated: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pg_tables WHERE tablename = 'poolxstagingxdata'")
            .fetch_one(&pool)
            .await
            .expect("count unrelated table");
    assert_eq!(unrelated, 1, "unrelated table must survive a prune");

    sqlx::query("DROP TABLE IF EXISTS poolxstagingxdata")
        .execute(&pool)
        .await
        .expect("remove unrelated table");
}

#[tokio::test]
#[ignore] // Requires a live PostgreSQL (DATABASE_URL)
async fn repository_reports_count_clear_and_health() {
    let pool = test_pool().await;
    let sync = synchronizer(pool.clone());
    let repo = PoolRepository::new(pool.clone());

    sync.synchronize(vec![record("socks5://health:1080", 1080)])
        .await
        .expect("seed swap");

    assert_eq!(repo.count().await.expect("count"), 1);
    let report = repo.health_check().await;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.record_count, 1);
    assert!(report.error.is_none());

    repo.clear_all().await.expect("clear");
    assert_eq!(repo.count().await.expect("count after clear"), 0);
    assert_eq!(repo.health_check().await.status, HealthStatus::Empty);
}
