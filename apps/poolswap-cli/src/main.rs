use std::io::Write;
use std::process::exit;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use poolswap_db::models::stats::{HealthReport, HealthStatus, RunReport};
use poolswap_db::{PoolRepository, SyncError};

mod cli;
mod parser;
mod service;

use service::{SyncService, SyncSettings};

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_UNHEALTHY: i32 = 2;
const EXIT_ERROR: i32 = 3;

#[derive(Parser)]
#[command(name = "poolswap")]
#[command(about = "Swap-based proxy pool table synchronizer", long_about = None, version)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the pool table with the contents of a source file
    Sync {
        /// Pipe-delimited source file, one proxy per line
        #[arg(long, env = "POOLSWAP_SOURCE")]
        source: String,
        /// Rows per insert transaction
        #[arg(long, env = "POOLSWAP_CHUNK_SIZE", default_value_t = 1000)]
        chunk_size: usize,
        /// Attempts before giving up on a transient failure
        #[arg(long, env = "POOLSWAP_MAX_ATTEMPTS", default_value_t = 3)]
        max_attempts: u32,
        /// First retry delay in milliseconds, doubling per attempt
        #[arg(long, env = "POOLSWAP_BASE_DELAY_MS", default_value_t = 500)]
        base_delay_ms: u64,
        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Check the live pool and report its state
    Health {
        /// Print the health report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Print the live pool row count
    Count,
    /// Empty the live pool table
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Drop staging and backup tables left behind by crashed runs
    Prune,
    /// Install a systemd service and timer for periodic sync
    InstallTimer {
        /// Timer cadence, e.g. 30s, 10m, 1h
        #[arg(long, default_value = "10m")]
        interval: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "poolswap=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let code = run(cli).await;
    exit(code);
}

async fn run(cli: Cli) -> i32 {
    let Cli { database_url, command } = cli;

    match command {
        Commands::Sync { source, chunk_size, max_attempts, base_delay_ms, json } => {
            let Some(database_url) = database_url else {
                return missing_database_url();
            };
            let settings = SyncSettings {
                database_url,
                source_path: source,
                chunk_size,
                max_attempts,
                base_delay: Duration::from_millis(base_delay_ms),
            };

            let mut service = SyncService::new(settings);
            let report = match service.run().await {
                Ok(report) => report,
                Err(err) => {
                    eprintln!("poolswap: {err}");
                    return EXIT_ERROR;
                }
            };

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".into())
                );
            } else if report.success {
                println!(
                    "Synced {} records ({} duplicates dropped, {} invalid lines skipped).",
                    report.records_synced, report.duplicates_found, report.invalid_lines
                );
                for warning in &report.warnings {
                    println!("warning: {warning}");
                }
                if !report.post_count_matches {
                    println!("warning: live row count does not match the synced batch");
                }
            } else {
                eprintln!(
                    "Sync failed: {}",
                    report.error.as_deref().unwrap_or("unknown error")
                );
            }
            exit_code_for_report(&report)
        }

        Commands::Health { json } => {
            let Some(database_url) = database_url else {
                return missing_database_url();
            };
            let report = match poolswap_db::connect(&database_url).await {
                Ok(pool) => {
                    let report = PoolRepository::new(pool.clone()).health_check().await;
                    pool.close().await;
                    report
                }
                Err(err) => HealthReport::unreachable(err.to_string()),
            };

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".into())
                );
            } else {
                println!(
                    "status: {} ({} records, {} ms)",
                    report.status.as_str(),
                    report.record_count,
                    report.response_time_ms
                );
                if let Some(error) = &report.error {
                    println!("error: {error}");
                }
            }
            exit_code_for_health(report.status)
        }

        Commands::Count => {
            let Some(database_url) = database_url else {
                return missing_database_url();
            };
            match count_live_rows(&database_url).await {
                Ok(count) => {
                    println!("{count}");
                    EXIT_SUCCESS
                }
                Err(err) => {
                    eprintln!("poolswap: {err}");
                    exit_code_for_error(&err)
                }
            }
        }

        Commands::Clear { yes } => {
            let Some(database_url) = database_url else {
                return missing_database_url();
            };
            if !yes && !confirm_clear() {
                println!("Aborted.");
                return EXIT_SUCCESS;
            }
            match clear_live_rows(&database_url).await {
                Ok(()) => {
                    println!("Pool table cleared.");
                    EXIT_SUCCESS
                }
                Err(err) => {
                    eprintln!("poolswap: {err}");
                    exit_code_for_error(&err)
                }
            }
        }

        Commands::Prune => {
            let Some(database_url) = database_url else {
                return missing_database_url();
            };
            match prune_orphans(&database_url).await {
                Ok(dropped) if dropped.is_empty() => {
                    println!("No orphaned swap tables found.");
                    EXIT_SUCCESS
                }
                Ok(dropped) => {
                    for table in &dropped {
                        println!("dropped {table}");
                    }
                    println!("Pruned {} orphaned swap tables.", dropped.len());
                    EXIT_SUCCESS
                }
                Err(err) => {
                    eprintln!("poolswap: {err}");
                    exit_code_for_error(&err)
                }
            }
        }

        Commands::InstallTimer { interval } => match cli::install_timer(&interval) {
            Ok(()) => EXIT_SUCCESS,
            Err(err) => {
                eprintln!("poolswap: {err}");
                EXIT_ERROR
            }
        },
    }
}

async fn count_live_rows(database_url: &str) -> poolswap_db::SyncResult<i64> {
    let pool = poolswap_db::connect(database_url).await?;
    let count = PoolRepository::new(pool.clone()).count().await;
    pool.close().await;
    count
}

async fn clear_live_rows(database_url: &str) -> poolswap_db::SyncResult<()> {
    let pool = poolswap_db::connect(database_url).await?;
    let result = PoolRepository::new(pool.clone()).clear_all().await;
    pool.close().await;
    result
}

async fn prune_orphans(database_url: &str) -> poolswap_db::SyncResult<Vec<String>> {
    let pool = poolswap_db::connect(database_url).await?;
    let result = PoolRepository::new(pool.clone()).prune_orphans().await;
    pool.close().await;
    result
}

fn missing_database_url() -> i32 {
    eprintln!("poolswap: DATABASE_URL is not set (use --database-url or the environment)");
    EXIT_ERROR
}

fn confirm_clear() -> bool {
    print!("This empties the live pool table. Continue? [y/N] ");
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes" | "YES")
}

/// A committed swap that degraded along the way, whether through cleanup
/// warnings or skipped source lines, still exits nonzero so timers and
/// scripts notice it.
fn exit_code_for_report(report: &RunReport) -> i32 {
    if report.success
        && report.post_count_matches
        && report.warnings.is_empty()
        && report.invalid_lines == 0
    {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

fn exit_code_for_health(status: HealthStatus) -> i32 {
    match status {
        HealthStatus::Healthy => EXIT_SUCCESS,
        HealthStatus::Empty => EXIT_FAILURE,
        HealthStatus::Unhealthy => EXIT_UNHEALTHY,
    }
}

/// Misconfiguration is distinct from a run that failed against a live store.
fn exit_code_for_error(err: &SyncError) -> i32 {
    if matches!(err, SyncError::Validation(_)) {
        EXIT_ERROR
    } else {
        EXIT_FAILURE
    }
}
