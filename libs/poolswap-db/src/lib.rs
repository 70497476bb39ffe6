pub mod db;
pub mod error;
pub mod models;
pub mod repositories;
pub mod sync;

pub use sqlx;

pub use db::{connect, ensure_schema};
pub use error::{CleanupWarning, SyncError, SyncResult};
pub use models::proxy::ProxyRecord;
pub use models::stats::{HealthReport, HealthStatus, RunReport, RunStats};
pub use repositories::PoolRepository;
pub use sync::retry::RetryPolicy;
pub use sync::{SwapOutcome, SwapSynchronizer};
