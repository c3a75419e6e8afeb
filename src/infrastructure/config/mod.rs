//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading
//! - Environment variable overrides
//! - Configuration validation
//! - Type-safe config structs

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};

use serde::{Deserialize, Serialize};

use crate::infrastructure::logging::LogConfig;

/// Top-level scheduler configuration, per spec.md §6's enumerated
/// surface (`identity`, `start_worker`, `logger`) plus the adapter
/// settings (database location, claim lease, batch size) the
/// distilled spec delegates to "the data store."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Overrides the generated `{host}-{pid}-{instance}` identity.
    #[serde(default)]
    pub identity: Option<String>,

    /// Whether the lifecycle manager starts an in-process worker
    /// alongside the scheduling loop.
    #[serde(default = "default_start_worker")]
    pub start_worker: bool,

    /// `sqlx` connection string for the SQLite data store.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// How long `acquire_schedules` holds a claim before another
    /// instance may reclaim an abandoned schedule.
    #[serde(default = "default_lease_seconds")]
    pub claim_lease_seconds: i64,

    /// `BATCH` from spec.md §4.2: the max schedules claimed per
    /// scheduling-loop iteration.
    #[serde(default = "default_batch_size")]
    pub acquire_batch_size: usize,

    /// The shielded window (spec.md §4.1 step 3) the lifecycle manager
    /// allows for publishing `SchedulerStopped` during shutdown.
    #[serde(default = "default_stopped_publish_timeout_ms")]
    pub stopped_publish_timeout_ms: u64,

    #[serde(default)]
    pub logging: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity: None,
            start_worker: default_start_worker(),
            database_url: default_database_url(),
            claim_lease_seconds: default_lease_seconds(),
            acquire_batch_size: default_batch_size(),
            stopped_publish_timeout_ms: default_stopped_publish_timeout_ms(),
            logging: LogConfig::default(),
        }
    }
}

fn default_start_worker() -> bool {
    true
}

fn default_database_url() -> String {
    "sqlite:.scheduler/scheduler.db".to_string()
}

fn default_lease_seconds() -> i64 {
    30
}

fn default_batch_size() -> usize {
    100
}

fn default_stopped_publish_timeout_ms() -> u64 {
    3_000
}
