//! Domain layer for the scheduler core.
//!
//! Pure business logic, models, and the ports implemented by adapters.
//! Contains no infrastructure concerns (no sqlx, no tokio::net, ...).

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, SchedulerError, SchedulerResult};
