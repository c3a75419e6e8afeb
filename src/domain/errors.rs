//! Domain errors for the scheduler core.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the data store, task registry, and trigger layer.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("schedule not found: {0}")]
    ScheduleNotFound(String),

    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    #[error("task not registered: {0}")]
    TaskNotFound(String),

    #[error("schedule already exists: {0}")]
    ScheduleConflict(String),

    #[error("invalid trigger configuration: {0}")]
    InvalidTrigger(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

/// Errors surfaced by the scheduler runtime itself (lifecycle, public API).
///
/// Distinguished from [`DomainError`] because these carry the propagation
/// policy from the spec's error taxonomy: most are surfaced to a specific
/// caller, `Subsystem` terminates the scheduling loop and triggers shutdown.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `get_job_result(wait=false)` and no result was present.
    #[error("job result not available: {0}")]
    Lookup(Uuid),

    /// Job outcome was `missed_start_deadline`.
    #[error("job {0} missed its start deadline")]
    DeadlineMissed(Uuid),

    /// Job outcome was `cancelled`.
    #[error("job {0} was cancelled")]
    Cancelled(Uuid),

    /// Job outcome was `error`; carries the stored exception text.
    #[error("job {0} failed: {1}")]
    JobFailed(Uuid, String),

    /// `_run` invoked while state != stopped.
    #[error("scheduler is not stopped (current state: {0:?})")]
    IllegalState(crate::domain::models::RunState),

    /// Any exception escaping the main loop body outside per-schedule handling.
    #[error("subsystem failure: {0}")]
    Subsystem(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
