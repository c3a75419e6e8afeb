//! Domain models
//!
//! Pure domain entities for the scheduler core. Framework-agnostic,
//! no infrastructure concerns.

mod duration_serde;
pub mod identity;
pub mod job;
pub mod run_state;
pub mod schedule;
pub mod task;

pub use identity::Identity;
pub use job::{Job, JobArgs, JobOutcome, JobResult};
pub use run_state::RunState;
pub use schedule::{CoalescePolicy, Schedule, TriggerSpec};
pub use task::Task;
