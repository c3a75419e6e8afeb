//! Application services for the scheduler core.
//!
//! These are the pieces spec.md §2 calls the "Fire-Time Engine" and
//! "Wakeup Coordinator", plus the process-wide task registry and the
//! reference in-process worker that SPEC_FULL.md adds as an ambient,
//! swappable collaborator.

pub mod fire_time;
pub mod task_registry;
pub mod wakeup;
pub mod worker;

pub use fire_time::{advance, initial_fire_time, Advance, FiredAt};
pub use task_registry::{is_registered, lookup_task, register_task, TaskFn, TaskOutcome};
pub use wakeup::WakeupCoordinator;
