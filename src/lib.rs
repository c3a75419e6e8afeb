//! `schedulerd` - a distributed job scheduler core.
//!
//! The crate is organised the way the teacher codebase lays out a
//! hexagonal service: [`domain`] holds the framework-agnostic models,
//! ports, and errors; [`core`] is the scheduler runtime itself
//! (lifecycle sequencing, the scheduling loop, and the public API
//! surface); [`services`] holds the fire-time engine, the wakeup
//! coordinator, the task registry, and the reference in-process worker;
//! [`adapters`] implements the ports against SQLite and an in-process
//! broadcast channel; [`triggers`] supplies the built-in `Once`,
//! `Interval`, and `Cron` trigger kinds; [`infrastructure`] is the
//! ambient configuration/logging layer; [`cli`] is the `schedulerd`
//! binary's command surface.

pub mod adapters;
pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;
pub mod services;
pub mod triggers;

pub use core::{ConflictPolicy, Scheduler, SchedulerOptions};
pub use domain::models::{CoalescePolicy, Identity, Job, JobOutcome, JobResult, RunState, Schedule, TriggerSpec};
pub use domain::{DomainError, DomainResult, SchedulerError, SchedulerResult};
