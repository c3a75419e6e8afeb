//! Port for the durable store backing schedules, jobs, and tasks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Identity, Job, JobResult, Schedule, Task};

/// Persists schedules, jobs, and tasks, and arbitrates which scheduler
/// instance owns a schedule's next fire time.
///
/// `acquire_schedules`/`release_schedules` implement the claim protocol:
/// a caller acquires a batch of due, unclaimed schedules under its
/// `Identity` for at most `lease`, does its work, then releases them
/// with updated fire times. A claim past its lease is eligible for
/// another instance to acquire — this is how a crashed scheduler's
/// schedules are recovered without manual intervention.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn add_schedule(&self, schedule: &Schedule) -> DomainResult<()>;
    async fn get_schedule(&self, id: &str) -> DomainResult<Option<Schedule>>;
    async fn remove_schedule(&self, id: &str) -> DomainResult<()>;
    async fn list_schedules(&self) -> DomainResult<Vec<Schedule>>;

    /// Atomically claim up to `max` schedules due at or before `now`
    /// that are not already claimed (or whose claim has expired) under
    /// `identity`, holding the claim for `lease`.
    async fn acquire_schedules(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
        lease: chrono::Duration,
        max: usize,
    ) -> DomainResult<Vec<Schedule>>;

    /// Release schedules previously acquired by `identity`, persisting
    /// their updated fire times. A schedule whose `next_fire_time` is
    /// `None` (its trigger is exhausted) is deleted instead of released.
    async fn release_schedules(&self, identity: &Identity, schedules: &[Schedule]) -> DomainResult<()>;

    /// The earliest `next_fire_time` across all unclaimed schedules, used
    /// by the wakeup coordinator to size its next sleep.
    async fn next_schedule_run_time(&self) -> DomainResult<Option<DateTime<Utc>>>;

    async fn add_job(&self, job: &Job) -> DomainResult<()>;
    async fn get_next_job(&self) -> DomainResult<Option<Job>>;

    async fn add_job_result(&self, result: &JobResult) -> DomainResult<()>;
    async fn get_job_result(&self, job_id: Uuid) -> DomainResult<Option<JobResult>>;

    async fn add_task(&self, task: &Task) -> DomainResult<()>;
    async fn get_task(&self, id: &str) -> DomainResult<Option<Task>>;
}
