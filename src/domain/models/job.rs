//! Jobs are the materialised, runnable instances of a [`Schedule`](super::schedule::Schedule)
//! fire time, and `JobResult` is what a worker reports back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Arguments passed to a task function, opaque to the scheduler core.
pub type JobArgs = serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub task_id: String,
    pub schedule_id: Option<String>,
    #[serde(default)]
    pub args: JobArgs,
    /// The fire time this job was materialised for, before jitter.
    pub scheduled_fire_time: DateTime<Utc>,
    /// Random jitter (spec.md §4.3) added on top of `scheduled_fire_time`
    /// by the fire-time engine, recorded here for observability.
    #[serde(with = "super::duration_serde", default)]
    pub jitter: Option<chrono::Duration>,
    /// If set, a job not started by this time is never run and is
    /// recorded with outcome [`JobOutcome::MissedStartDeadline`].
    pub start_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    #[allow(clippy::too_many_arguments)]
    pub fn from_schedule(
        task_id: impl Into<String>,
        schedule_id: impl Into<String>,
        args: JobArgs,
        scheduled_fire_time: DateTime<Utc>,
        jitter: Option<chrono::Duration>,
        start_deadline: Option<DateTime<Utc>>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id: task_id.into(),
            schedule_id: Some(schedule_id.into()),
            args,
            scheduled_fire_time,
            jitter,
            start_deadline,
            tags,
            created_at: Utc::now(),
        }
    }

    pub fn ad_hoc(task_id: impl Into<String>, args: JobArgs) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task_id: task_id.into(),
            schedule_id: None,
            args,
            scheduled_fire_time: now,
            jitter: None,
            start_deadline: None,
            tags: Vec::new(),
            created_at: now,
        }
    }
}

/// How a job ended, mirroring the outcomes the public API's
/// `get_job_result` translates into [`crate::domain::errors::SchedulerError`]
/// variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Success { return_value: serde_json::Value },
    Error { message: String },
    MissedStartDeadline,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: Uuid,
    pub outcome: JobOutcome,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
}

impl JobResult {
    pub fn success(job_id: Uuid, return_value: serde_json::Value, started_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            outcome: JobOutcome::Success { return_value },
            started_at: Some(started_at),
            finished_at: Utc::now(),
        }
    }

    pub fn error(job_id: Uuid, message: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            outcome: JobOutcome::Error { message: message.into() },
            started_at: Some(started_at),
            finished_at: Utc::now(),
        }
    }

    pub fn missed_start_deadline(job_id: Uuid) -> Self {
        Self {
            job_id,
            outcome: JobOutcome::MissedStartDeadline,
            started_at: None,
            finished_at: Utc::now(),
        }
    }

    pub fn cancelled(job_id: Uuid) -> Self {
        Self {
            job_id,
            outcome: JobOutcome::Cancelled,
            started_at: None,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Success { .. })
    }
}
