//! The scheduler core: lifecycle sequencing over the event broker, data
//! store, schedule-event subscription, and optional in-process worker,
//! plus the public API surface (`add_schedule`, `add_job`,
//! `get_job_result`, `run_job`, `get_schedule`, `remove_schedule`,
//! `stop`, `wait_until_stopped`) that drives them.
//!
//! [`Scheduler`] is a cheap-to-clone handle (`Arc<Inner>` underneath);
//! [`Scheduler::start`] spawns the schedule-event listener, the
//! optional worker, and the scheduling loop as sibling tasks and
//! returns once `SchedulerStarted` has been published.

pub mod conflict;
mod lifecycle;
mod scheduling_loop;

pub use conflict::ConflictPolicy;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::errors::{DomainError, SchedulerError, SchedulerResult};
use crate::domain::models::job::{JobOutcome, JobResult};
use crate::domain::models::{Identity, Job, RunState, Schedule};
use crate::domain::ports::event_broker::SchedulerEvent;
use crate::domain::ports::{DataStore, EventBroker};
use crate::services::{fire_time, WakeupCoordinator};
use crate::triggers;

/// Tuning knobs for a [`Scheduler`] instance, independent of how the
/// data store and event broker it runs against were built.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Claim ownership name; defaults to a generated `{host}-{pid}-{n}`.
    pub identity: Identity,
    /// How long an acquired schedule's claim is held before it is
    /// eligible for another instance to re-acquire.
    pub claim_lease: chrono::Duration,
    /// Maximum due schedules acquired per scheduling-loop iteration.
    pub batch_size: usize,
    /// Whether to start the in-process reference worker as a sibling
    /// task alongside the scheduling loop.
    pub start_worker: bool,
    /// Shielded deadline for the final `SchedulerStopped` publish.
    pub stopped_publish_timeout: std::time::Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            identity: Identity::generate(),
            claim_lease: chrono::Duration::seconds(30),
            batch_size: 100,
            start_worker: true,
            stopped_publish_timeout: std::time::Duration::from_secs(3),
        }
    }
}

/// Shared state behind a [`Scheduler`] handle.
pub(crate) struct Inner {
    pub(crate) store: Arc<dyn DataStore>,
    pub(crate) broker: Arc<dyn EventBroker>,
    pub(crate) identity: Identity,
    pub(crate) batch_size: usize,
    pub(crate) lease: chrono::Duration,
    pub(crate) stopped_publish_timeout: std::time::Duration,
    pub(crate) state: RwLock<RunState>,
    pub(crate) wakeup: RwLock<Arc<WakeupCoordinator>>,
    pub(crate) wakeup_deadline: RwLock<Option<DateTime<Utc>>>,
    pub(crate) shutdown_tx: watch::Sender<bool>,
    pub(crate) loop_handle: Mutex<Option<JoinHandle<()>>>,
    pub(crate) worker_handle: Mutex<Option<JoinHandle<()>>>,
    pub(crate) subscription_handle: Mutex<Option<JoinHandle<()>>>,
}

/// A running (or fully torn down) scheduler instance. Cloning shares
/// the same underlying subsystems.
#[derive(Clone)]
pub struct Scheduler {
    pub(crate) inner: Arc<Inner>,
}

impl Scheduler {
    /// Run the lifecycle manager's start sequence (spec.md §4.1):
    /// subscribe to schedule events, optionally start the in-process
    /// worker, transition to `started`, publish `SchedulerStarted`, and
    /// spawn the scheduling loop.
    pub async fn start(
        store: Arc<dyn DataStore>,
        broker: Arc<dyn EventBroker>,
        options: SchedulerOptions,
    ) -> SchedulerResult<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let inner = Arc::new(Inner {
            store,
            broker,
            identity: options.identity,
            batch_size: options.batch_size.max(1),
            lease: options.claim_lease,
            stopped_publish_timeout: options.stopped_publish_timeout,
            state: RwLock::new(RunState::Stopped),
            wakeup: RwLock::new(Arc::new(WakeupCoordinator::new())),
            wakeup_deadline: RwLock::new(None),
            shutdown_tx,
            loop_handle: Mutex::new(None),
            worker_handle: Mutex::new(None),
            subscription_handle: Mutex::new(None),
        });

        *inner.state.write().await = RunState::Starting;

        let subscription_handle = tokio::spawn(lifecycle::run_schedule_event_listener(
            inner.clone(),
            shutdown_rx.clone(),
        ));
        *inner.subscription_handle.lock().await = Some(subscription_handle);

        if options.start_worker {
            let worker_handle = tokio::spawn(crate::services::worker::run(
                inner.store.clone(),
                inner.broker.clone(),
                shutdown_rx.clone(),
            ));
            *inner.worker_handle.lock().await = Some(worker_handle);
        }

        if let Err(err) = inner.broker.publish(SchedulerEvent::SchedulerStarted).await {
            lifecycle::abort_subsystems(&inner).await;
            *inner.state.write().await = RunState::Stopped;
            return Err(SchedulerError::from(err));
        }
        *inner.state.write().await = RunState::Started;

        let loop_handle = tokio::spawn(scheduling_loop::run(inner.clone()));
        *inner.loop_handle.lock().await = Some(loop_handle);

        Ok(Self { inner })
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> RunState {
        *self.inner.state.read().await
    }

    /// Signal shutdown. Idempotent from `started`; a no-op from any
    /// other state (spec.md §4.1).
    pub async fn stop(&self) -> SchedulerResult<()> {
        self.inner.shutdown(None, false).await;
        Ok(())
    }

    /// Returns immediately if already stopped; otherwise waits for the
    /// one-shot `SchedulerStopped` event.
    pub async fn wait_until_stopped(&self) -> SchedulerResult<()> {
        if *self.inner.state.read().await == RunState::Stopped {
            return Ok(());
        }
        let mut sub = self.inner.broker.subscribe(false).await.map_err(SchedulerError::from)?;
        if *self.inner.state.read().await == RunState::Stopped {
            return Ok(());
        }
        loop {
            match sub.recv().await.map_err(SchedulerError::from)? {
                Some(envelope) if matches!(envelope.event, SchedulerEvent::SchedulerStopped { .. }) => {
                    return Ok(());
                }
                Some(_) => continue,
                None => return Ok(()),
            }
        }
    }

    /// Insert `schedule`, computing `next_fire_time` from its trigger if
    /// not already set, and publish `ScheduleAdded`.
    pub async fn add_schedule(&self, mut schedule: Schedule, conflict: ConflictPolicy) -> SchedulerResult<String> {
        if schedule.next_fire_time.is_none() {
            let mut trigger = triggers::build_trigger(&schedule.trigger)?;
            schedule.next_fire_time = fire_time::initial_fire_time(trigger.as_mut(), Utc::now());
        }

        if let Some(existing) = self.inner.store.get_schedule(&schedule.id).await? {
            match conflict {
                ConflictPolicy::Fail => {
                    return Err(SchedulerError::Domain(DomainError::ScheduleConflict(schedule.id)));
                }
                ConflictPolicy::DoNothing => return Ok(existing.id),
                ConflictPolicy::Replace => self.inner.store.remove_schedule(&schedule.id).await?,
            }
        }

        self.inner.store.add_schedule(&schedule).await?;
        self.inner
            .broker
            .publish(SchedulerEvent::ScheduleAdded {
                schedule_id: schedule.id.clone(),
                next_fire_time: schedule.next_fire_time,
            })
            .await?;
        Ok(schedule.id)
    }

    /// Enqueue a Job directly, bypassing the scheduling loop. The task
    /// must already be registered (spec.md §4.5); an unknown task is
    /// rejected here rather than surfacing later as a worker error.
    pub async fn add_job(
        &self,
        task_id: impl Into<String>,
        args: serde_json::Value,
        tags: Vec<String>,
    ) -> SchedulerResult<Uuid> {
        let task_id = task_id.into();
        if self.inner.store.get_task(&task_id).await?.is_none() {
            return Err(SchedulerError::Domain(DomainError::TaskNotFound(task_id)));
        }
        let mut job = Job::ad_hoc(task_id, args);
        job.tags = tags;
        self.inner.store.add_job(&job).await?;
        self.inner
            .broker
            .publish(SchedulerEvent::JobAdded { job_id: job.id, task_id: job.task_id.clone() })
            .await?;
        Ok(job.id)
    }

    /// Subscribes to `JobReleased` before reading the store, so a
    /// result published between the subscribe and the read is never
    /// missed (spec.md §4.5).
    pub async fn get_job_result(&self, job_id: Uuid, wait: bool) -> SchedulerResult<JobResult> {
        let mut sub = self.inner.broker.subscribe(false).await?;

        if let Some(result) = self.inner.store.get_job_result(job_id).await? {
            return Ok(result);
        }
        if !wait {
            return Err(SchedulerError::Lookup(job_id));
        }

        loop {
            match sub.recv().await? {
                Some(envelope) => {
                    if let SchedulerEvent::JobReleased { job_id: released } = envelope.event {
                        if released == job_id {
                            if let Some(result) = self.inner.store.get_job_result(job_id).await? {
                                return Ok(result);
                            }
                        }
                    }
                }
                None => return Err(SchedulerError::Lookup(job_id)),
            }
        }
    }

    /// Subscribe, enqueue, wait, then translate the outcome into a
    /// value or an error (spec.md §4.5, §7).
    pub async fn run_job(&self, task_id: impl Into<String>, args: serde_json::Value) -> SchedulerResult<serde_json::Value> {
        let mut sub = self.inner.broker.subscribe(false).await?;
        let job_id = self.add_job(task_id, args, Vec::new()).await?;

        loop {
            match sub.recv().await? {
                Some(envelope) => {
                    if let SchedulerEvent::JobReleased { job_id: released } = envelope.event {
                        if released == job_id {
                            let result = self
                                .inner
                                .store
                                .get_job_result(job_id)
                                .await?
                                .ok_or(SchedulerError::Lookup(job_id))?;
                            return translate_outcome(job_id, result.outcome);
                        }
                    }
                }
                None => return Err(SchedulerError::Lookup(job_id)),
            }
        }
    }

    pub async fn get_schedule(&self, id: &str) -> SchedulerResult<Option<Schedule>> {
        Ok(self.inner.store.get_schedule(id).await?)
    }

    pub async fn remove_schedule(&self, id: &str) -> SchedulerResult<()> {
        self.inner.store.remove_schedule(id).await?;
        self.inner
            .broker
            .publish(SchedulerEvent::ScheduleRemoved { schedule_id: id.to_string() })
            .await?;
        Ok(())
    }
}

fn translate_outcome(job_id: Uuid, outcome: JobOutcome) -> SchedulerResult<serde_json::Value> {
    match outcome {
        JobOutcome::Success { return_value } => Ok(return_value),
        JobOutcome::Error { message } => Err(SchedulerError::JobFailed(job_id, message)),
        JobOutcome::MissedStartDeadline => Err(SchedulerError::DeadlineMissed(job_id)),
        JobOutcome::Cancelled => Err(SchedulerError::Cancelled(job_id)),
    }
}
