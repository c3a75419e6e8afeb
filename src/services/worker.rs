//! The in-process worker (spec.md's "optional worker", SPEC_FULL.md §4.8):
//! polls the data store's job queue, resolves the job's `task_id`
//! through the [`task_registry`](crate::services::task_registry), runs
//! it, and publishes the resulting [`JobResult`] back.
//!
//! This is a reference implementation of the collaborator spec.md
//! explicitly scopes out of the scheduler core (§1 "Out of scope").
//! Nothing in the scheduling loop or fire-time engine depends on it;
//! a deployment may run workers out-of-process against the same store
//! instead.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::domain::models::job::{Job, JobResult};
use crate::domain::ports::event_broker::{EventBroker, SchedulerEvent};
use crate::domain::ports::DataStore;
use crate::services::task_registry::{self, TaskOutcome};

/// How long the worker sleeps between `get_next_job` polls when the
/// queue is empty.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Runs the poll loop until `shutdown` is signalled. Intended to run
/// as a sibling task to the scheduling loop, per spec.md §5's
/// "task-group hosts the scheduling loop and (optionally) the
/// in-process worker as sibling tasks."
pub async fn run(
    store: std::sync::Arc<dyn DataStore>,
    broker: std::sync::Arc<dyn EventBroker>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            return;
        }

        match store.get_next_job().await {
            Ok(Some(job)) => {
                execute_job(&store, &broker, job).await;
            }
            Ok(None) => {
                tokio::select! {
                    _ = tokio::time::sleep(POLL_INTERVAL) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to poll for next job, backing off");
                tokio::select! {
                    _ = tokio::time::sleep(POLL_INTERVAL) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

async fn execute_job(store: &std::sync::Arc<dyn DataStore>, broker: &std::sync::Arc<dyn EventBroker>, job: Job) {
    let now = Utc::now();
    if let Some(deadline) = job.start_deadline {
        if now > deadline {
            let result = JobResult::missed_start_deadline(job.id);
            persist_and_publish(store, broker, result).await;
            return;
        }
    }

    let result = match task_registry::lookup_task(&job.task_id) {
        Ok(task_fn) => {
            let timeout = job
                .start_deadline
                .map(|deadline| (deadline - now).max(chrono::Duration::zero()))
                .and_then(|d| d.to_std().ok());

            let started_at = Utc::now();
            let outcome = match timeout {
                Some(timeout) => match tokio::time::timeout(timeout, task_fn(job.args.clone())).await {
                    Ok(outcome) => outcome,
                    Err(_) => TaskOutcome::Error("task exceeded its start deadline timeout".to_string()),
                },
                None => task_fn(job.args.clone()).await,
            };

            match outcome {
                TaskOutcome::Success(value) => JobResult::success(job.id, value, started_at),
                TaskOutcome::Error(message) => JobResult::error(job.id, message, started_at),
            }
        }
        Err(err) => JobResult::error(job.id, err.to_string(), now),
    };

    persist_and_publish(store, broker, result).await;
}

async fn persist_and_publish(
    store: &std::sync::Arc<dyn DataStore>,
    broker: &std::sync::Arc<dyn EventBroker>,
    result: JobResult,
) {
    let job_id = result.job_id;
    if let Err(err) = store.add_job_result(&result).await {
        tracing::error!(job_id = %job_id, error = %err, "failed to persist job result");
        return;
    }
    if let Err(err) = broker.publish(SchedulerEvent::JobReleased { job_id }).await {
        tracing::warn!(job_id = %job_id, error = %err, "failed to publish JobReleased");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::broker::LocalEventBroker;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteDataStore};
    use crate::domain::models::job::JobArgs;
    use crate::domain::ports::event_broker::EventSubscription;
    use futures::FutureExt;
    use std::sync::Arc;

    async fn store() -> Arc<dyn DataStore> {
        let pool = create_migrated_test_pool().await.unwrap();
        Arc::new(SqliteDataStore::new(pool))
    }

    #[tokio::test]
    async fn worker_executes_registered_task_and_publishes_result() {
        task_registry::register_task(
            "worker-echo",
            std::sync::Arc::new(|args: JobArgs| async move { TaskOutcome::Success(args) }.boxed()),
        );

        let store = store().await;
        let broker: std::sync::Arc<dyn EventBroker> = Arc::new(LocalEventBroker::new());
        let mut sub = broker.subscribe(false).await.unwrap();

        let job = Job::ad_hoc("worker-echo", serde_json::json!({"n": 1}));
        store.add_job(&job).await.unwrap();

        let (_tx, rx) = watch::channel(false);
        let store_clone = store.clone();
        let broker_clone = broker.clone();
        let handle = tokio::spawn(async move {
            let fetched = store_clone.get_next_job().await.unwrap().unwrap();
            execute_job(&store_clone, &broker_clone, fetched).await;
        });
        handle.await.unwrap();
        drop(rx);

        let envelope = sub.recv().await.unwrap().unwrap();
        match envelope.event {
            SchedulerEvent::JobReleased { job_id } => assert_eq!(job_id, job.id),
            other => panic!("unexpected event: {other:?}"),
        }

        let result = store.get_job_result(job.id).await.unwrap().unwrap();
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn worker_marks_missed_start_deadline_when_already_past() {
        let store = store().await;
        let broker: std::sync::Arc<dyn EventBroker> = Arc::new(LocalEventBroker::new());

        let mut job = Job::ad_hoc("never-registered", serde_json::Value::Null);
        job.start_deadline = Some(Utc::now() - chrono::Duration::seconds(5));
        let job_id = job.id;

        execute_job(&store, &broker, job).await;

        let result = store.get_job_result(job_id).await.unwrap().unwrap();
        assert!(matches!(
            result.outcome,
            crate::domain::models::job::JobOutcome::MissedStartDeadline
        ));
    }
}
