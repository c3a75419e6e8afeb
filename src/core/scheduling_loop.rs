//! The scheduling loop (spec.md §4.2): while the scheduler is
//! `started`, repeatedly claims due schedules, advances each one
//! through the fire-time engine, materialises the jobs that fall out,
//! releases the claims, and sleeps until the next known deadline or an
//! early wakeup.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::Inner;
use crate::domain::models::{Job, RunState, Schedule};
use crate::services::{fire_time, WakeupCoordinator};
use crate::triggers;

/// Runs until the scheduler leaves `Started`, or a fatal error outside
/// the per-schedule try-block terminates it early via [`Inner::fail`].
pub(super) async fn run(inner: Arc<Inner>) {
    let mut shutdown = inner.shutdown_tx.subscribe();

    loop {
        if *inner.state.read().await != RunState::Started {
            return;
        }

        let acquired = match inner
            .store
            .acquire_schedules(&inner.identity, Utc::now(), inner.lease, inner.batch_size)
            .await
        {
            Ok(schedules) => schedules,
            Err(err) => {
                inner.fail(err).await;
                return;
            }
        };

        let batch_was_full = acquired.len() == inner.batch_size;
        let now = Utc::now();
        let mut released = Vec::with_capacity(acquired.len());

        for schedule in acquired {
            released.push(advance_and_materialise(&inner, schedule, now).await);
        }

        if let Err(err) = inner.store.release_schedules(&inner.identity, &released).await {
            inner.fail(err).await;
            return;
        }

        if batch_was_full {
            continue;
        }

        if *inner.state.read().await != RunState::Started {
            return;
        }

        if sleep_until_next_deadline(&inner, &mut shutdown).await.is_stop() {
            return;
        }
    }
}

/// Advance one claimed schedule through the fire-time engine and
/// persist the jobs it materialises, in fire-time order. Any failure
/// here — a trigger that errors, or a job that fails to persist — is
/// contained to this schedule: it is logged and the schedule is
/// abandoned (returned with `next_fire_time = None`, which
/// `release_schedules` interprets as "delete").
async fn advance_and_materialise(inner: &Arc<Inner>, mut schedule: Schedule, now: DateTime<Utc>) -> Schedule {
    let Some(last_fire_time) = schedule.next_fire_time else {
        // Acquired schedules are always due, i.e. carry a next_fire_time;
        // nothing to advance if one somehow doesn't.
        return schedule;
    };

    let start_deadline = schedule.next_deadline();

    let mut trigger = match triggers::build_trigger(&schedule.trigger) {
        Ok(trigger) => trigger,
        Err(err) => {
            tracing::error!(schedule_id = %schedule.id, error = %err, "trigger failed to build, abandoning schedule");
            schedule.next_fire_time = None;
            return schedule;
        }
    };

    let advance = fire_time::advance(trigger.as_mut(), last_fire_time, schedule.coalesce, schedule.max_jitter, now);

    for fired in &advance.due_fire_times {
        let job = Job::from_schedule(
            schedule.task_id.clone(),
            schedule.id.clone(),
            schedule.args.clone(),
            fired.fire_time,
            Some(fired.jitter),
            start_deadline,
            schedule.tags.clone(),
        );
        if let Err(err) = inner.store.add_job(&job).await {
            tracing::error!(
                schedule_id = %schedule.id,
                error = %err,
                "failed to persist job materialised from schedule, abandoning schedule"
            );
            schedule.next_fire_time = None;
            return schedule;
        }
    }

    if let Some(last) = advance.due_fire_times.last() {
        schedule.last_fire_time = Some(last.fire_time);
    }
    schedule.next_fire_time = advance.next_fire_time;
    schedule
}

/// Whether the caller should keep looping or the scheduler has left
/// `Started` while sleeping.
enum SleepOutcome {
    Continue,
    Stop,
}

impl SleepOutcome {
    fn is_stop(&self) -> bool {
        matches!(self, SleepOutcome::Stop)
    }
}

/// Ask the store for its next known schedule run time, sleep until
/// then or until the wakeup coordinator is signalled (by a new or
/// updated schedule with an earlier deadline, or by shutdown), then
/// replace the coordinator with a fresh instance before the next
/// iteration — so a signal observed here cannot also wake a later wait.
async fn sleep_until_next_deadline(inner: &Arc<Inner>, shutdown: &mut watch::Receiver<bool>) -> SleepOutcome {
    let deadline = match inner.store.next_schedule_run_time().await {
        Ok(deadline) => deadline,
        Err(err) => {
            inner.fail(err).await;
            return SleepOutcome::Stop;
        }
    };
    *inner.wakeup_deadline.write().await = deadline;

    let wakeup = inner.wakeup.read().await.clone();
    match deadline {
        Some(deadline) => {
            let now = Utc::now();
            let std_delay = (deadline - now).to_std().unwrap_or(std::time::Duration::ZERO);
            let instant = tokio::time::Instant::now() + std_delay;
            tokio::select! {
                () = wakeup.wait_or_sleep(instant) => {}
                _ = shutdown.changed() => {}
            }
        }
        None => {
            tokio::select! {
                () = wakeup.wait() => {}
                _ = shutdown.changed() => {}
            }
        }
    }

    *inner.wakeup_deadline.write().await = None;
    *inner.wakeup.write().await = Arc::new(WakeupCoordinator::new());

    if *inner.state.read().await == RunState::Started {
        SleepOutcome::Continue
    } else {
        SleepOutcome::Stop
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ConflictPolicy, Scheduler, SchedulerOptions};
    #[allow(unused_imports)]
    use super::*;
    use crate::adapters::broker::LocalEventBroker;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteDataStore};
    use crate::domain::models::schedule::{CoalescePolicy, TriggerSpec};
    use crate::domain::models::{Identity, Schedule};
    use crate::domain::ports::{DataStore, EventBroker};
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    async fn scheduler_without_worker() -> (Scheduler, Arc<dyn DataStore>) {
        let pool = create_migrated_test_pool().await.unwrap();
        let store: Arc<dyn DataStore> = Arc::new(SqliteDataStore::new(pool));
        let broker: Arc<dyn EventBroker> = Arc::new(LocalEventBroker::new());
        let options = SchedulerOptions {
            identity: Identity::new("test-scheduler"),
            start_worker: false,
            batch_size: 100,
            claim_lease: Duration::seconds(30),
            stopped_publish_timeout: StdDuration::from_secs(3),
        };
        let scheduler = Scheduler::start(store.clone(), broker, options).await.unwrap();
        (scheduler, store)
    }

    async fn poll_until<F>(mut predicate: F)
    where
        F: FnMut() -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send>>,
    {
        for _ in 0..200 {
            if predicate().await {
                return;
            }
            tokio::time::sleep(StdDuration::from_millis(25)).await;
        }
        panic!("condition never became true within timeout");
    }

    #[tokio::test]
    async fn coalesce_latest_collapses_backlog_to_one_job_at_the_latest_missed_fire() {
        let (scheduler, store) = scheduler_without_worker().await;
        let now = Utc::now();
        let start = now - Duration::seconds(25);

        let schedule = Schedule::new(
            "latest-backlog",
            "noop",
            TriggerSpec::Interval { every_seconds: 10, start: Some(start) },
        )
        .with_coalesce(CoalescePolicy::Latest);
        scheduler.add_schedule(schedule, ConflictPolicy::Fail).await.unwrap();

        let store_check = store.clone();
        poll_until(move || {
            let store_check = store_check.clone();
            Box::pin(async move {
                let fetched = store_check.get_schedule("latest-backlog").await.unwrap();
                fetched.is_some_and(|s| s.next_fire_time.map(|t| t > Utc::now()).unwrap_or(false))
            })
        })
        .await;

        let fetched = store.get_schedule("latest-backlog").await.unwrap().unwrap();
        assert_eq!(fetched.last_fire_time, Some(start + Duration::seconds(20)));

        scheduler.stop().await.unwrap();
        scheduler.wait_until_stopped().await.unwrap();
    }

    #[tokio::test]
    async fn coalesce_all_materialises_a_job_per_missed_fire() {
        let (scheduler, store) = scheduler_without_worker().await;
        let now = Utc::now();
        let start = now - Duration::seconds(25);

        let schedule = Schedule::new(
            "all-backlog",
            "noop",
            TriggerSpec::Interval { every_seconds: 10, start: Some(start) },
        )
        .with_coalesce(CoalescePolicy::All);
        scheduler.add_schedule(schedule, ConflictPolicy::Fail).await.unwrap();

        let store_check = store.clone();
        poll_until(move || {
            let store_check = store_check.clone();
            Box::pin(async move {
                let fetched = store_check.get_schedule("all-backlog").await.unwrap();
                fetched.is_some_and(|s| s.next_fire_time.map(|t| t > Utc::now()).unwrap_or(false))
            })
        })
        .await;

        // start, start+10, start+20 were all due; exactly three jobs should
        // have been materialised in fire-time order.
        let mut seen = 0;
        for _ in 0..3 {
            if store.get_next_job().await.unwrap().is_some() {
                seen += 1;
            }
        }
        assert_eq!(seen, 3);

        scheduler.stop().await.unwrap();
        scheduler.wait_until_stopped().await.unwrap();
    }

    #[tokio::test]
    async fn schedule_added_while_idle_wakes_the_loop_without_waiting_for_its_prior_deadline() {
        let (scheduler, store) = scheduler_without_worker().await;

        // Give the loop a chance to run its first empty acquire and settle
        // into an unbounded sleep (no schedules yet => no deadline).
        tokio::time::sleep(StdDuration::from_millis(50)).await;

        let fire_at = Utc::now() + Duration::milliseconds(200);
        let schedule = Schedule::new("soon", "noop", TriggerSpec::Once { at: fire_at });
        scheduler.add_schedule(schedule, ConflictPolicy::Fail).await.unwrap();

        let store_check = store.clone();
        poll_until(move || {
            let store_check = store_check.clone();
            Box::pin(async move { store_check.get_schedule("soon").await.unwrap().is_none() })
        })
        .await;

        scheduler.stop().await.unwrap();
        scheduler.wait_until_stopped().await.unwrap();
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_reaches_stopped() {
        let (scheduler, _store) = scheduler_without_worker().await;
        scheduler.stop().await.unwrap();
        scheduler.stop().await.unwrap();
        scheduler.wait_until_stopped().await.unwrap();
        assert_eq!(scheduler.state().await, crate::domain::models::RunState::Stopped);
    }
}
