//! The lifecycle manager's subsystem wiring: the schedule-event
//! listener task and the shutdown/fail sequencing (spec.md §4.1).
//!
//! Shutdown is driven entirely by a single `RwLock<RunState>`
//! check-and-transition: only the caller that observes `Started` and
//! successfully swaps in `Stopping` proceeds to tear subsystems down,
//! which is what makes `shutdown` safe to call concurrently from
//! `Scheduler::stop()` and from the scheduling loop's own `fail()` path
//! without a separate "already finalized" guard.

use std::sync::Arc;

use tokio::sync::watch;

use super::Inner;
use crate::domain::models::RunState;
use crate::domain::ports::event_broker::SchedulerEvent;

/// Subscribes to `ScheduleAdded`/`ScheduleUpdated` and wakes the
/// scheduling loop early when one moves the next wakeup deadline
/// earlier than what the loop is currently sleeping for.
pub(super) async fn run_schedule_event_listener(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
    let mut sub = match inner.broker.subscribe(false).await {
        Ok(sub) => sub,
        Err(err) => {
            tracing::error!(error = %err, "failed to subscribe to schedule events, listener exiting");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            received = sub.recv() => {
                match received {
                    Ok(Some(envelope)) => inner.on_schedule_event(envelope.event).await,
                    Ok(None) => return,
                    Err(err) => {
                        tracing::warn!(error = %err, "schedule event subscription errored");
                    }
                }
            }
        }
    }
}

/// Abort everything `start()` spawned before publishing
/// `SchedulerStarted` failed, since nothing has observed `Started` yet
/// and there is no clean shutdown sequence to run.
pub(super) async fn abort_subsystems(inner: &Arc<Inner>) {
    inner.shutdown_tx.send_replace(true);
    if let Some(handle) = inner.subscription_handle.lock().await.take() {
        handle.abort();
    }
    if let Some(handle) = inner.worker_handle.lock().await.take() {
        handle.abort();
    }
}

impl Inner {
    /// Compare an incoming schedule event's `next_fire_time` against
    /// the deadline the scheduling loop is currently sleeping for, and
    /// wake it early if this schedule moves that sooner — or if there
    /// is no current deadline at all, which means the loop is sleeping
    /// indefinitely and would otherwise never learn about this schedule.
    pub(super) async fn on_schedule_event(&self, event: SchedulerEvent) {
        let candidate = match event {
            SchedulerEvent::ScheduleAdded { next_fire_time, .. }
            | SchedulerEvent::ScheduleUpdated { next_fire_time, .. } => next_fire_time,
            _ => return,
        };

        let Some(candidate) = candidate else { return };

        let current_deadline = *self.wakeup_deadline.read().await;
        let should_wake = match current_deadline {
            None => true,
            Some(deadline) => candidate < deadline,
        };

        if should_wake {
            self.wakeup.read().await.wake();
        }
    }

    /// Entry point for a fatal subsystem error surfacing from inside
    /// the scheduling loop. `called_from_loop` must be `true` here so
    /// `shutdown` does not await the loop task's own `JoinHandle`.
    pub(crate) async fn fail(self: &Arc<Self>, err: impl std::fmt::Display) {
        tracing::error!(error = %err, "scheduler subsystem failed, shutting down");
        self.shutdown(Some(err.to_string()), true).await;
    }

    /// Tear down every spawned subsystem and publish `SchedulerStopped`.
    /// `called_from_loop` is `true` only when invoked via [`Self::fail`]
    /// from inside the scheduling loop task itself; in that case the
    /// loop's own handle is not joined, since a task cannot await its
    /// own completion.
    pub(crate) async fn shutdown(self: &Arc<Self>, exception: Option<String>, called_from_loop: bool) {
        {
            let mut state = self.state.write().await;
            if *state != RunState::Started {
                return;
            }
            *state = RunState::Stopping;
        }

        self.wakeup.read().await.wake();
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.worker_handle.lock().await.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.subscription_handle.lock().await.take() {
            let _ = handle.await;
        }
        if !called_from_loop {
            if let Some(handle) = self.loop_handle.lock().await.take() {
                let _ = handle.await;
            }
        }

        *self.state.write().await = RunState::Stopped;

        let publish = self.broker.publish(SchedulerEvent::SchedulerStopped { exception });
        if tokio::time::timeout(self.stopped_publish_timeout, publish).await.is_err() {
            tracing::warn!(
                timeout = ?self.stopped_publish_timeout,
                "timed out publishing SchedulerStopped"
            );
        }
    }
}
