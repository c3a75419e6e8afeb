//! The wakeup coordinator lets any part of the scheduler (e.g.
//! `add_schedule` with an earlier fire time than the loop is currently
//! sleeping for) interrupt the scheduling loop's sleep early. It is a
//! one-shot signal: each wait consumes at most one wakeup, and a new
//! one replaces any pending-but-unconsumed signal rather than queuing.

use tokio::sync::Notify;

pub struct WakeupCoordinator {
    notify: Notify,
}

impl WakeupCoordinator {
    pub fn new() -> Self {
        Self { notify: Notify::new() }
    }

    /// Wake up a pending or future `wait_or_sleep` call.
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    /// Sleep until `deadline` or until [`Self::wake`] is called,
    /// whichever comes first.
    pub async fn wait_or_sleep(&self, deadline: tokio::time::Instant) {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            _ = self.notify.notified() => {}
        }
    }

    /// Sleep indefinitely until [`Self::wake`] is called. Used when
    /// there is no known next fire time to sleep until.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

impl Default for WakeupCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn wake_interrupts_a_long_sleep() {
        let coordinator = Arc::new(WakeupCoordinator::new());
        let waiter = coordinator.clone();

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            waiter.wait_or_sleep(start + Duration::from_secs(3600)).await;
            tokio::time::Instant::now() - start
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.wake();

        let elapsed = handle.await.unwrap();
        assert!(elapsed < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_to_deadline_with_no_wake() {
        let coordinator = WakeupCoordinator::new();
        let start = tokio::time::Instant::now();
        coordinator.wait_or_sleep(start + Duration::from_millis(50)).await;
        assert!(tokio::time::Instant::now() - start >= Duration::from_millis(50));
    }
}
