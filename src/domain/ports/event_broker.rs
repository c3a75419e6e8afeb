//! Port for the scheduler's pub/sub event stream.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::domain::errors::DomainResult;

/// Monotonically increasing sequence number assigned by the broker at
/// publish time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

#[derive(Default)]
pub struct SequenceCounter(AtomicU64);

impl SequenceCounter {
    pub fn next(&self) -> SequenceNumber {
        SequenceNumber(self.0.fetch_add(1, Ordering::SeqCst))
    }
}

/// The events a scheduler publishes over its lifetime. Mirrors the
/// event taxonomy in the scheduler's external interfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    SchedulerStarted,
    /// Carries the originating exception's display text when shutdown
    /// was triggered by a fatal subsystem failure; `None` on a clean
    /// `stop()`.
    SchedulerStopped { exception: Option<String> },
    /// `next_fire_time` lets the wakeup coordinator decide, without a
    /// store round trip, whether this schedule moves the loop's next
    /// wakeup earlier.
    ScheduleAdded {
        schedule_id: String,
        next_fire_time: Option<DateTime<Utc>>,
    },
    ScheduleUpdated {
        schedule_id: String,
        next_fire_time: Option<DateTime<Utc>>,
    },
    ScheduleRemoved { schedule_id: String },
    JobAdded { job_id: Uuid, task_id: String },
    JobReleased { job_id: Uuid },
}

/// An event wrapped with the metadata subscribers use for ordering and
/// filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerEventEnvelope {
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub event: SchedulerEvent,
}

impl SchedulerEventEnvelope {
    pub fn variant_name(&self) -> &'static str {
        match &self.event {
            SchedulerEvent::SchedulerStarted => "scheduler_started",
            SchedulerEvent::SchedulerStopped { .. } => "scheduler_stopped",
            SchedulerEvent::ScheduleAdded { .. } => "schedule_added",
            SchedulerEvent::ScheduleUpdated { .. } => "schedule_updated",
            SchedulerEvent::ScheduleRemoved { .. } => "schedule_removed",
            SchedulerEvent::JobAdded { .. } => "job_added",
            SchedulerEvent::JobReleased { .. } => "job_released",
        }
    }
}

/// A live subscription to the event broker. Dropping it unsubscribes.
#[async_trait]
pub trait EventSubscription: Send {
    async fn recv(&mut self) -> DomainResult<Option<SchedulerEventEnvelope>>;
}

/// Publishes and distributes [`SchedulerEvent`]s to interested subscribers.
#[async_trait]
pub trait EventBroker: Send + Sync {
    async fn publish(&self, event: SchedulerEvent) -> DomainResult<()>;

    /// Subscribe to the event stream. When `one_shot` is set, the
    /// returned subscription yields at most one event before closing.
    async fn subscribe(&self, one_shot: bool) -> DomainResult<Box<dyn EventSubscription>>;
}
