//! A `Schedule` binds a task to a trigger and records the coalescing
//! policy and claim state the fire-time engine and data store act on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::identity::Identity;

/// How the engine collapses one or more missed fire times into the jobs
/// it actually materialises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoalescePolicy {
    /// Run once, for the earliest missed fire time.
    Earliest,
    /// Run once, for the most recent missed fire time.
    Latest,
    /// Run once per missed fire time.
    All,
}

impl Default for CoalescePolicy {
    fn default() -> Self {
        CoalescePolicy::Latest
    }
}

/// The persisted description of a trigger. Kept distinct from the
/// runtime `Box<dyn Trigger>` (see [`crate::domain::ports::trigger`]) so
/// a schedule round-trips through the data store as plain data; the
/// scheduling loop rehydrates a trigger instance from this spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerSpec {
    /// Fire exactly once at `at`.
    Once { at: DateTime<Utc> },
    /// Fire every `every_seconds`, optionally starting from `start`.
    Interval {
        every_seconds: i64,
        start: Option<DateTime<Utc>>,
    },
    /// A 5-field cron expression, optionally bounded by `start`/`end`.
    Cron {
        expression: String,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub task_id: String,
    pub trigger: TriggerSpec,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default)]
    pub coalesce: CoalescePolicy,
    /// Upper bound on the random jitter added before a job materialises
    /// from this schedule's fire time.
    #[serde(with = "super::duration_serde", default)]
    pub max_jitter: Option<chrono::Duration>,
    /// How long past a fire time a job may still legally start before
    /// the engine marks it `missed_start_deadline` instead of running it.
    #[serde(with = "super::duration_serde", default)]
    pub misfire_grace: Option<chrono::Duration>,
    pub next_fire_time: Option<DateTime<Utc>>,
    pub last_fire_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paused: bool,
    /// Freeform labels copied onto every [`crate::domain::models::Job`]
    /// this schedule materialises.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Set by the data store while a scheduler instance holds the claim
    /// on this row; absent otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_until: Option<DateTime<Utc>>,
}

impl Schedule {
    pub fn new(id: impl Into<String>, task_id: impl Into<String>, trigger: TriggerSpec) -> Self {
        Self {
            id: id.into(),
            task_id: task_id.into(),
            trigger,
            args: serde_json::Value::Null,
            coalesce: CoalescePolicy::default(),
            max_jitter: None,
            misfire_grace: None,
            next_fire_time: None,
            last_fire_time: None,
            paused: false,
            tags: Vec::new(),
            claimed_by: None,
            claimed_until: None,
        }
    }

    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    pub fn with_coalesce(mut self, coalesce: CoalescePolicy) -> Self {
        self.coalesce = coalesce;
        self
    }

    pub fn with_max_jitter(mut self, max_jitter: chrono::Duration) -> Self {
        self.max_jitter = Some(max_jitter);
        self
    }

    pub fn with_misfire_grace(mut self, misfire_grace: chrono::Duration) -> Self {
        self.misfire_grace = Some(misfire_grace);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// `schedule.next_fire_time + misfire_grace_time`, the
    /// `next_deadline` spec.md §3 defines and the value a materialised
    /// job's `start_deadline` is seeded from.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        match (self.next_fire_time, self.misfire_grace) {
            (Some(fire), Some(grace)) => Some(fire + grace),
            _ => None,
        }
    }

    /// Whether this schedule's claim is held, and not yet expired, by
    /// some scheduler instance other than `identity`.
    pub fn is_claimed_by_other(&self, identity: &Identity, now: DateTime<Utc>) -> bool {
        match (&self.claimed_by, self.claimed_until) {
            (Some(owner), Some(until)) => owner != identity.as_str() && until > now,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unclaimed_and_unpaused() {
        let s = Schedule::new(
            "sched-1",
            "task-1",
            TriggerSpec::Once {
                at: Utc::now(),
            },
        );
        assert!(!s.paused);
        assert!(s.claimed_by.is_none());
    }

    #[test]
    fn coalesce_policy_serializes_snake_case() {
        let v = serde_json::to_value(CoalescePolicy::Earliest).unwrap();
        assert_eq!(v, serde_json::json!("earliest"));
    }
}
