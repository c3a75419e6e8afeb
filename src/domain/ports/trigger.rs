//! The `Trigger` trait is the runtime counterpart of a persisted
//! [`crate::domain::models::schedule::TriggerSpec`]: it holds whatever
//! mutable state a trigger kind needs (e.g. a cron schedule's internal
//! iterator) and produces fire times on demand.

use chrono::{DateTime, Utc};

/// Computes the next fire time after a given instant. Implementations
/// are not required to be pure: a trigger may carry state (e.g. "has
/// already fired once") that changes what `next` returns on repeated
/// calls with the same `after`.
pub trait Trigger: Send + Sync {
    /// The next fire time strictly after `after`, or `None` if this
    /// trigger is exhausted and its schedule should be removed.
    fn next(&mut self, after: DateTime<Utc>) -> Option<DateTime<Utc>>;

    /// The fire time a freshly added schedule should seed its
    /// `next_fire_time` with, which may be at or before `now` (a `Once`
    /// trigger whose `at` already elapsed, or an `Interval`/`Cron`
    /// trigger with an explicit past `start`, must still seed that past
    /// fire so the scheduling loop's backlog handling picks it up).
    /// Unlike `next`, this does not require the result to be strictly
    /// after `now` — only triggers with no inherent start reference of
    /// their own (a `Cron` trigger with no explicit `start`) fall back
    /// to comparing against `now`.
    fn first(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>>;
}
