//! The fire-time engine: given a schedule's trigger and the current
//! time, decides which past-due fire times materialise into jobs (per
//! the schedule's [`CoalescePolicy`]) and what the schedule's new
//! `next_fire_time` becomes, with jitter bounded so it can never push a
//! fire time to or past the following one.
//!
//! A pure function of `(trigger, last_fire_time, coalesce, jitter, now)`
//! plus the process RNG — no I/O, directly property-testable.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::domain::models::schedule::CoalescePolicy;
use crate::domain::ports::trigger::Trigger;

/// One fire time selected to materialise into a job, with the jitter
/// that was added to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiredAt {
    /// The fire time after jitter is applied — what the materialised
    /// job's `scheduled_fire_time` should be set to.
    pub fire_time: DateTime<Utc>,
    pub jitter: chrono::Duration,
}

/// The result of advancing one schedule past `now`.
pub struct Advance {
    /// Fire times that should each materialise into a job, oldest first.
    pub due_fire_times: Vec<FiredAt>,
    /// The schedule's new `next_fire_time`; `None` means the trigger is
    /// exhausted and the schedule should be removed.
    pub next_fire_time: Option<DateTime<Utc>>,
}

/// Advance `trigger` past `now`, given `last_fire_time` — the
/// schedule's `next_fire_time` that made it due in this iteration.
/// `last_fire_time` is itself the first candidate; further missed fire
/// times are discovered by repeatedly calling `trigger.next()` until it
/// returns `None` or something in the future. `coalesce` then decides
/// which of those candidates actually produce jobs, and each surviving
/// one is jittered within a bound set by whichever fire time follows it
/// (or by the schedule's new `next_fire_time` for the last one), so
/// jitter can never reorder two fire times from the same schedule.
pub fn advance(
    trigger: &mut dyn Trigger,
    last_fire_time: DateTime<Utc>,
    coalesce: CoalescePolicy,
    max_jitter: Option<chrono::Duration>,
    now: DateTime<Utc>,
) -> Advance {
    let mut due = Vec::new();
    if last_fire_time <= now {
        due.push(last_fire_time);
    }

    let mut cursor = last_fire_time;
    let next_fire_time = loop {
        match trigger.next(cursor) {
            Some(t) if t <= now => {
                due.push(t);
                cursor = t;
            }
            other => break other,
        }
    };

    let due = coalesced(due, coalesce);
    Advance {
        due_fire_times: apply_jitter_bounded(due, next_fire_time, max_jitter),
        next_fire_time,
    }
}

/// The fire time a freshly added schedule should seed its
/// `next_fire_time` with — the trigger's own first fire, which may
/// already be at or before `now` (see [`Trigger::first`]).
pub fn initial_fire_time(trigger: &mut dyn Trigger, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    trigger.first(now)
}

fn coalesced(due: Vec<DateTime<Utc>>, policy: CoalescePolicy) -> Vec<DateTime<Utc>> {
    if due.is_empty() {
        return due;
    }
    match policy {
        CoalescePolicy::All => due,
        CoalescePolicy::Earliest => vec![due[0]],
        CoalescePolicy::Latest => vec![*due.last().unwrap()],
    }
}

/// Add a uniformly-distributed random jitter to each fire time in
/// `due`, bounded by the fire time that follows it in the list (or by
/// `next_fire_time` for the last entry) minus a one microsecond margin,
/// so a jittered fire time never reaches or passes the one after it.
fn apply_jitter_bounded(
    due: Vec<DateTime<Utc>>,
    next_fire_time: Option<DateTime<Utc>>,
    max_jitter: Option<chrono::Duration>,
) -> Vec<FiredAt> {
    let max_jitter_us = max_jitter.and_then(|d| d.num_microseconds()).unwrap_or(0).max(0);
    due.iter()
        .enumerate()
        .map(|(i, &fire_time)| {
            if max_jitter_us <= 0 {
                return FiredAt { fire_time, jitter: chrono::Duration::zero() };
            }
            let bound = due.get(i + 1).copied().or(next_fire_time);
            let allowed_us = match bound {
                Some(bound) => {
                    let margin = (bound - fire_time) - chrono::Duration::microseconds(1);
                    margin.num_microseconds().unwrap_or(0).clamp(0, max_jitter_us)
                }
                None => max_jitter_us,
            };
            let sampled_us = if allowed_us > 0 { rand::thread_rng().gen_range(0..=allowed_us) } else { 0 };
            let jitter = chrono::Duration::microseconds(sampled_us);
            FiredAt { fire_time: fire_time + jitter, jitter }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triggers::IntervalTrigger;

    #[test]
    fn no_missed_fires_when_first_next_is_in_future() {
        let now = Utc::now();
        let start = now + chrono::Duration::seconds(60);
        let mut trigger = IntervalTrigger::new(chrono::Duration::seconds(60), start);
        let initial = initial_fire_time(&mut trigger, now).unwrap();
        let result = advance(&mut trigger, initial, CoalescePolicy::Latest, None, now);
        assert!(result.due_fire_times.is_empty());
    }

    #[test]
    fn latest_coalesce_keeps_only_the_most_recent_missed_fire() {
        let now = Utc::now();
        let start = now - chrono::Duration::seconds(25);
        let mut trigger = IntervalTrigger::new(chrono::Duration::seconds(10), start);
        let result = advance(&mut trigger, start, CoalescePolicy::Latest, None, now);
        assert_eq!(result.due_fire_times.len(), 1);
        assert_eq!(result.due_fire_times[0].fire_time, start + chrono::Duration::seconds(20));
    }

    #[test]
    fn all_coalesce_keeps_every_missed_fire_including_the_seed() {
        let now = Utc::now();
        let start = now - chrono::Duration::seconds(25);
        let mut trigger = IntervalTrigger::new(chrono::Duration::seconds(10), start);
        let result = advance(&mut trigger, start, CoalescePolicy::All, None, now);
        // start, start+10, start+20 are all <= now
        assert_eq!(result.due_fire_times.len(), 3);
        assert_eq!(result.due_fire_times[0].fire_time, start);
        assert_eq!(result.due_fire_times[2].fire_time, start + chrono::Duration::seconds(20));
    }

    #[test]
    fn earliest_coalesce_keeps_only_the_seed() {
        let now = Utc::now();
        let start = now - chrono::Duration::seconds(25);
        let mut trigger = IntervalTrigger::new(chrono::Duration::seconds(10), start);
        let result = advance(&mut trigger, start, CoalescePolicy::Earliest, None, now);
        assert_eq!(result.due_fire_times.len(), 1);
        assert_eq!(result.due_fire_times[0].fire_time, start);
    }

    #[test]
    fn jitter_never_reaches_the_next_fire_time() {
        let now = Utc::now();
        let start = now - chrono::Duration::seconds(25);
        for _ in 0..200 {
            let mut trigger = IntervalTrigger::new(chrono::Duration::seconds(10), start);
            let result = advance(&mut trigger, start, CoalescePolicy::All, Some(chrono::Duration::seconds(10)), now);
            for pair in result.due_fire_times.windows(2) {
                assert!(pair[0].fire_time < pair[1].fire_time);
            }
        }
    }

    #[test]
    fn zero_jitter_is_a_no_op() {
        let now = Utc::now();
        let mut trigger = IntervalTrigger::new(chrono::Duration::seconds(10), now - chrono::Duration::seconds(5));
        let result = advance(&mut trigger, now - chrono::Duration::seconds(5), CoalescePolicy::Latest, None, now);
        for f in &result.due_fire_times {
            assert_eq!(f.jitter, chrono::Duration::zero());
        }
    }

    #[test]
    fn sub_second_jitter_bound_is_respected() {
        let now = Utc::now();
        let start = now - chrono::Duration::milliseconds(500);
        let mut trigger = IntervalTrigger::new(chrono::Duration::seconds(10), start);
        let result =
            advance(&mut trigger, start, CoalescePolicy::Latest, Some(chrono::Duration::milliseconds(200)), now);
        assert_eq!(result.due_fire_times.len(), 1);
        assert!(result.due_fire_times[0].jitter <= chrono::Duration::milliseconds(200));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::triggers::IntervalTrigger;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn jitter_never_exceeds_bound_and_preserves_order(
            every_secs in 2i64..120,
            elapsed_secs in 0i64..3600,
            max_jitter_secs in 0i64..60,
        ) {
            let now = Utc::now();
            let start = now - chrono::Duration::seconds(elapsed_secs);
            let max_jitter = chrono::Duration::seconds(max_jitter_secs);
            let mut trigger = IntervalTrigger::new(chrono::Duration::seconds(every_secs), start);
            let result = advance(&mut trigger, start, CoalescePolicy::All, Some(max_jitter), now);

            for f in &result.due_fire_times {
                prop_assert!(f.jitter >= chrono::Duration::zero());
                prop_assert!(f.jitter <= max_jitter);
            }
            for pair in result.due_fire_times.windows(2) {
                prop_assert!(pair[0].fire_time < pair[1].fire_time);
            }
            if let (Some(last), Some(next)) = (result.due_fire_times.last(), result.next_fire_time) {
                prop_assert!(last.fire_time < next);
            }
        }

        #[test]
        fn all_coalesce_due_fire_times_are_nondecreasing(every_secs in 1i64..120, elapsed_secs in 0i64..3600) {
            let now = Utc::now();
            let start = now - chrono::Duration::seconds(elapsed_secs);
            let mut trigger = IntervalTrigger::new(chrono::Duration::seconds(every_secs), start);
            let result = advance(&mut trigger, start, CoalescePolicy::All, None, now);
            for pair in result.due_fire_times.windows(2) {
                prop_assert!(pair[0].fire_time <= pair[1].fire_time);
            }
            for t in &result.due_fire_times {
                prop_assert!(t.fire_time <= now);
            }
        }
    }
}
