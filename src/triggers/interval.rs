use chrono::{DateTime, Duration, Utc};

use crate::domain::ports::trigger::Trigger;

/// Fires every fixed interval starting from (and including) `start`.
pub struct IntervalTrigger {
    every: Duration,
    start: DateTime<Utc>,
}

impl IntervalTrigger {
    pub fn new(every: Duration, start: DateTime<Utc>) -> Self {
        Self { every, start }
    }
}

impl Trigger for IntervalTrigger {
    fn next(&mut self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.every <= Duration::zero() {
            return None;
        }
        if self.start > after {
            return Some(self.start);
        }
        let elapsed = after - self.start;
        let steps = elapsed.num_milliseconds() / self.every.num_milliseconds() + 1;
        Some(self.start + self.every * steps as i32)
    }

    fn first(&mut self, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.every <= Duration::zero() {
            return None;
        }
        Some(self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fire_is_start_when_start_is_future() {
        let now = Utc::now();
        let start = now + Duration::seconds(5);
        let mut t = IntervalTrigger::new(Duration::seconds(10), start);
        assert_eq!(t.next(now), Some(start));
    }

    #[test]
    fn advances_by_whole_intervals() {
        let start = Utc::now() - Duration::seconds(25);
        let mut t = IntervalTrigger::new(Duration::seconds(10), start);
        let next = t.next(start + Duration::seconds(25)).unwrap();
        assert_eq!(next, start + Duration::seconds(30));
    }

    #[test]
    fn first_seeds_a_past_start_unlike_next() {
        let now = Utc::now();
        let start = now - Duration::seconds(25);
        let mut t = IntervalTrigger::new(Duration::seconds(10), start);
        assert_eq!(t.first(now), Some(start));
    }
}
