use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::domain::errors::DomainError;
use crate::domain::ports::trigger::Trigger;

/// Wraps a 5-field cron expression (via the `cron` crate), optionally
/// bounded to a `[start, end)` window.
pub struct CronTrigger {
    schedule: cron::Schedule,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl CronTrigger {
    pub fn parse(
        expression: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, DomainError> {
        // The `cron` crate's Schedule parser expects a leading seconds
        // field; the scheduler's own surface takes standard 5-field unix
        // cron (minute hour day-of-month month day-of-week), so a "0" is
        // prepended before parsing.
        let with_seconds = format!("0 {expression}");
        let schedule = cron::Schedule::from_str(&with_seconds)
            .map_err(|e| DomainError::InvalidTrigger(format!("invalid cron expression '{expression}': {e}")))?;
        Ok(Self { schedule, start, end })
    }
}

impl Trigger for CronTrigger {
    fn next(&mut self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let floor = match self.start {
            Some(start) if start > after => start,
            _ => after,
        };
        let candidate = self.schedule.after(&floor).next()?;
        match self.end {
            Some(end) if candidate >= end => None,
            _ => Some(candidate),
        }
    }

    /// With an explicit `start`, the first fire may already be due (the
    /// occurrence at or after `start`, even if that is in the past); with
    /// no `start` the schedule has no reference point of its own, so the
    /// first fire is the next occurrence strictly after `now`.
    fn first(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.start {
            Some(start) => {
                let candidate = self.schedule.after(&(start - chrono::Duration::seconds(1))).next()?;
                match self.end {
                    Some(end) if candidate >= end => None,
                    _ => Some(candidate),
                }
            }
            None => self.next(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_expression() {
        assert!(CronTrigger::parse("not a cron expr", None, None).is_err());
    }

    #[test]
    fn every_minute_advances_by_at_most_sixty_seconds() {
        let mut t = CronTrigger::parse("* * * * *", None, None).unwrap();
        let now = Utc::now();
        let next = t.next(now).unwrap();
        assert!(next > now);
        assert!((next - now).num_seconds() <= 60);
    }

    #[test]
    fn respects_end_bound() {
        let now = Utc::now();
        let mut t = CronTrigger::parse("* * * * *", None, Some(now)).unwrap();
        assert_eq!(t.next(now), None);
    }

    #[test]
    fn first_with_a_past_start_can_be_already_due() {
        let now = Utc::now();
        let start = now - chrono::Duration::minutes(10);
        let mut t = CronTrigger::parse("* * * * *", Some(start), None).unwrap();
        let first = t.first(now).unwrap();
        assert!(first <= now, "a cron trigger with a past explicit start must seed a past fire");
        assert!(first >= start);
    }

    #[test]
    fn first_with_no_start_matches_next_after_now() {
        let now = Utc::now();
        let mut t = CronTrigger::parse("* * * * *", None, None).unwrap();
        let mut t2 = CronTrigger::parse("* * * * *", None, None).unwrap();
        assert_eq!(t.first(now), t2.next(now));
    }
}
