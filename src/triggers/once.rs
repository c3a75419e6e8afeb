use chrono::{DateTime, Utc};

use crate::domain::ports::trigger::Trigger;

/// Fires exactly once, at a fixed instant.
pub struct OnceTrigger {
    at: Option<DateTime<Utc>>,
}

impl OnceTrigger {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at: Some(at) }
    }
}

impl Trigger for OnceTrigger {
    fn next(&mut self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let at = self.at?;
        self.at = None;
        if at > after { Some(at) } else { None }
    }

    fn first(&mut self, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.at.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fires_once_then_is_exhausted() {
        let now = Utc::now();
        let mut t = OnceTrigger::new(now + Duration::seconds(10));
        assert_eq!(t.next(now), Some(now + Duration::seconds(10)));
        assert_eq!(t.next(now), None);
    }

    #[test]
    fn skips_if_already_past() {
        let now = Utc::now();
        let mut t = OnceTrigger::new(now - Duration::seconds(10));
        assert_eq!(t.next(now), None);
    }

    #[test]
    fn first_seeds_a_past_at_unlike_next() {
        let now = Utc::now();
        let at = now - Duration::seconds(10);
        let mut t = OnceTrigger::new(at);
        assert_eq!(t.first(now), Some(at));
        assert_eq!(t.next(now), None, "a single Once trigger is exhausted after its one fire is seeded");
    }
}
