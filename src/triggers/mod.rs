//! Built-in trigger implementations and the factory that rehydrates a
//! runtime [`Trigger`] from a persisted
//! [`crate::domain::models::schedule::TriggerSpec`].

pub mod cron;
pub mod interval;
pub mod once;

pub use cron::CronTrigger;
pub use interval::IntervalTrigger;
pub use once::OnceTrigger;

use crate::domain::errors::DomainError;
use crate::domain::models::schedule::TriggerSpec;
use crate::domain::ports::trigger::Trigger;

pub fn build_trigger(spec: &TriggerSpec) -> Result<Box<dyn Trigger>, DomainError> {
    match spec {
        TriggerSpec::Once { at } => Ok(Box::new(OnceTrigger::new(*at))),
        TriggerSpec::Interval { every_seconds, start } => {
            if *every_seconds <= 0 {
                return Err(DomainError::InvalidTrigger(
                    "interval trigger requires every_seconds > 0".to_string(),
                ));
            }
            let start = start.unwrap_or_else(chrono::Utc::now);
            Ok(Box::new(IntervalTrigger::new(
                chrono::Duration::seconds(*every_seconds),
                start,
            )))
        }
        TriggerSpec::Cron { expression, start, end } => {
            Ok(Box::new(CronTrigger::parse(expression, *start, *end)?))
        }
    }
}
