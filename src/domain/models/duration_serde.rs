//! `chrono::Duration` carries no `Serialize`/`Deserialize` impl of its
//! own; schedules and jobs persist a duration field as whole
//! microseconds so sub-second jitter and grace periods round-trip
//! without truncation.

use chrono::Duration;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    value.and_then(Duration::num_microseconds).serialize(serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    Ok(Option::<i64>::deserialize(deserializer)?.map(Duration::microseconds))
}
