//! Domain ports (interfaces) for the scheduler core.

pub mod data_store;
pub mod event_broker;
pub mod trigger;

pub use data_store::DataStore;
pub use event_broker::{EventBroker, EventSubscription, SchedulerEvent, SchedulerEventEnvelope, SequenceNumber};
pub use trigger::Trigger;
