//! Event broker adapters.

pub mod local;

pub use local::LocalEventBroker;
