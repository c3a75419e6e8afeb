//! Infrastructure layer
//!
//! Ambient concerns that sit outside the scheduler core's invariants:
//! hierarchical configuration loading and structured logging setup.

pub mod config;
pub mod logging;
