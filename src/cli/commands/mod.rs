//! CLI command handlers, one module per subcommand group.

pub mod job;
pub mod run;
pub mod schedule;
