//! CLI interface module
//!
//! This module contains the command-line interface for the
//! `schedulerd` binary: argument parsing ([`types`]), command handlers
//! ([`commands`]), and terminal output formatting ([`output`]).

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands, JobCommands, ScheduleCommands};
