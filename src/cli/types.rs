//! CLI type definitions: the `schedulerd` argument surface.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "schedulerd")]
#[command(about = "Distributed job scheduler core", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a YAML config file, overriding the default search path.
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Output in JSON format.
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a scheduler against the configured data store and block
    /// until interrupted (SIGINT).
    Run,

    /// Schedule management commands
    #[command(subcommand)]
    Schedule(ScheduleCommands),

    /// Job management commands
    #[command(subcommand)]
    Job(JobCommands),
}

#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// Add a new schedule.
    Add {
        /// Unique schedule id.
        id: String,

        /// Task id the schedule's jobs will be created for.
        #[arg(long)]
        task_id: String,

        /// 5-field cron expression (mutually exclusive with interval/at).
        #[arg(long, group = "trigger")]
        cron: Option<String>,

        /// Fixed interval in seconds (mutually exclusive with cron/at).
        #[arg(long, group = "trigger")]
        interval_seconds: Option<i64>,

        /// Fire exactly once, at this RFC3339 instant (mutually exclusive with cron/interval).
        #[arg(long, group = "trigger")]
        at: Option<String>,

        /// JSON arguments passed to the task.
        #[arg(long, default_value = "null")]
        args: String,

        /// Coalesce policy for missed fires: earliest, latest, all.
        #[arg(long, default_value = "latest")]
        coalesce: String,

        /// Maximum random jitter, in (fractional) seconds, added before a fire time materialises.
        #[arg(long)]
        max_jitter_seconds: Option<f64>,

        /// Grace period, in (fractional) seconds, a job may start late before it's marked missed.
        #[arg(long)]
        misfire_grace_seconds: Option<f64>,

        /// What to do if a schedule with this id already exists: do-nothing, replace, fail.
        #[arg(long, default_value = "do-nothing")]
        on_conflict: String,
    },

    /// List all schedules.
    List,

    /// Show one schedule.
    Show {
        /// Schedule id.
        id: String,
    },

    /// Remove a schedule.
    Remove {
        /// Schedule id.
        id: String,
    },
}

#[derive(Subcommand)]
pub enum JobCommands {
    /// Enqueue a job directly, bypassing the scheduling loop.
    Add {
        /// Task id to run.
        task_id: String,

        /// JSON arguments passed to the task.
        #[arg(long, default_value = "null")]
        args: String,
    },

    /// Show a job's result, if one is available yet.
    Status {
        /// Job id.
        job_id: uuid::Uuid,

        /// Block until a result is available instead of returning immediately.
        #[arg(long)]
        wait: bool,
    },
}
