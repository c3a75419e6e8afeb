//! `schedulerd` CLI entry point.

use anyhow::Result;
use clap::Parser;

use schedulerd::cli::commands::{job, run, schedule};
use schedulerd::cli::{Cli, Commands, JobCommands, ScheduleCommands};
use schedulerd::infrastructure::config::ConfigLoader;
use schedulerd::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let _logger = LoggerImpl::init(&config.logging)?;

    match cli.command {
        Commands::Run => run::handle_run(&config).await,
        Commands::Schedule(cmd) => match cmd {
            ScheduleCommands::Add {
                id,
                task_id,
                cron,
                interval_seconds,
                at,
                args,
                coalesce,
                max_jitter_seconds,
                misfire_grace_seconds,
                on_conflict,
            } => {
                schedule::handle_add(
                    &config,
                    id,
                    task_id,
                    cron,
                    interval_seconds,
                    at,
                    args,
                    coalesce,
                    max_jitter_seconds,
                    misfire_grace_seconds,
                    on_conflict,
                    cli.json,
                )
                .await
            }
            ScheduleCommands::List => schedule::handle_list(&config, cli.json).await,
            ScheduleCommands::Show { id } => schedule::handle_show(&config, id, cli.json).await,
            ScheduleCommands::Remove { id } => schedule::handle_remove(&config, id, cli.json).await,
        },
        Commands::Job(cmd) => match cmd {
            JobCommands::Add { task_id, args } => job::handle_add(&config, task_id, args, cli.json).await,
            JobCommands::Status { job_id, wait } => job::handle_status(&config, job_id, wait, cli.json).await,
        },
    }
}
