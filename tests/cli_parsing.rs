use clap::Parser;

use schedulerd::cli::{Cli, Commands, JobCommands, ScheduleCommands};

#[test]
fn parses_schedule_add_with_cron_trigger() {
    let cli = Cli::try_parse_from([
        "schedulerd",
        "schedule",
        "add",
        "nightly-report",
        "--task-id",
        "generate-report",
        "--cron",
        "0 2 * * *",
        "--coalesce",
        "earliest",
    ])
    .unwrap();

    match cli.command {
        Commands::Schedule(ScheduleCommands::Add { id, task_id, cron, coalesce, .. }) => {
            assert_eq!(id, "nightly-report");
            assert_eq!(task_id, "generate-report");
            assert_eq!(cron.as_deref(), Some("0 2 * * *"));
            assert_eq!(coalesce, "earliest");
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parses_job_status_with_wait_flag() {
    let job_id = uuid::Uuid::new_v4();
    let cli = Cli::try_parse_from(["schedulerd", "job", "status", &job_id.to_string(), "--wait"]).unwrap();

    match cli.command {
        Commands::Job(JobCommands::Status { job_id: parsed, wait }) => {
            assert_eq!(parsed, job_id);
            assert!(wait);
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn rejects_cron_and_interval_together() {
    let result = Cli::try_parse_from([
        "schedulerd",
        "schedule",
        "add",
        "conflicting",
        "--task-id",
        "t",
        "--cron",
        "* * * * *",
        "--interval-seconds",
        "60",
    ]);
    assert!(result.is_err());
}

#[test]
fn parses_run_with_no_arguments() {
    let cli = Cli::try_parse_from(["schedulerd", "run"]).unwrap();
    assert!(matches!(cli.command, Commands::Run));
}
