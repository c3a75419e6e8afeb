//! `schedulerd job {add,status}`.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::adapters::sqlite::{initialize_database, SqliteDataStore};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::job::{Job, JobOutcome};
use crate::domain::ports::DataStore;
use crate::infrastructure::config::Config;

async fn store(config: &Config) -> Result<Arc<dyn DataStore>> {
    let pool = initialize_database(&config.database_url)
        .await
        .context("failed to initialize the SQLite data store")?;
    Ok(Arc::new(SqliteDataStore::new(pool)))
}

pub async fn handle_add(config: &Config, task_id: String, args: String, json: bool) -> Result<()> {
    let args: serde_json::Value = serde_json::from_str(&args).context("--args must be valid JSON")?;

    let store = store(config).await?;
    if store.get_task(&task_id).await?.is_none() {
        bail!("task '{task_id}' is not registered");
    }

    let job = Job::ad_hoc(task_id, args);
    let job_id = job.id;
    store.add_job(&job).await?;

    output(&JobAddedOutput { job_id }, json);
    Ok(())
}

pub async fn handle_status(config: &Config, job_id: Uuid, wait: bool, json: bool) -> Result<()> {
    let store = store(config).await?;

    if !wait {
        return match store.get_job_result(job_id).await? {
            Some(result) => {
                output(&JobStatusOutput::from(result), json);
                Ok(())
            }
            None => bail!("no result for job '{job_id}' yet"),
        };
    }

    loop {
        if let Some(result) = store.get_job_result(job_id).await? {
            output(&JobStatusOutput::from(result), json);
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}

#[derive(Debug, Serialize)]
struct JobAddedOutput {
    job_id: Uuid,
}

impl CommandOutput for JobAddedOutput {
    fn to_human(&self) -> String {
        format!("job '{}' enqueued", self.job_id)
    }
    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "job_id": self.job_id })
    }
}

#[derive(Debug, Serialize)]
struct JobStatusOutput {
    job_id: Uuid,
    outcome: String,
    return_value: Option<serde_json::Value>,
    error: Option<String>,
}

impl From<crate::domain::models::job::JobResult> for JobStatusOutput {
    fn from(result: crate::domain::models::job::JobResult) -> Self {
        let (outcome, return_value, error) = match result.outcome {
            JobOutcome::Success { return_value } => ("success".to_string(), Some(return_value), None),
            JobOutcome::Error { message } => ("error".to_string(), None, Some(message)),
            JobOutcome::MissedStartDeadline => ("missed_start_deadline".to_string(), None, None),
            JobOutcome::Cancelled => ("cancelled".to_string(), None, None),
        };
        Self { job_id: result.job_id, outcome, return_value, error }
    }
}

impl CommandOutput for JobStatusOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("job_id: {}", self.job_id), format!("outcome: {}", self.outcome)];
        if let Some(value) = &self.return_value {
            lines.push(format!("return_value: {value}"));
        }
        if let Some(error) = &self.error {
            lines.push(format!("error: {error}"));
        }
        lines.join("\n")
    }
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
