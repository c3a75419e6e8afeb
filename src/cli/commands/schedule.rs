//! `schedulerd schedule {add,list,show,remove}`.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{presets, Cell, ContentArrangement, Table};
use serde::Serialize;

use crate::adapters::sqlite::{initialize_database, SqliteDataStore};
use crate::cli::output::{output, truncate, CommandOutput};
use crate::core::ConflictPolicy;
use crate::domain::models::schedule::{CoalescePolicy, TriggerSpec};
use crate::domain::models::Schedule;
use crate::domain::ports::DataStore;
use crate::infrastructure::config::Config;
use crate::services::fire_time;
use crate::triggers;

async fn store(config: &Config) -> Result<Arc<dyn DataStore>> {
    let pool = initialize_database(&config.database_url)
        .await
        .context("failed to initialize the SQLite data store")?;
    Ok(Arc::new(SqliteDataStore::new(pool)))
}

fn parse_coalesce(s: &str) -> Result<CoalescePolicy> {
    match s {
        "earliest" => Ok(CoalescePolicy::Earliest),
        "latest" => Ok(CoalescePolicy::Latest),
        "all" => Ok(CoalescePolicy::All),
        other => bail!("invalid coalesce policy '{other}', expected earliest, latest, or all"),
    }
}

fn seconds_to_duration(seconds: f64) -> chrono::Duration {
    chrono::Duration::microseconds((seconds * 1_000_000.0).round() as i64)
}

fn parse_conflict_policy(s: &str) -> Result<ConflictPolicy> {
    match s {
        "do-nothing" => Ok(ConflictPolicy::DoNothing),
        "replace" => Ok(ConflictPolicy::Replace),
        "fail" => Ok(ConflictPolicy::Fail),
        other => bail!("invalid conflict policy '{other}', expected do-nothing, replace, or fail"),
    }
}

fn build_trigger_spec(cron: Option<String>, interval_seconds: Option<i64>, at: Option<String>) -> Result<TriggerSpec> {
    match (cron, interval_seconds, at) {
        (Some(expression), None, None) => Ok(TriggerSpec::Cron { expression, start: None, end: None }),
        (None, Some(every_seconds), None) => Ok(TriggerSpec::Interval { every_seconds, start: None }),
        (None, None, Some(at)) => {
            let at: DateTime<Utc> = at.parse().context("--at must be an RFC3339 timestamp")?;
            Ok(TriggerSpec::Once { at })
        }
        _ => bail!("exactly one of --cron, --interval-seconds, or --at is required"),
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_add(
    config: &Config,
    id: String,
    task_id: String,
    cron: Option<String>,
    interval_seconds: Option<i64>,
    at: Option<String>,
    args: String,
    coalesce: String,
    max_jitter_seconds: Option<f64>,
    misfire_grace_seconds: Option<f64>,
    on_conflict: String,
    json: bool,
) -> Result<()> {
    let trigger_spec = build_trigger_spec(cron, interval_seconds, at)?;
    let args: serde_json::Value = serde_json::from_str(&args).context("--args must be valid JSON")?;
    let coalesce = parse_coalesce(&coalesce)?;
    let conflict = parse_conflict_policy(&on_conflict)?;

    let mut trigger = triggers::build_trigger(&trigger_spec)?;
    let next_fire_time = fire_time::initial_fire_time(trigger.as_mut(), Utc::now());

    let mut schedule = Schedule::new(id, task_id, trigger_spec)
        .with_args(args)
        .with_coalesce(coalesce);
    schedule.next_fire_time = next_fire_time;
    if let Some(seconds) = max_jitter_seconds {
        schedule = schedule.with_max_jitter(seconds_to_duration(seconds));
    }
    if let Some(seconds) = misfire_grace_seconds {
        schedule = schedule.with_misfire_grace(seconds_to_duration(seconds));
    }

    let store = store(config).await?;
    if let Some(existing) = store.get_schedule(&schedule.id).await? {
        match conflict {
            ConflictPolicy::Fail => bail!("schedule '{}' already exists", schedule.id),
            ConflictPolicy::DoNothing => {
                output(&ScheduleAddedOutput { id: existing.id }, json);
                return Ok(());
            }
            ConflictPolicy::Replace => store.remove_schedule(&schedule.id).await?,
        }
    }

    store.add_schedule(&schedule).await?;
    output(&ScheduleAddedOutput { id: schedule.id }, json);
    Ok(())
}

pub async fn handle_list(config: &Config, json: bool) -> Result<()> {
    let store = store(config).await?;
    let schedules = store.list_schedules().await?;
    let out = ScheduleListOutput { schedules: schedules.iter().map(ScheduleOutput::from).collect() };
    output(&out, json);
    Ok(())
}

pub async fn handle_show(config: &Config, id: String, json: bool) -> Result<()> {
    let store = store(config).await?;
    match store.get_schedule(&id).await? {
        Some(schedule) => {
            output(&ScheduleOutput::from(&schedule), json);
            Ok(())
        }
        None => bail!("schedule '{id}' not found"),
    }
}

pub async fn handle_remove(config: &Config, id: String, json: bool) -> Result<()> {
    let store = store(config).await?;
    store.remove_schedule(&id).await?;
    output(&ScheduleRemovedOutput { id }, json);
    Ok(())
}

#[derive(Debug, Serialize)]
struct ScheduleAddedOutput {
    id: String,
}

impl CommandOutput for ScheduleAddedOutput {
    fn to_human(&self) -> String {
        format!("schedule '{}' added", self.id)
    }
    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "id": self.id })
    }
}

#[derive(Debug, Serialize)]
struct ScheduleRemovedOutput {
    id: String,
}

impl CommandOutput for ScheduleRemovedOutput {
    fn to_human(&self) -> String {
        format!("schedule '{}' removed", self.id)
    }
    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "id": self.id })
    }
}

#[derive(Debug, Serialize)]
pub struct ScheduleOutput {
    pub id: String,
    pub task_id: String,
    pub coalesce: String,
    pub next_fire_time: Option<String>,
    pub last_fire_time: Option<String>,
    pub paused: bool,
    pub claimed_by: Option<String>,
}

impl From<&Schedule> for ScheduleOutput {
    fn from(s: &Schedule) -> Self {
        Self {
            id: s.id.clone(),
            task_id: truncate(&s.task_id, 30),
            coalesce: format!("{:?}", s.coalesce).to_lowercase(),
            next_fire_time: s.next_fire_time.map(|t| t.to_rfc3339()),
            last_fire_time: s.last_fire_time.map(|t| t.to_rfc3339()),
            paused: s.paused,
            claimed_by: s.claimed_by.clone(),
        }
    }
}

impl CommandOutput for ScheduleOutput {
    fn to_human(&self) -> String {
        format!(
            "id: {}\ntask_id: {}\ncoalesce: {}\nnext_fire_time: {}\nlast_fire_time: {}\npaused: {}\nclaimed_by: {}",
            self.id,
            self.task_id,
            self.coalesce,
            self.next_fire_time.as_deref().unwrap_or("-"),
            self.last_fire_time.as_deref().unwrap_or("-"),
            self.paused,
            self.claimed_by.as_deref().unwrap_or("-"),
        )
    }
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct ScheduleListOutput {
    pub schedules: Vec<ScheduleOutput>,
}

impl CommandOutput for ScheduleListOutput {
    fn to_human(&self) -> String {
        if self.schedules.is_empty() {
            return "No schedules found.".to_string();
        }

        let mut table = Table::new();
        table
            .load_preset(presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(["ID", "TASK", "COALESCE", "NEXT FIRE", "PAUSED", "CLAIMED BY"].map(Cell::new));

        for s in &self.schedules {
            table.add_row([
                s.id.as_str(),
                s.task_id.as_str(),
                s.coalesce.as_str(),
                s.next_fire_time.as_deref().unwrap_or("-"),
                if s.paused { "yes" } else { "no" },
                s.claimed_by.as_deref().unwrap_or("-"),
            ]);
        }

        format!("{} schedule(s):\n{table}", self.schedules.len())
    }
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
