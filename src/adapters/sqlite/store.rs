//! SQLite-backed implementation of [`DataStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_datetime, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::job::JobResult;
use crate::domain::models::schedule::{CoalescePolicy, TriggerSpec};
use crate::domain::models::{Identity, Job, Schedule, Task};
use crate::domain::ports::DataStore;

#[derive(Clone)]
pub struct SqliteDataStore {
    pool: SqlitePool,
}

impl SqliteDataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: String,
    task_id: String,
    trigger: String,
    args: String,
    coalesce: String,
    max_jitter_micros: Option<i64>,
    misfire_grace_micros: Option<i64>,
    next_fire_time: Option<String>,
    last_fire_time: Option<String>,
    paused: i64,
    claimed_by: Option<String>,
    claimed_until: Option<String>,
    tags: String,
}

fn coalesce_from_str(s: &str) -> CoalescePolicy {
    match s {
        "earliest" => CoalescePolicy::Earliest,
        "all" => CoalescePolicy::All,
        _ => CoalescePolicy::Latest,
    }
}

fn coalesce_as_str(c: CoalescePolicy) -> &'static str {
    match c {
        CoalescePolicy::Earliest => "earliest",
        CoalescePolicy::Latest => "latest",
        CoalescePolicy::All => "all",
    }
}

fn row_to_schedule(row: ScheduleRow) -> DomainResult<Schedule> {
    let trigger: TriggerSpec = serde_json::from_str(&row.trigger)?;
    let args: serde_json::Value = serde_json::from_str(&row.args).unwrap_or(serde_json::Value::Null);
    Ok(Schedule {
        id: row.id,
        task_id: row.task_id,
        trigger,
        args,
        coalesce: coalesce_from_str(&row.coalesce),
        max_jitter: row.max_jitter_micros.map(chrono::Duration::microseconds),
        misfire_grace: row.misfire_grace_micros.map(chrono::Duration::microseconds),
        next_fire_time: parse_optional_datetime(row.next_fire_time)?,
        last_fire_time: parse_optional_datetime(row.last_fire_time)?,
        paused: row.paused != 0,
        tags: serde_json::from_str(&row.tags).unwrap_or_default(),
        claimed_by: row.claimed_by,
        claimed_until: parse_optional_datetime(row.claimed_until)?,
    })
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    task_id: String,
    schedule_id: Option<String>,
    args: String,
    scheduled_fire_time: String,
    jitter_micros: Option<i64>,
    start_deadline: Option<String>,
    created_at: String,
    tags: String,
}

fn row_to_job(row: JobRow) -> DomainResult<Job> {
    Ok(Job {
        id: parse_uuid(&row.id)?,
        task_id: row.task_id,
        schedule_id: row.schedule_id,
        args: serde_json::from_str(&row.args).unwrap_or(serde_json::Value::Null),
        scheduled_fire_time: parse_datetime(&row.scheduled_fire_time)?,
        jitter: row.jitter_micros.map(chrono::Duration::microseconds),
        start_deadline: parse_optional_datetime(row.start_deadline)?,
        tags: serde_json::from_str(&row.tags).unwrap_or_default(),
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[derive(sqlx::FromRow)]
struct JobResultRow {
    job_id: String,
    outcome: String,
    started_at: Option<String>,
    finished_at: String,
}

fn row_to_job_result(row: JobResultRow) -> DomainResult<JobResult> {
    Ok(JobResult {
        job_id: parse_uuid(&row.job_id)?,
        outcome: serde_json::from_str(&row.outcome)?,
        started_at: parse_optional_datetime(row.started_at)?,
        finished_at: parse_datetime(&row.finished_at)?,
    })
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    description: Option<String>,
    created_at: String,
}

fn row_to_task(row: TaskRow) -> DomainResult<Task> {
    Ok(Task {
        id: row.id,
        description: row.description,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[async_trait]
impl DataStore for SqliteDataStore {
    async fn add_schedule(&self, schedule: &Schedule) -> DomainResult<()> {
        let trigger = serde_json::to_string(&schedule.trigger)?;
        let args = serde_json::to_string(&schedule.args)?;
        let tags = serde_json::to_string(&schedule.tags)?;
        let next_fire_time = schedule.next_fire_time.map(|dt| dt.to_rfc3339());
        let last_fire_time = schedule.last_fire_time.map(|dt| dt.to_rfc3339());

        sqlx::query(
            "INSERT INTO schedules
             (id, task_id, trigger, args, coalesce, max_jitter_micros, misfire_grace_micros,
              next_fire_time, last_fire_time, paused, claimed_by, claimed_until, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&schedule.id)
        .bind(&schedule.task_id)
        .bind(&trigger)
        .bind(&args)
        .bind(coalesce_as_str(schedule.coalesce))
        .bind(schedule.max_jitter.and_then(|d| d.num_microseconds()))
        .bind(schedule.misfire_grace.and_then(|d| d.num_microseconds()))
        .bind(&next_fire_time)
        .bind(&last_fire_time)
        .bind(schedule.paused as i64)
        .bind(&schedule.claimed_by)
        .bind(schedule.claimed_until.map(|dt| dt.to_rfc3339()))
        .bind(&tags)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DomainError::ScheduleConflict(schedule.id.clone())
            }
            _ => DomainError::from(e),
        })?;

        Ok(())
    }

    async fn get_schedule(&self, id: &str) -> DomainResult<Option<Schedule>> {
        let row: Option<ScheduleRow> = sqlx::query_as("SELECT * FROM schedules WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_schedule).transpose()
    }

    async fn remove_schedule(&self, id: &str) -> DomainResult<()> {
        sqlx::query("DELETE FROM schedules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_schedules(&self) -> DomainResult<Vec<Schedule>> {
        let rows: Vec<ScheduleRow> = sqlx::query_as("SELECT * FROM schedules ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_schedule).collect()
    }

    async fn acquire_schedules(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
        lease: chrono::Duration,
        max: usize,
    ) -> DomainResult<Vec<Schedule>> {
        let mut tx = self.pool.begin().await?;
        let now_s = now.to_rfc3339();
        let claimed_until = (now + lease).to_rfc3339();
        let identity_s = identity.as_str();

        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM schedules
             WHERE paused = 0
               AND next_fire_time IS NOT NULL
               AND next_fire_time <= ?1
               AND (claimed_by IS NULL OR claimed_until < ?1)
             ORDER BY next_fire_time
             LIMIT ?2",
        )
        .bind(&now_s)
        .bind(max as i64)
        .fetch_all(&mut *tx)
        .await?;

        if ids.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        for id in &ids {
            sqlx::query("UPDATE schedules SET claimed_by = ?1, claimed_until = ?2 WHERE id = ?3")
                .bind(identity_s)
                .bind(&claimed_until)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let query = format!("SELECT * FROM schedules WHERE id IN ({placeholders})");
        let mut q = sqlx::query_as::<_, ScheduleRow>(&query);
        for id in &ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&mut *tx).await?;
        tx.commit().await?;

        rows.into_iter().map(row_to_schedule).collect()
    }

    async fn release_schedules(&self, identity: &Identity, schedules: &[Schedule]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        for schedule in schedules {
            match schedule.next_fire_time {
                Some(next) => {
                    sqlx::query(
                        "UPDATE schedules SET
                         claimed_by = NULL, claimed_until = NULL,
                         next_fire_time = ?1, last_fire_time = ?2
                         WHERE id = ?3 AND claimed_by = ?4",
                    )
                    .bind(next.to_rfc3339())
                    .bind(schedule.last_fire_time.map(|dt| dt.to_rfc3339()))
                    .bind(&schedule.id)
                    .bind(identity.as_str())
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query("DELETE FROM schedules WHERE id = ?1 AND claimed_by = ?2")
                        .bind(&schedule.id)
                        .bind(identity.as_str())
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn next_schedule_run_time(&self) -> DomainResult<Option<DateTime<Utc>>> {
        let row: Option<String> = sqlx::query_scalar(
            "SELECT next_fire_time FROM schedules
             WHERE paused = 0 AND next_fire_time IS NOT NULL AND claimed_by IS NULL
             ORDER BY next_fire_time LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        row.map(|s| parse_datetime(&s)).transpose()
    }

    async fn add_job(&self, job: &Job) -> DomainResult<()> {
        let args = serde_json::to_string(&job.args)?;
        let tags = serde_json::to_string(&job.tags)?;
        sqlx::query(
            "INSERT INTO jobs (id, task_id, schedule_id, args, scheduled_fire_time, jitter_micros, start_deadline, created_at, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(job.id.to_string())
        .bind(&job.task_id)
        .bind(&job.schedule_id)
        .bind(&args)
        .bind(job.scheduled_fire_time.to_rfc3339())
        .bind(job.jitter.and_then(|d| d.num_microseconds()))
        .bind(job.start_deadline.map(|dt| dt.to_rfc3339()))
        .bind(job.created_at.to_rfc3339())
        .bind(&tags)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_next_job(&self) -> DomainResult<Option<Job>> {
        let mut tx = self.pool.begin().await?;
        let row: Option<JobRow> = sqlx::query_as(
            "SELECT * FROM jobs WHERE claimed_at IS NULL ORDER BY scheduled_fire_time LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        sqlx::query("UPDATE jobs SET claimed_at = ?1 WHERE id = ?2")
            .bind(Utc::now().to_rfc3339())
            .bind(&row.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        row_to_job(row).map(Some)
    }

    async fn add_job_result(&self, result: &JobResult) -> DomainResult<()> {
        let outcome = serde_json::to_string(&result.outcome)?;
        sqlx::query(
            "INSERT INTO job_results (job_id, outcome, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(job_id) DO UPDATE SET outcome = excluded.outcome,
               started_at = excluded.started_at, finished_at = excluded.finished_at",
        )
        .bind(result.job_id.to_string())
        .bind(&outcome)
        .bind(result.started_at.map(|dt| dt.to_rfc3339()))
        .bind(result.finished_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_job_result(&self, job_id: Uuid) -> DomainResult<Option<JobResult>> {
        let row: Option<JobResultRow> = sqlx::query_as("SELECT * FROM job_results WHERE job_id = ?")
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_job_result).transpose()
    }

    async fn add_task(&self, task: &Task) -> DomainResult<()> {
        sqlx::query("INSERT OR IGNORE INTO tasks (id, description, created_at) VALUES (?1, ?2, ?3)")
            .bind(&task.id)
            .bind(&task.description)
            .bind(task.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_task(&self, id: &str) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_task).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::schedule::TriggerSpec;

    async fn store() -> SqliteDataStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteDataStore::new(pool)
    }

    #[tokio::test]
    async fn add_and_get_schedule_round_trips() {
        let store = store().await;
        let mut schedule = Schedule::new("s1", "t1", TriggerSpec::Once { at: Utc::now() });
        schedule.next_fire_time = Some(Utc::now());
        store.add_schedule(&schedule).await.unwrap();

        let fetched = store.get_schedule("s1").await.unwrap().unwrap();
        assert_eq!(fetched.id, "s1");
        assert_eq!(fetched.task_id, "t1");
    }

    #[tokio::test]
    async fn acquire_schedules_claims_due_unclaimed_rows() {
        let store = store().await;
        let identity = Identity::new("test-instance");
        let now = Utc::now();

        let mut due = Schedule::new("due", "t1", TriggerSpec::Once { at: now });
        due.next_fire_time = Some(now - chrono::Duration::seconds(1));
        store.add_schedule(&due).await.unwrap();

        let mut future = Schedule::new("future", "t1", TriggerSpec::Once { at: now });
        future.next_fire_time = Some(now + chrono::Duration::hours(1));
        store.add_schedule(&future).await.unwrap();

        let acquired = store
            .acquire_schedules(&identity, now, chrono::Duration::seconds(30), 10)
            .await
            .unwrap();

        assert_eq!(acquired.len(), 1);
        assert_eq!(acquired[0].id, "due");

        let second_identity = Identity::new("other-instance");
        let reacquired = store
            .acquire_schedules(&second_identity, now, chrono::Duration::seconds(30), 10)
            .await
            .unwrap();
        assert!(reacquired.is_empty(), "claimed row must not be visible to a second claimant");
    }

    #[tokio::test]
    async fn release_with_none_next_fire_time_deletes_row() {
        let store = store().await;
        let identity = Identity::new("test-instance");
        let now = Utc::now();

        let mut schedule = Schedule::new("one-shot", "t1", TriggerSpec::Once { at: now });
        schedule.next_fire_time = Some(now - chrono::Duration::seconds(1));
        store.add_schedule(&schedule).await.unwrap();

        let mut acquired = store
            .acquire_schedules(&identity, now, chrono::Duration::seconds(30), 10)
            .await
            .unwrap();
        assert_eq!(acquired.len(), 1);
        acquired[0].next_fire_time = None;

        store.release_schedules(&identity, &acquired).await.unwrap();
        assert!(store.get_schedule("one-shot").await.unwrap().is_none());
    }
}
