//! Integration test exercising the SQLite data store against a real
//! on-disk file (rather than the `:memory:` pool the unit tests use),
//! including a second open to confirm the schema and claim state
//! actually persist across connections.

use chrono::Utc;

use schedulerd::adapters::sqlite::{initialize_database, SqliteDataStore};
use schedulerd::domain::models::schedule::TriggerSpec;
use schedulerd::domain::models::{Identity, Schedule};
use schedulerd::domain::ports::DataStore;

#[tokio::test]
async fn schedule_persists_across_separate_connections_to_the_same_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("scheduler.db");
    let database_url = format!("sqlite:{}", db_path.display());

    {
        let pool = initialize_database(&database_url).await.expect("init database");
        let store = SqliteDataStore::new(pool);

        let mut schedule = Schedule::new("persisted", "demo-task", TriggerSpec::Once { at: Utc::now() });
        schedule.next_fire_time = Some(Utc::now() - chrono::Duration::seconds(1));
        store.add_schedule(&schedule).await.expect("add_schedule");
    }

    // Re-open against the same file: migrations must be idempotent and
    // the previously written row must still be there.
    let pool = initialize_database(&database_url).await.expect("re-init database");
    let store = SqliteDataStore::new(pool);

    let fetched = store.get_schedule("persisted").await.expect("get_schedule").expect("row survives reopen");
    assert_eq!(fetched.task_id, "demo-task");

    let identity = Identity::new("integration-test");
    let acquired = store
        .acquire_schedules(&identity, Utc::now(), chrono::Duration::seconds(30), 10)
        .await
        .expect("acquire_schedules");
    assert_eq!(acquired.len(), 1);
}
