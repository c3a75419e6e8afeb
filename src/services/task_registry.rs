//! Process-wide registry mapping stable task ids to the closures that
//! implement them. Only the id is ever persisted (see
//! [`crate::domain::models::Task`]); the registry is how a job's `task_id`
//! is resolved back to runnable code at dispatch time.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::job::JobArgs;

/// The outcome of running a task function, distinct from
/// [`crate::domain::models::job::JobOutcome`]: this is what a task author
/// returns, the worker translates it into a persisted `JobResult`.
pub enum TaskOutcome {
    Success(serde_json::Value),
    Error(String),
}

pub type TaskFn = Arc<dyn Fn(JobArgs) -> BoxFuture<'static, TaskOutcome> + Send + Sync>;

type Registry = RwLock<HashMap<String, TaskFn>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a task function under `id`, replacing any previous
/// registration. Typically called once at process startup for each task
/// a binary knows how to run.
pub fn register_task(id: impl Into<String>, f: TaskFn) {
    registry().write().unwrap().insert(id.into(), f);
}

/// Look up a previously registered task function.
pub fn lookup_task(id: &str) -> DomainResult<TaskFn> {
    registry()
        .read()
        .unwrap()
        .get(id)
        .cloned()
        .ok_or_else(|| DomainError::TaskNotFound(id.to_string()))
}

/// Whether a task id has a registered function.
pub fn is_registered(id: &str) -> bool {
    registry().read().unwrap().contains_key(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[test]
    fn lookup_fails_for_unregistered_id() {
        assert!(lookup_task("definitely-not-registered").is_err());
    }

    #[tokio::test]
    async fn registered_task_is_invokable() {
        register_task(
            "echo",
            Arc::new(|args: JobArgs| async move { TaskOutcome::Success(args) }.boxed()),
        );
        let f = lookup_task("echo").unwrap();
        match f(serde_json::json!({"x": 1})).await {
            TaskOutcome::Success(v) => assert_eq!(v, serde_json::json!({"x": 1})),
            TaskOutcome::Error(e) => panic!("unexpected error: {e}"),
        }
    }
}
