//! Insertion policy for [`super::Scheduler::add_schedule`] when a
//! schedule with the same id already exists.

/// How `add_schedule` resolves an id collision against an existing,
/// persisted schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Keep the existing schedule untouched; return its id.
    #[default]
    DoNothing,
    /// Remove the existing schedule and insert the new one in its place.
    Replace,
    /// Return [`crate::domain::errors::DomainError::ScheduleConflict`].
    Fail,
}
