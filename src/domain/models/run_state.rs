//! Scheduler lifecycle state.

use serde::{Deserialize, Serialize};

/// The scheduler's coarse lifecycle state. Transitions are strictly
/// monotonic within one lifecycle: `stopped -> starting -> started ->
/// stopping -> stopped`. There is no path back from `stopping` to
/// `started`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Stopped,
    Starting,
    Started,
    Stopping,
}

impl RunState {
    /// Whether `next` is a legal transition from `self`.
    pub fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Stopped, RunState::Starting)
                | (RunState::Starting, RunState::Started)
                | (RunState::Started, RunState::Stopping)
                | (RunState::Stopping, RunState::Stopped)
        )
    }
}

impl Default for RunState {
    fn default() -> Self {
        RunState::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_is_a_strict_cycle() {
        assert!(RunState::Stopped.can_transition_to(RunState::Starting));
        assert!(RunState::Starting.can_transition_to(RunState::Started));
        assert!(RunState::Started.can_transition_to(RunState::Stopping));
        assert!(RunState::Stopping.can_transition_to(RunState::Stopped));
        assert!(!RunState::Started.can_transition_to(RunState::Starting));
        assert!(!RunState::Stopped.can_transition_to(RunState::Started));
    }
}
