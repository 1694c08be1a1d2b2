//! Task lifecycle

use std::fmt;

/// Lifecycle of an assembly task.
///
/// `Idle -> Prepared -> Running -> Finalizing -> Done`, with `Finalizing -> Running` when a
/// split opens its next output. Any non terminal state may move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskState {
    #[default]
    Idle,
    /// Sources are open and the plan checked against them
    Prepared,
    /// Pages are being copied
    Running,
    /// A destination is being sanitized, staged or committed
    Finalizing,
    Done,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }

    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, Prepared)
            | (Prepared, Running)
            | (Running, Finalizing)
            | (Finalizing, Running)
            | (Finalizing, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Idle => "idle",
            TaskState::Prepared => "prepared",
            TaskState::Running => "running",
            TaskState::Finalizing => "finalizing",
            TaskState::Done => "done",
            TaskState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use TaskState::*;
        assert!(Idle.can_transition_to(Prepared));
        assert!(Finalizing.can_transition_to(Running));
        assert!(Running.can_transition_to(Failed));
        assert!(Idle.can_transition_to(Failed));
        assert!(!Idle.can_transition_to(Running));
        assert!(!Done.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Idle));
        assert!(!Running.can_transition_to(Done));
    }
}
