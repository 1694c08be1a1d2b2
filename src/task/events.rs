//! Task event reporting

use crate::pdf::CopyWarning;

use super::state::TaskState;

/// Receives notifications from a running task.
///
/// Every method has a no-op default so callers implement only what they need.
pub trait TaskEvents {
    /// `completed` of `total` steps are done. `total` is fixed once the sources are open.
    fn step_completed(&mut self, _completed: u32, _total: u32) {}

    fn warning(&mut self, _warning: &CopyWarning) {}

    fn state_changed(&mut self, _from: TaskState, _to: TaskState) {}

    /// Source `index` was released; no later step reads it
    fn source_released(&mut self, _index: usize) {}

    /// Polled before each step. Returning true fails the task with [`crate::Error::Cancelled`].
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentEvents;

impl TaskEvents for SilentEvents {}
