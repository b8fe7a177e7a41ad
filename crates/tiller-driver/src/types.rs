use std::collections::HashMap;
use std::fmt;
use std::fmt::Formatter;

use crate::id::{FrameworkId, SlaveId, TaskId};

/// Named string parameters attached to offers, tasks, and replies.
pub type Params = HashMap<String, String>;

/// Describes the code a node must run to host tasks of a framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorInfo {
    /// The location of the executor binary or package.
    pub uri: String,
    pub data: Vec<u8>,
    pub params: Params,
}

impl ExecutorInfo {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            data: vec![],
            params: Params::new(),
        }
    }
}

/// A task submitted in an offer reply. Immutable once sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub task_id: TaskId,
    pub slave_id: SlaveId,
    pub name: String,
    pub params: Params,
    pub data: Vec<u8>,
}

/// One slave's share of an offer batch: a unilateral, time-bounded grant of
/// capacity, valid for at most one reply or until rescinded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceOffer {
    pub slave_id: SlaveId,
    pub host: String,
    /// Resource quantities as named strings, e.g. `cpus` and `mem`.
    pub params: Params,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Finished | TaskState::Failed | TaskState::Killed | TaskState::Lost
        )
    }

    fn rank(&self) -> u8 {
        match self {
            TaskState::Staging => 0,
            TaskState::Starting => 1,
            TaskState::Running => 2,
            TaskState::Finished | TaskState::Failed | TaskState::Killed | TaskState::Lost => 3,
        }
    }

    /// Whether a task in this state may next report `next`.
    /// Terminal states are absorbing; non-terminal states may be repeated or
    /// skipped but never revisited.
    pub fn may_precede(&self, next: TaskState) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Staging => write!(f, "STAGING"),
            TaskState::Starting => write!(f, "STARTING"),
            TaskState::Running => write!(f, "RUNNING"),
            TaskState::Finished => write!(f, "FINISHED"),
            TaskState::Failed => write!(f, "FAILED"),
            TaskState::Killed => write!(f, "KILLED"),
            TaskState::Lost => write!(f, "LOST"),
        }
    }
}

/// A task outcome produced by the executor side and consumed by the
/// scheduler side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub state: TaskState,
    pub data: Vec<u8>,
}

impl TaskStatus {
    pub fn new(task_id: TaskId, state: TaskState) -> Self {
        Self {
            task_id,
            state,
            data: vec![],
        }
    }
}

/// An out-of-band opaque payload, unordered with respect to status updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkMessage {
    pub slave_id: SlaveId,
    pub task_id: TaskId,
    pub data: Vec<u8>,
}

/// The initialization context delivered to an executor exactly once,
/// before any task is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorContext {
    pub slave_id: SlaveId,
    pub host: String,
    pub framework_id: FrameworkId,
    pub framework_name: String,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_terminality() {
        assert!(!TaskState::Staging.is_terminal());
        assert!(!TaskState::Starting.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Finished.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Killed.is_terminal());
        assert!(TaskState::Lost.is_terminal());
    }

    #[test]
    fn test_task_state_order() {
        assert!(TaskState::Staging.may_precede(TaskState::Starting));
        assert!(TaskState::Starting.may_precede(TaskState::Running));
        assert!(TaskState::Running.may_precede(TaskState::Finished));
        // Intermediate states may be skipped.
        assert!(TaskState::Staging.may_precede(TaskState::Running));
        assert!(TaskState::Staging.may_precede(TaskState::Lost));
        // Non-terminal states may repeat.
        assert!(TaskState::Running.may_precede(TaskState::Running));
        // No transition goes backwards.
        assert!(!TaskState::Running.may_precede(TaskState::Starting));
        assert!(!TaskState::Starting.may_precede(TaskState::Staging));
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        for state in [
            TaskState::Finished,
            TaskState::Failed,
            TaskState::Killed,
            TaskState::Lost,
        ] {
            assert!(!state.may_precede(TaskState::Running));
            assert!(!state.may_precede(TaskState::Finished));
            assert!(!state.may_precede(state));
        }
    }
}
