use std::collections::HashMap;

use crate::error::{DriverError, DriverResult};
use crate::id::TaskId;
use crate::types::{ExecutorContext, TaskState, TaskStatus};

/// The executor driver's view of the session: the tasks assigned to this
/// node and the status updates not yet acknowledged by the agent.
/// Owned exclusively by the driver actor.
#[derive(Debug)]
pub struct ExecutorState {
    context: Option<ExecutorContext>,
    tasks: HashMap<TaskId, TaskState>,
    pending: HashMap<u64, PendingStatus>,
    /// Monotonically increasing sequence number for status updates.
    /// Resends carry the original sequence so the agent can deduplicate.
    sequence: u64,
}

#[derive(Debug, Clone)]
pub struct PendingStatus {
    pub status: TaskStatus,
    /// Send attempts so far, including the initial one.
    pub attempts: usize,
}

impl ExecutorState {
    pub fn new() -> Self {
        Self {
            context: None,
            tasks: HashMap::new(),
            pending: HashMap::new(),
            sequence: 0,
        }
    }

    /// Stores the initialization context. Returns false if the executor was
    /// already initialized.
    pub fn initialize(&mut self, context: ExecutorContext) -> bool {
        if self.context.is_some() {
            return false;
        }
        self.context = Some(context);
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    /// Returns false if the task is already known.
    pub fn add_task(&mut self, task_id: TaskId) -> bool {
        if self.tasks.contains_key(&task_id) {
            return false;
        }
        self.tasks.insert(task_id, TaskState::Staging);
        true
    }

    pub fn task_state(&self, task_id: TaskId) -> Option<TaskState> {
        self.tasks.get(&task_id).copied()
    }

    /// Validates and records an outgoing status update, assigning it a
    /// sequence number and queueing it for acknowledgement.
    pub fn record_update(&mut self, status: &TaskStatus) -> DriverResult<u64> {
        let Some(state) = self.tasks.get_mut(&status.task_id) else {
            return Err(DriverError::UnknownTask(status.task_id));
        };
        if !state.may_precede(status.state) {
            return Err(DriverError::InvalidArgument(format!(
                "task {} cannot move from {} to {}",
                status.task_id, state, status.state
            )));
        }
        *state = status.state;
        self.sequence += 1;
        self.pending.insert(
            self.sequence,
            PendingStatus {
                status: status.clone(),
                attempts: 1,
            },
        );
        Ok(self.sequence)
    }

    pub fn pending(&self, sequence: u64) -> Option<&PendingStatus> {
        self.pending.get(&sequence)
    }

    /// Increments the attempt counter for an unacknowledged update and
    /// returns the new count.
    pub fn bump_attempts(&mut self, sequence: u64) -> Option<usize> {
        self.pending.get_mut(&sequence).map(|pending| {
            pending.attempts += 1;
            pending.attempts
        })
    }

    /// Drops a pending update, either because the agent acknowledged it or
    /// because redelivery was abandoned.
    pub fn remove_pending(&mut self, sequence: u64) -> Option<PendingStatus> {
        self.pending.remove(&sequence)
    }
}
