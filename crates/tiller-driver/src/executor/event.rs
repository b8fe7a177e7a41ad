use tokio::sync::oneshot;

use crate::connection::AgentEvent;
use crate::error::{DriverError, DriverResult};
use crate::id::TaskId;
use crate::types::{ExecutorContext, FrameworkMessage, TaskSpec, TaskStatus};

pub(crate) enum ExecutorEvent {
    Registered {
        context: ExecutorContext,
    },
    LaunchTask {
        task: TaskSpec,
    },
    KillTask {
        task_id: TaskId,
    },
    MessageReceived {
        message: FrameworkMessage,
    },
    StatusAcknowledged {
        task_id: TaskId,
        sequence: u64,
    },
    ShutdownRequested,
    ConnectionClosed,
    RegistrationFailed {
        error: DriverError,
    },
    SendStatus {
        status: TaskStatus,
        result: oneshot::Sender<DriverResult<()>>,
    },
    SendMessage {
        message: FrameworkMessage,
        result: oneshot::Sender<DriverResult<()>>,
    },
    ProbeStatusDelivery {
        task_id: TaskId,
        sequence: u64,
    },
    Shutdown,
}

impl From<AgentEvent> for ExecutorEvent {
    fn from(event: AgentEvent) -> Self {
        match event {
            AgentEvent::Registered { context } => ExecutorEvent::Registered { context },
            AgentEvent::RunTask { task } => ExecutorEvent::LaunchTask { task },
            AgentEvent::KillTask { task_id } => ExecutorEvent::KillTask { task_id },
            AgentEvent::Message { message } => ExecutorEvent::MessageReceived { message },
            AgentEvent::StatusAck { task_id, sequence } => {
                ExecutorEvent::StatusAcknowledged { task_id, sequence }
            }
            AgentEvent::Shutdown => ExecutorEvent::ShutdownRequested,
        }
    }
}

/// Callback work enqueued by the actor and delivered by the dispatcher task.
pub(crate) enum ExecutorCallback {
    Init { context: ExecutorContext },
    LaunchTask { task: TaskSpec },
    KillTask { task_id: TaskId },
    FrameworkMessage { message: FrameworkMessage },
    Shutdown,
    Error { error: DriverError },
}
