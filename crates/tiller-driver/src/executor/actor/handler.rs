use std::sync::Arc;

use log::{debug, error, info, warn};
use tiller_actor::actor::{ActorAction, ActorContext};
use tokio::sync::oneshot;

use crate::connection::ExecutorCall;
use crate::error::{DriverError, DriverResult};
use crate::executor::actor::ExecutorActor;
use crate::executor::event::{ExecutorCallback, ExecutorEvent};
use crate::id::TaskId;
use crate::types::{ExecutorContext, FrameworkMessage, TaskSpec, TaskStatus};

impl ExecutorActor {
    pub(super) fn handle_registered(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        context: ExecutorContext,
    ) -> ActorAction {
        if !self.state.initialize(context.clone()) {
            return ActorAction::warn("duplicate executor registration");
        }
        info!(
            "executor registered on slave {} for framework {}",
            context.slave_id, context.framework_id
        );
        self.emit(ExecutorCallback::Init { context });
        ActorAction::Continue
    }

    pub(super) fn handle_launch_task(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        task: TaskSpec,
    ) -> ActorAction {
        if !self.state.is_initialized() {
            return ActorAction::warn(format!(
                "task {} received before executor initialization",
                task.task_id
            ));
        }
        if !self.state.add_task(task.task_id) {
            return ActorAction::warn(format!("task {} is already known", task.task_id));
        }
        self.emit(ExecutorCallback::LaunchTask { task });
        ActorAction::Continue
    }

    pub(super) fn handle_kill_task(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        task_id: TaskId,
    ) -> ActorAction {
        match self.state.task_state(task_id) {
            None => ActorAction::warn(format!("kill request for unknown task {task_id}")),
            Some(state) if state.is_terminal() => {
                // The reported terminal status stands; the kill is a no-op.
                debug!("kill request for task {task_id} already in state {state}");
                ActorAction::Continue
            }
            Some(_) => {
                self.emit(ExecutorCallback::KillTask { task_id });
                ActorAction::Continue
            }
        }
    }

    pub(super) fn handle_message_received(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        message: FrameworkMessage,
    ) -> ActorAction {
        self.emit(ExecutorCallback::FrameworkMessage { message });
        ActorAction::Continue
    }

    pub(super) fn handle_status_acknowledged(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        task_id: TaskId,
        sequence: u64,
    ) -> ActorAction {
        if self.state.remove_pending(sequence).is_none() {
            debug!("stale acknowledgement for task {task_id} sequence {sequence}");
        }
        ActorAction::Continue
    }

    pub(super) fn handle_shutdown_requested(
        &mut self,
        _ctx: &mut ActorContext<Self>,
    ) -> ActorAction {
        info!("the agent requested executor shutdown");
        self.emit(ExecutorCallback::Shutdown);
        ActorAction::Stop
    }

    pub(super) fn handle_connection_closed(
        &mut self,
        _ctx: &mut ActorContext<Self>,
    ) -> ActorAction {
        self.emit(ExecutorCallback::Error {
            error: DriverError::ConnectionFailed("the agent connection was closed".to_string()),
        });
        ActorAction::fail("the agent connection was closed")
    }

    pub(super) fn handle_registration_failed(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        error: DriverError,
    ) -> ActorAction {
        self.emit(ExecutorCallback::Error {
            error: error.clone(),
        });
        ActorAction::fail(format!("executor registration failed: {error}"))
    }

    pub(super) fn handle_send_status(
        &mut self,
        ctx: &mut ActorContext<Self>,
        status: TaskStatus,
        result: oneshot::Sender<DriverResult<()>>,
    ) -> ActorAction {
        let out = match self.state.record_update(&status) {
            Ok(sequence) => {
                self.transmit_status(ctx, sequence);
                Ok(())
            }
            Err(e) => Err(e),
        };
        let _ = result.send(out);
        ActorAction::Continue
    }

    pub(super) fn handle_send_message(
        &mut self,
        ctx: &mut ActorContext<Self>,
        message: FrameworkMessage,
        result: oneshot::Sender<DriverResult<()>>,
    ) -> ActorAction {
        self.call_agent(ctx, ExecutorCall::Message { message });
        let _ = result.send(Ok(()));
        ActorAction::Continue
    }

    pub(super) fn handle_probe_status_delivery(
        &mut self,
        ctx: &mut ActorContext<Self>,
        task_id: TaskId,
        sequence: u64,
    ) -> ActorAction {
        let Some(pending) = self.state.pending(sequence) else {
            // Acknowledged in time.
            return ActorAction::Continue;
        };
        if pending.attempts >= self.options().status_retry_max_attempts {
            let Some(pending) = self.state.remove_pending(sequence) else {
                return ActorAction::Continue;
            };
            self.emit(ExecutorCallback::Error {
                error: DriverError::Undeliverable {
                    task_id,
                    attempts: pending.attempts,
                },
            });
            return ActorAction::warn(format!(
                "status update for task {task_id} abandoned after {} attempts",
                pending.attempts
            ));
        }
        self.state.bump_attempts(sequence);
        self.transmit_status(ctx, sequence);
        ActorAction::Continue
    }

    /// Sends an unacknowledged status update to the agent and schedules the
    /// next delivery probe.
    pub(super) fn transmit_status(&mut self, ctx: &mut ActorContext<Self>, sequence: u64) {
        let Some(pending) = self.state.pending(sequence) else {
            warn!("status update {sequence} is no longer pending");
            return;
        };
        let status = pending.status.clone();
        let task_id = status.task_id;
        self.call_agent(ctx, ExecutorCall::StatusUpdate { status, sequence });
        ctx.send_with_delay(
            ExecutorEvent::ProbeStatusDelivery { task_id, sequence },
            self.options().status_retry_interval,
        );
    }

    fn call_agent(&self, ctx: &mut ActorContext<Self>, call: ExecutorCall) {
        let connection = Arc::clone(&self.connection);
        ctx.spawn(async move {
            if let Err(e) = connection.call(call).await {
                error!("failed to send a call to the agent: {e}");
            }
        });
    }
}
