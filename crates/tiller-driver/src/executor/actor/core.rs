use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tiller_actor::actor::{Actor, ActorAction, ActorContext};
use tokio::sync::mpsc;

use crate::connection::{AgentConnection, AgentEvent, ExecutorCall};
use crate::executor::event::{ExecutorCallback, ExecutorEvent};
use crate::executor::options::ExecutorOptions;
use crate::executor::state::ExecutorState;

pub(crate) struct ExecutorActorOptions {
    pub options: ExecutorOptions,
    pub connection: Arc<dyn AgentConnection>,
    pub events: mpsc::Receiver<AgentEvent>,
    pub callbacks: mpsc::UnboundedSender<ExecutorCallback>,
}

pub(crate) struct ExecutorActor {
    options: ExecutorOptions,
    pub(super) connection: Arc<dyn AgentConnection>,
    /// The inbound agent event channel, taken by the forwarder at startup.
    events: Option<mpsc::Receiver<AgentEvent>>,
    callbacks: mpsc::UnboundedSender<ExecutorCallback>,
    pub(super) state: ExecutorState,
}

#[async_trait]
impl Actor for ExecutorActor {
    type Message = ExecutorEvent;
    type Options = ExecutorActorOptions;

    fn new(options: ExecutorActorOptions) -> Self {
        Self {
            options: options.options,
            connection: options.connection,
            events: Some(options.events),
            callbacks: options.callbacks,
            state: ExecutorState::new(),
        }
    }

    async fn start(&mut self, ctx: &mut ActorContext<Self>) {
        if let Some(mut events) = self.events.take() {
            let handle = ctx.handle().clone();
            ctx.spawn(async move {
                while let Some(event) = events.recv().await {
                    if handle.send(ExecutorEvent::from(event)).await.is_err() {
                        return;
                    }
                }
                let _ = handle.send(ExecutorEvent::ConnectionClosed).await;
            });
        }
        let connection = Arc::clone(&self.connection);
        let retry = self.options.registration_retry.clone();
        let handle = ctx.handle().clone();
        ctx.spawn(async move {
            let result = retry
                .run(|| {
                    let connection = Arc::clone(&connection);
                    async move { connection.call(ExecutorCall::Register).await }
                })
                .await;
            if let Err(error) = result {
                let _ = handle
                    .send(ExecutorEvent::RegistrationFailed { error })
                    .await;
            }
        });
    }

    fn receive(&mut self, ctx: &mut ActorContext<Self>, message: ExecutorEvent) -> ActorAction {
        match message {
            ExecutorEvent::Registered { context } => self.handle_registered(ctx, context),
            ExecutorEvent::LaunchTask { task } => self.handle_launch_task(ctx, task),
            ExecutorEvent::KillTask { task_id } => self.handle_kill_task(ctx, task_id),
            ExecutorEvent::MessageReceived { message } => {
                self.handle_message_received(ctx, message)
            }
            ExecutorEvent::StatusAcknowledged { task_id, sequence } => {
                self.handle_status_acknowledged(ctx, task_id, sequence)
            }
            ExecutorEvent::ShutdownRequested => self.handle_shutdown_requested(ctx),
            ExecutorEvent::ConnectionClosed => self.handle_connection_closed(ctx),
            ExecutorEvent::RegistrationFailed { error } => {
                self.handle_registration_failed(ctx, error)
            }
            ExecutorEvent::SendStatus { status, result } => {
                self.handle_send_status(ctx, status, result)
            }
            ExecutorEvent::SendMessage { message, result } => {
                self.handle_send_message(ctx, message, result)
            }
            ExecutorEvent::ProbeStatusDelivery { task_id, sequence } => {
                self.handle_probe_status_delivery(ctx, task_id, sequence)
            }
            ExecutorEvent::Shutdown => ActorAction::Stop,
        }
    }

    async fn stop(self, _ctx: &mut ActorContext<Self>) {}
}

impl ExecutorActor {
    pub(super) fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    pub(super) fn emit(&mut self, callback: ExecutorCallback) {
        if self.callbacks.send(callback).is_err() {
            debug!("the executor callback channel is closed");
        }
    }
}
