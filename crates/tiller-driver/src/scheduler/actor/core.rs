use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tiller_actor::actor::{Actor, ActorAction, ActorContext};
use tokio::sync::mpsc;

use crate::connection::{FrameworkCall, MasterConnection, MasterEvent};
use crate::scheduler::event::{SchedulerCallback, SchedulerEvent};
use crate::scheduler::options::SchedulerOptions;
use crate::scheduler::state::SchedulerState;
use crate::types::ExecutorInfo;

pub(crate) struct SchedulerActorOptions {
    pub options: SchedulerOptions,
    pub connection: Arc<dyn MasterConnection>,
    pub events: mpsc::Receiver<MasterEvent>,
    pub callbacks: mpsc::UnboundedSender<SchedulerCallback>,
    pub framework_name: String,
    pub executor_info: ExecutorInfo,
}

pub(crate) struct SchedulerActor {
    options: SchedulerOptions,
    pub(super) connection: Arc<dyn MasterConnection>,
    /// The inbound master event channel, taken by the forwarder at startup.
    events: Option<mpsc::Receiver<MasterEvent>>,
    callbacks: mpsc::UnboundedSender<SchedulerCallback>,
    framework_name: String,
    executor_info: ExecutorInfo,
    pub(super) state: SchedulerState,
}

#[async_trait]
impl Actor for SchedulerActor {
    type Message = SchedulerEvent;
    type Options = SchedulerActorOptions;

    fn new(options: SchedulerActorOptions) -> Self {
        Self {
            options: options.options,
            connection: options.connection,
            events: Some(options.events),
            callbacks: options.callbacks,
            framework_name: options.framework_name,
            executor_info: options.executor_info,
            state: SchedulerState::new(),
        }
    }

    async fn start(&mut self, ctx: &mut ActorContext<Self>) {
        if let Some(mut events) = self.events.take() {
            let handle = ctx.handle().clone();
            ctx.spawn(async move {
                while let Some(event) = events.recv().await {
                    if handle.send(SchedulerEvent::from(event)).await.is_err() {
                        return;
                    }
                }
                let _ = handle.send(SchedulerEvent::ConnectionClosed).await;
            });
        }
        let connection = Arc::clone(&self.connection);
        let retry = self.options.registration_retry.clone();
        let call = FrameworkCall::Register {
            name: self.framework_name.clone(),
            executor: self.executor_info.clone(),
            failover: self.options.failover_id.clone(),
        };
        let handle = ctx.handle().clone();
        ctx.spawn(async move {
            let result = retry
                .run(|| {
                    let connection = Arc::clone(&connection);
                    let call = call.clone();
                    async move { connection.call(call).await }
                })
                .await;
            if let Err(error) = result {
                let _ = handle
                    .send(SchedulerEvent::RegistrationFailed { error })
                    .await;
            }
        });
    }

    fn receive(&mut self, ctx: &mut ActorContext<Self>, message: SchedulerEvent) -> ActorAction {
        match message {
            SchedulerEvent::Registered { framework_id } => {
                self.handle_registered(ctx, framework_id)
            }
            SchedulerEvent::OffersReceived { offer_id, offers } => {
                self.handle_offers_received(ctx, offer_id, offers)
            }
            SchedulerEvent::OfferRescinded { offer_id } => {
                self.handle_offer_rescinded(ctx, offer_id)
            }
            SchedulerEvent::StatusReceived { status } => self.handle_status_received(ctx, status),
            SchedulerEvent::MessageReceived { message } => {
                self.handle_message_received(ctx, message)
            }
            SchedulerEvent::SlaveLost { slave_id } => self.handle_slave_lost(ctx, slave_id),
            SchedulerEvent::MasterAborted { code, message } => {
                self.handle_master_aborted(ctx, code, message)
            }
            SchedulerEvent::ConnectionClosed => self.handle_connection_closed(ctx),
            SchedulerEvent::RegistrationFailed { error } => {
                self.handle_registration_failed(ctx, error)
            }
            SchedulerEvent::ReplyToOffer {
                offer_id,
                tasks,
                params,
                result,
            } => self.handle_reply_to_offer(ctx, offer_id, tasks, params, result),
            SchedulerEvent::KillTask { task_id, result } => {
                self.handle_kill_task(ctx, task_id, result)
            }
            SchedulerEvent::ReviveOffers { result } => self.handle_revive_offers(ctx, result),
            SchedulerEvent::SendMessage { message, result } => {
                self.handle_send_message(ctx, message, result)
            }
            SchedulerEvent::ProbeOfferExpiry { offer_id } => {
                self.handle_probe_offer_expiry(ctx, offer_id)
            }
            SchedulerEvent::Shutdown => ActorAction::Stop,
        }
    }

    async fn stop(self, _ctx: &mut ActorContext<Self>) {
        // Let the master release the framework's resources without waiting
        // for a session timeout. Delivery is best-effort.
        if let Some(framework_id) = self.state.framework_id().cloned() {
            let connection = Arc::clone(&self.connection);
            tokio::spawn(async move {
                let _ = connection
                    .call(FrameworkCall::Unregister { framework_id })
                    .await;
            });
        }
    }
}

impl SchedulerActor {
    pub(super) fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    pub(super) fn emit(&mut self, callback: SchedulerCallback) {
        if self.callbacks.send(callback).is_err() {
            debug!("the scheduler callback channel is closed");
        }
    }
}
