use std::sync::Arc;

use log::{debug, error, info, warn};
use tiller_actor::actor::{ActorAction, ActorContext};
use tokio::sync::oneshot;

use crate::connection::FrameworkCall;
use crate::error::{DriverError, DriverResult};
use crate::id::{FrameworkId, OfferId, SlaveId, TaskId};
use crate::scheduler::actor::SchedulerActor;
use crate::scheduler::event::{SchedulerCallback, SchedulerEvent};
use crate::scheduler::state::StatusDisposition;
use crate::types::{FrameworkMessage, Params, ResourceOffer, TaskSpec, TaskStatus};

impl SchedulerActor {
    pub(super) fn handle_registered(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        framework_id: FrameworkId,
    ) -> ActorAction {
        if self.state.framework_id().is_some() {
            return ActorAction::warn(format!("duplicate registration as {framework_id}"));
        }
        info!("framework registered as {framework_id}");
        self.state.set_framework_id(framework_id.clone());
        self.emit(SchedulerCallback::Registered { framework_id });
        ActorAction::Continue
    }

    pub(super) fn handle_offers_received(
        &mut self,
        ctx: &mut ActorContext<Self>,
        offer_id: OfferId,
        offers: Vec<ResourceOffer>,
    ) -> ActorAction {
        if !self.state.add_offer(offer_id.clone(), offers.clone()) {
            return ActorAction::warn(format!("offer {offer_id} is already known"));
        }
        if let Some(expiry) = self.options().offer_expiry {
            ctx.send_with_delay(
                SchedulerEvent::ProbeOfferExpiry {
                    offer_id: offer_id.clone(),
                },
                expiry,
            );
        }
        self.emit(SchedulerCallback::ResourceOffer { offer_id, offers });
        ActorAction::Continue
    }

    pub(super) fn handle_offer_rescinded(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        offer_id: OfferId,
    ) -> ActorAction {
        if self.state.rescind_offer(&offer_id) {
            self.emit(SchedulerCallback::OfferRescinded { offer_id });
        } else {
            debug!("offer {offer_id} was already closed when rescinded");
        }
        ActorAction::Continue
    }

    pub(super) fn handle_status_received(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        status: TaskStatus,
    ) -> ActorAction {
        match self.state.record_status(&status) {
            StatusDisposition::Applied => {
                self.emit(SchedulerCallback::StatusUpdate { status });
            }
            StatusDisposition::Unknown => {
                debug!("status update for unknown task {}", status.task_id);
                self.emit(SchedulerCallback::StatusUpdate { status });
            }
            StatusDisposition::Duplicate => {
                debug!("duplicate terminal status for task {}", status.task_id);
            }
            StatusDisposition::Stale => {
                return ActorAction::warn(format!(
                    "stale status {} for task {}",
                    status.state, status.task_id
                ));
            }
        }
        ActorAction::Continue
    }

    pub(super) fn handle_message_received(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        message: FrameworkMessage,
    ) -> ActorAction {
        self.emit(SchedulerCallback::FrameworkMessage { message });
        ActorAction::Continue
    }

    pub(super) fn handle_slave_lost(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        slave_id: SlaveId,
    ) -> ActorAction {
        let (lost_tasks, emptied_offers) = self.state.mark_slave_lost(&slave_id);
        if !lost_tasks.is_empty() {
            warn!(
                "slave {slave_id} was lost with {} active tasks",
                lost_tasks.len()
            );
        }
        for offer_id in emptied_offers {
            self.emit(SchedulerCallback::OfferRescinded { offer_id });
        }
        self.emit(SchedulerCallback::SlaveLost { slave_id });
        ActorAction::Continue
    }

    pub(super) fn handle_master_aborted(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        code: i32,
        message: String,
    ) -> ActorAction {
        self.emit(SchedulerCallback::Error {
            error: DriverError::MasterError {
                code,
                message: message.clone(),
            },
        });
        ActorAction::fail(format!("master error {code}: {message}"))
    }

    pub(super) fn handle_connection_closed(
        &mut self,
        _ctx: &mut ActorContext<Self>,
    ) -> ActorAction {
        self.emit(SchedulerCallback::Error {
            error: DriverError::ConnectionFailed("the master connection was closed".to_string()),
        });
        ActorAction::fail("the master connection was closed")
    }

    pub(super) fn handle_registration_failed(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        error: DriverError,
    ) -> ActorAction {
        self.emit(SchedulerCallback::Error {
            error: error.clone(),
        });
        ActorAction::fail(format!("registration failed: {error}"))
    }

    pub(super) fn handle_reply_to_offer(
        &mut self,
        ctx: &mut ActorContext<Self>,
        offer_id: OfferId,
        tasks: Vec<TaskSpec>,
        params: Params,
        result: oneshot::Sender<DriverResult<()>>,
    ) -> ActorAction {
        let out = self.reply_to_offer(ctx, offer_id, tasks, params);
        let _ = result.send(out);
        ActorAction::Continue
    }

    fn reply_to_offer(
        &mut self,
        ctx: &mut ActorContext<Self>,
        offer_id: OfferId,
        tasks: Vec<TaskSpec>,
        params: Params,
    ) -> DriverResult<()> {
        self.state.claim_offer(&offer_id, &tasks)?;
        let Some(framework_id) = self.state.framework_id().cloned() else {
            return Err(DriverError::InternalError(
                "the framework is not registered".to_string(),
            ));
        };
        self.call_master(
            ctx,
            FrameworkCall::OfferReply {
                framework_id,
                offer_id,
                tasks,
                params,
            },
        );
        Ok(())
    }

    pub(super) fn handle_kill_task(
        &mut self,
        ctx: &mut ActorContext<Self>,
        task_id: TaskId,
        result: oneshot::Sender<DriverResult<()>>,
    ) -> ActorAction {
        let out = if !self.state.has_task(task_id) {
            Err(DriverError::UnknownTask(task_id))
        } else if let Some(framework_id) = self.state.framework_id().cloned() {
            self.call_master(
                ctx,
                FrameworkCall::KillTask {
                    framework_id,
                    task_id,
                },
            );
            Ok(())
        } else {
            Err(DriverError::InternalError(
                "the framework is not registered".to_string(),
            ))
        };
        let _ = result.send(out);
        ActorAction::Continue
    }

    pub(super) fn handle_revive_offers(
        &mut self,
        ctx: &mut ActorContext<Self>,
        result: oneshot::Sender<DriverResult<()>>,
    ) -> ActorAction {
        let out = match self.state.framework_id().cloned() {
            Some(framework_id) => {
                self.call_master(ctx, FrameworkCall::ReviveOffers { framework_id });
                Ok(())
            }
            None => Err(DriverError::NotRunning),
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
        let out = match self.state.framework_id().cloned() {
            Some(framework_id) => {
                self.call_master(
                    ctx,
                    FrameworkCall::Message {
                        framework_id,
                        message,
                    },
                );
                Ok(())
            }
            None => Err(DriverError::NotRunning),
        };
        let _ = result.send(out);
        ActorAction::Continue
    }

    pub(super) fn handle_probe_offer_expiry(
        &mut self,
        ctx: &mut ActorContext<Self>,
        offer_id: OfferId,
    ) -> ActorAction {
        if !self.state.expire_offer(&offer_id) {
            return ActorAction::Continue;
        }
        info!("offer {offer_id} expired without a reply");
        // Return the capacity to the allocator with an empty reply.
        if let Some(framework_id) = self.state.framework_id().cloned() {
            self.call_master(
                ctx,
                FrameworkCall::OfferReply {
                    framework_id,
                    offer_id: offer_id.clone(),
                    tasks: vec![],
                    params: Params::new(),
                },
            );
        }
        self.emit(SchedulerCallback::OfferRescinded { offer_id });
        ActorAction::Continue
    }

    fn call_master(&self, ctx: &mut ActorContext<Self>, call: FrameworkCall) {
        let connection = Arc::clone(&self.connection);
        ctx.spawn(async move {
            if let Err(e) = connection.call(call).await {
                error!("failed to send a call to the master: {e}");
            }
        });
    }
}
