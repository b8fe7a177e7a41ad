use tokio::sync::oneshot;

use crate::connection::MasterEvent;
use crate::error::{DriverError, DriverResult};
use crate::id::{FrameworkId, OfferId, SlaveId, TaskId};
use crate::types::{FrameworkMessage, Params, ResourceOffer, TaskSpec, TaskStatus};

pub(crate) enum SchedulerEvent {
    Registered {
        framework_id: FrameworkId,
    },
    OffersReceived {
        offer_id: OfferId,
        offers: Vec<ResourceOffer>,
    },
    OfferRescinded {
        offer_id: OfferId,
    },
    StatusReceived {
        status: TaskStatus,
    },
    MessageReceived {
        message: FrameworkMessage,
    },
    SlaveLost {
        slave_id: SlaveId,
    },
    MasterAborted {
        code: i32,
        message: String,
    },
    ConnectionClosed,
    RegistrationFailed {
        error: DriverError,
    },
    ReplyToOffer {
        offer_id: OfferId,
        tasks: Vec<TaskSpec>,
        params: Params,
        result: oneshot::Sender<DriverResult<()>>,
    },
    KillTask {
        task_id: TaskId,
        result: oneshot::Sender<DriverResult<()>>,
    },
    ReviveOffers {
        result: oneshot::Sender<DriverResult<()>>,
    },
    SendMessage {
        message: FrameworkMessage,
        result: oneshot::Sender<DriverResult<()>>,
    },
    ProbeOfferExpiry {
        offer_id: OfferId,
    },
    Shutdown,
}

impl From<MasterEvent> for SchedulerEvent {
    fn from(event: MasterEvent) -> Self {
        match event {
            MasterEvent::Registered { framework_id } => {
                SchedulerEvent::Registered { framework_id }
            }
            MasterEvent::Offers { offer_id, offers } => {
                SchedulerEvent::OffersReceived { offer_id, offers }
            }
            MasterEvent::RescindOffer { offer_id } => SchedulerEvent::OfferRescinded { offer_id },
            MasterEvent::StatusUpdate { status } => SchedulerEvent::StatusReceived { status },
            MasterEvent::Message { message } => SchedulerEvent::MessageReceived { message },
            MasterEvent::SlaveLost { slave_id } => SchedulerEvent::SlaveLost { slave_id },
            MasterEvent::Error { code, message } => SchedulerEvent::MasterAborted { code, message },
        }
    }
}

/// Callback work enqueued by the actor and delivered by the dispatcher task.
pub(crate) enum SchedulerCallback {
    Registered {
        framework_id: FrameworkId,
    },
    ResourceOffer {
        offer_id: OfferId,
        offers: Vec<ResourceOffer>,
    },
    OfferRescinded {
        offer_id: OfferId,
    },
    StatusUpdate {
        status: TaskStatus,
    },
    FrameworkMessage {
        message: FrameworkMessage,
    },
    SlaveLost {
        slave_id: SlaveId,
    },
    Error {
        error: DriverError,
    },
}
