use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::DriverResult;
use crate::id::{FrameworkId, OfferId, SlaveId, TaskId};
use crate::types::{
    ExecutorContext, ExecutorInfo, FrameworkMessage, Params, ResourceOffer, TaskSpec, TaskStatus,
};

/// A message sent by the scheduler driver to the master.
#[derive(Debug, Clone)]
pub enum FrameworkCall {
    Register {
        name: String,
        executor: ExecutorInfo,
        /// Set when re-registering after a scheduler failover.
        failover: Option<FrameworkId>,
    },
    Unregister {
        framework_id: FrameworkId,
    },
    /// Consumes the offer batch. An empty task list declines the offer.
    /// `params` carries scheduling hints applied to the unused portion of
    /// the offer.
    OfferReply {
        framework_id: FrameworkId,
        offer_id: OfferId,
        tasks: Vec<TaskSpec>,
        params: Params,
    },
    ReviveOffers {
        framework_id: FrameworkId,
    },
    KillTask {
        framework_id: FrameworkId,
        task_id: TaskId,
    },
    Message {
        framework_id: FrameworkId,
        message: FrameworkMessage,
    },
}

/// A message pushed by the master to the scheduler driver.
#[derive(Debug, Clone)]
pub enum MasterEvent {
    Registered {
        framework_id: FrameworkId,
    },
    /// One offer batch. The batch is keyed by a single offer identifier;
    /// the per-slave offers within it are replied to together.
    Offers {
        offer_id: OfferId,
        offers: Vec<ResourceOffer>,
    },
    RescindOffer {
        offer_id: OfferId,
    },
    StatusUpdate {
        status: TaskStatus,
    },
    Message {
        message: FrameworkMessage,
    },
    SlaveLost {
        slave_id: SlaveId,
    },
    Error {
        code: i32,
        message: String,
    },
}

/// A message sent by the executor driver to its agent.
#[derive(Debug, Clone)]
pub enum ExecutorCall {
    Register,
    /// Status updates are delivered at least once; `sequence` lets the
    /// agent acknowledge and deduplicate resends.
    StatusUpdate { status: TaskStatus, sequence: u64 },
    Message { message: FrameworkMessage },
}

/// A message pushed by the agent to the executor driver.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    Registered { context: ExecutorContext },
    RunTask { task: TaskSpec },
    KillTask { task_id: TaskId },
    Message { message: FrameworkMessage },
    StatusAck { task_id: TaskId, sequence: u64 },
    Shutdown,
}

/// The scheduler driver's only view of the master.
/// Transport and wire formats are the implementation's concern; the test
/// suite drives the protocol with in-memory connections.
#[async_trait]
pub trait MasterConnection: Send + Sync + 'static {
    /// Establishes the session and hands over the channel on which master
    /// events are pushed to the driver.
    async fn connect(&self, events: mpsc::Sender<MasterEvent>) -> DriverResult<()>;

    /// Sends one outbound message. An `Ok` result means the message was
    /// handed to the transport, not that the master processed it.
    async fn call(&self, call: FrameworkCall) -> DriverResult<()>;
}

/// The executor driver's only view of the agent on its node.
#[async_trait]
pub trait AgentConnection: Send + Sync + 'static {
    async fn connect(&self, events: mpsc::Sender<AgentEvent>) -> DriverResult<()>;

    async fn call(&self, call: ExecutorCall) -> DriverResult<()>;
}
