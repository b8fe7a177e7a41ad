mod actor;
mod driver;
mod event;
mod options;
pub(crate) mod state;

use async_trait::async_trait;
pub use driver::SchedulerDriver;
pub use options::SchedulerOptions;

use crate::error::DriverError;
use crate::id::{FrameworkId, OfferId, SlaveId};
use crate::types::{ExecutorInfo, FrameworkMessage, ResourceOffer, TaskStatus};

/// Callback interface implemented by a framework's scheduler.
///
/// Callbacks are delivered sequentially on a driver-owned task and run
/// concurrently with the application's own tasks. Values passed in are
/// read-only snapshots; mutating them does not affect driver state. The
/// driver reference may be used to issue commands (for example replying to
/// an offer) from within a callback.
#[async_trait]
pub trait Scheduler: Send + Sync + 'static {
    /// The framework name, queried once during registration.
    fn framework_name(&self) -> String;

    /// The executor that slaves must run for this framework, queried once
    /// during registration.
    fn executor_info(&self) -> ExecutorInfo;

    /// Fires exactly once per successful registration.
    async fn registered(&self, _driver: &SchedulerDriver, _framework_id: FrameworkId) {}

    /// Delivers one offer batch. The offers within a batch are replied to
    /// together under the batch's offer identifier.
    async fn resource_offer(
        &self,
        _driver: &SchedulerDriver,
        _offer_id: OfferId,
        _offers: Vec<ResourceOffer>,
    ) {
    }

    /// The master (or a local expiry) withdrew an unclaimed offer.
    async fn offer_rescinded(&self, _driver: &SchedulerDriver, _offer_id: OfferId) {}

    async fn status_update(&self, _driver: &SchedulerDriver, _status: TaskStatus) {}

    async fn framework_message(&self, _driver: &SchedulerDriver, _message: FrameworkMessage) {}

    /// A node is presumed gone. Tasks and offers tied to the slave are no
    /// longer trustworthy even if no individual terminal status or
    /// rescission arrives for them.
    async fn slave_lost(&self, _driver: &SchedulerDriver, _slave_id: SlaveId) {}

    async fn error(&self, _driver: &SchedulerDriver, _error: DriverError) {}
}
