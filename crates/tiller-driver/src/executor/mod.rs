mod actor;
mod driver;
mod event;
mod options;
pub(crate) mod state;

use async_trait::async_trait;
pub use driver::ExecutorDriver;
pub use options::ExecutorOptions;

use crate::error::DriverError;
use crate::id::TaskId;
use crate::types::{ExecutorContext, FrameworkMessage, TaskSpec};

/// Callback interface implemented by a framework's executor.
///
/// Callbacks are delivered sequentially on a driver-owned task.
/// `launch_task` must not block: run the task on a task of your own and
/// report progress asynchronously through
/// [ExecutorDriver::send_status_update].
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Delivers the initialization context exactly once, before any
    /// `launch_task` call.
    async fn init(&self, _driver: &ExecutorDriver, _context: ExecutorContext) {}

    async fn launch_task(&self, _driver: &ExecutorDriver, _task: TaskSpec) {}

    /// Asynchronous kill request. The executor must eventually emit a
    /// terminal status for the task; if the task already finished, the
    /// reported terminal status stands and the kill is a no-op.
    async fn kill_task(&self, _driver: &ExecutorDriver, _task_id: TaskId) {}

    async fn framework_message(&self, _driver: &ExecutorDriver, _message: FrameworkMessage) {}

    /// Terminal callback; after it returns the driver stops forwarding
    /// task launches and the process is expected to exit.
    async fn shutdown(&self, _driver: &ExecutorDriver) {}

    async fn error(&self, _driver: &ExecutorDriver, _error: DriverError) {}
}
