pub mod connection;
pub mod error;
pub mod executor;
mod id;
pub mod scheduler;
mod types;

pub use id::{FrameworkId, IdGenerator, OfferId, SlaveId, TaskId};
pub use types::{
    ExecutorContext, ExecutorInfo, FrameworkMessage, Params, ResourceOffer, TaskSpec, TaskState,
    TaskStatus,
};
