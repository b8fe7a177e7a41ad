use thiserror::Error;

use crate::id::{OfferId, TaskId};

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The offer is unknown, or has already been claimed, rescinded, or
    /// expired. Replying to such an offer has no effect on the peer.
    #[error("offer {0} is not open")]
    OfferNotOpen(OfferId),
    #[error("unknown task {0}")]
    UnknownTask(TaskId),
    #[error("driver is not running")]
    NotRunning,
    #[error("status update for task {task_id} could not be delivered after {attempts} attempts")]
    Undeliverable { task_id: TaskId, attempts: usize },
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("master error {code}: {message}")]
    MasterError { code: i32, message: String },
    #[error("internal error: {0}")]
    InternalError(String),
}
