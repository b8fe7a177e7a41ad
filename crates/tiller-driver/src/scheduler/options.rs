use std::time::Duration;

use tiller_actor::RetryStrategy;
use tiller_common::config::AppConfig;

use crate::id::FrameworkId;

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Present when re-registering after a scheduler failover.
    pub failover_id: Option<FrameworkId>,
    /// The window after which an unanswered offer is declined locally.
    /// `None` relies on explicit rescission by the master.
    pub offer_expiry: Option<Duration>,
    pub event_buffer: usize,
    pub registration_retry: RetryStrategy,
}

impl SchedulerOptions {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            failover_id: None,
            offer_expiry: match config.scheduler.offer_expiry_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            event_buffer: config.scheduler.event_buffer,
            registration_retry: (&config.scheduler.registration_retry).into(),
        }
    }
}
