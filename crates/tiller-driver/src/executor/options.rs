use std::time::Duration;

use tiller_actor::RetryStrategy;
use tiller_common::config::AppConfig;

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub event_buffer: usize,
    /// How long to wait for an acknowledgement before resending a status
    /// update.
    pub status_retry_interval: Duration,
    /// Total send attempts per status update before it is surfaced to the
    /// executor as undeliverable.
    pub status_retry_max_attempts: usize,
    pub registration_retry: RetryStrategy,
}

impl ExecutorOptions {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            event_buffer: config.executor.event_buffer,
            status_retry_interval: Duration::from_millis(config.executor.status_retry_interval_ms),
            status_retry_max_attempts: config.executor.status_retry_max_attempts,
            registration_retry: (&config.executor.registration_retry).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_default_config() {
        let config = AppConfig::load().unwrap();
        let options = ExecutorOptions::new(&config);
        assert_eq!(options.status_retry_interval, Duration::from_secs(5));
        assert_eq!(options.status_retry_max_attempts, 8);
        assert!(options.event_buffer > 0);
    }
}
