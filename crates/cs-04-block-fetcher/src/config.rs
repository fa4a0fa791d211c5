//! Fetcher configuration

use std::time::Duration;

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Cap on outstanding requests.
    pub max_outstanding: usize,
    /// How long a caller waits for an answer.
    pub fetch_timeout: Duration,
    /// Capacity of the command queue.
    pub channel_capacity: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_outstanding: 5,
            fetch_timeout: Duration::from_secs(12),
            channel_capacity: 5,
        }
    }
}

impl FetcherConfig {
    pub fn for_testing() -> Self {
        Self {
            fetch_timeout: Duration::from_millis(500),
            ..Self::default()
        }
    }
}
