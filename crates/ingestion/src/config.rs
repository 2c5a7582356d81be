//! Tunables for fetching, chunking and the queue worker.

use std::time::Duration;

/// Default chunk ceiling: 50 MiB of decoded values.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 50 * 1024 * 1024;

/// Estimated in-memory size of one decoded value.
pub const BYTES_PER_VALUE: usize = 8;

/// HTTP fetch behaviour.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-request timeout
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_retry_delay: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

/// How the worker treats queue items it cannot process yet.
#[derive(Debug, Clone)]
pub struct WorkerPolicy {
    /// Requests whose valid time is older than this are dropped
    pub max_age: chrono::Duration,
    /// Delay before retrying a request whose files are not published yet
    pub missing_retry: Duration,
    /// Delay before retrying a request that failed
    pub failure_retry: Duration,
}

impl Default for WorkerPolicy {
    fn default() -> Self {
        Self {
            max_age: chrono::Duration::hours(12),
            missing_retry: Duration::from_secs(300),
            failure_retry: Duration::from_secs(240),
        }
    }
}
