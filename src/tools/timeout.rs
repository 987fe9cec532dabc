//! Execution Timeout Management
//!
//! Wall-clock budget for one AI tool invocation.

use super::error::ExecutorError;
use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Default budget for one invocation (10 minutes)
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Execution timeout configuration
///
/// Timeouts are enforced so a hung tool cannot hold a work item forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeout {
    duration: Duration,
}

impl Default for ExecutionTimeout {
    fn default() -> Self {
        Self::from_secs(DEFAULT_TIMEOUT_SECS)
    }
}

impl ExecutionTimeout {
    /// Create a new execution timeout
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use taskguard::tools::ExecutionTimeout;
    ///
    /// let timeout = ExecutionTimeout::new(Duration::from_secs(30));
    /// assert_eq!(timeout.duration(), Duration::from_secs(30));
    /// ```
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Create a timeout from seconds
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Get the timeout duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Drive `future` to completion or fail with [`ExecutorError::Timeout`]
    ///
    /// On expiry the future is dropped. Callers owning a child process must
    /// terminate it themselves once this returns an error.
    pub async fn run<F, T>(&self, future: F) -> Result<T, ExecutorError>
    where
        F: Future<Output = T>,
    {
        time::timeout(self.duration, future)
            .await
            .map_err(|_| ExecutorError::Timeout(self.duration))
    }
}
