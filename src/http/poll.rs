use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Result;

/// What one status check observed.
#[derive(Debug)]
pub enum PollOutcome<T> {
    Pending(String),
    Ready(T),
    Failed(String),
}

/// Why polling stopped without a ready value.
#[derive(Debug, PartialEq, Eq)]
pub enum PollError {
    Failed { status: String, attempts: u32 },
    TimedOut { attempts: u32 },
}

/// Fixed-interval, bounded polling for job-style workflows.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), interval }
    }

    /// Calls `check` until it reports ready or failed, waiting `interval`
    /// between attempts. An `Err` from `check` is logged and spends an attempt
    /// exactly like a pending status.
    pub async fn run<T, F, Fut>(&self, label: &str, mut check: F) -> std::result::Result<T, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollOutcome<T>>>,
    {
        for attempt in 1..=self.max_attempts {
            match check().await {
                Ok(PollOutcome::Ready(value)) => {
                    debug!(job = label, attempt, "Poll complete");
                    return Ok(value);
                }
                Ok(PollOutcome::Failed(status)) => {
                    return Err(PollError::Failed { status, attempts: attempt });
                }
                Ok(PollOutcome::Pending(status)) => {
                    debug!(job = label, attempt, max = self.max_attempts, status = %status, "Still pending");
                }
                Err(e) => {
                    warn!(job = label, attempt, max = self.max_attempts, "Status check failed: {e}");
                }
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }
        Err(PollError::TimedOut { attempts: self.max_attempts })
    }
}
