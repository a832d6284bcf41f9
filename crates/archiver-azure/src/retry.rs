//! Bounded exponential retry for storage requests

use std::future::Future;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::warn;

use archiver_core::BackendError;

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(250);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Retry transient failures with a doubling delay, giving up after
/// `max_attempts` attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Delays slept between attempts.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let retries = self.max_attempts.saturating_sub(1) as usize;
        let initial_ms = u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX);
        // Base 2 yields 2, 4, 8.. times the factor; halving starts the series at `initial_ms`.
        ExponentialBackoff::from_millis(2)
            .factor(initial_ms)
            .map(|delay| delay / 2)
            .take(retries)
    }

    pub(crate) async fn run<T, A, Fut>(&self, operation: &str, action: A) -> Result<T, BackendError>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempts = Attempts {
            operation,
            failed: 0,
            max_attempts: self.max_attempts,
        };
        RetryIf::spawn(self.delays(), action, |err: &BackendError| attempts.record(err)).await
    }
}

/// Failed attempts of one operation.
struct Attempts<'a> {
    operation: &'a str,
    failed: u32,
    max_attempts: u32,
}

impl Attempts<'_> {
    /// Count a failure; returns whether another attempt follows.
    fn record(&mut self, err: &BackendError) -> bool {
        self.failed += 1;
        if !err.is_transient() {
            return false;
        }
        let retrying = self.failed < self.max_attempts;
        if retrying {
            warn!(operation = self.operation, attempt = self.failed, error = %err, "transient storage error, retrying");
        } else {
            warn!(operation = self.operation, attempts = self.failed, error = %err, "transient storage error, giving up");
        }
        retrying
    }
}
