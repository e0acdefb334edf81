//! Wait intervals between polls and cancellable waiting
//!
//! Delays come from the service's `Retry-After` hint when present, else the
//! configured polling delay. After a transient failure the delay grows with
//! the attempt number instead. Every wait, and every network call the engine
//! makes, is raced against the caller's [`CancellationToken`] and the
//! optional overall deadline.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::PollingConfig;
use crate::error::CancelCause;
use crate::http::Response;

/// Delay before the next poll after a successful, non-terminal poll
pub fn polling_delay(latest: Option<&Response>, config: &PollingConfig) -> Duration {
    latest
        .and_then(Response::retry_after)
        .unwrap_or_else(|| config.polling_delay())
}

/// Delay after the `attempt`-th consecutive transient failure (zero-based)
///
/// `retry_delay * 2^attempt`, capped at the configured maximum.
pub fn retry_delay(config: &PollingConfig, attempt: u32) -> Duration {
    let base = config.retry_delay();
    let cap = config.max_retry_delay();
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(cap).min(cap)
}

/// An absolute point after which waiting stops
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }

    pub fn has_passed(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Cancellation sources that bound one wait loop
#[derive(Debug, Clone, Copy)]
pub struct CancelScope<'a> {
    token: &'a CancellationToken,
    deadline: Option<Deadline>,
}

impl<'a> CancelScope<'a> {
    pub fn new(token: &'a CancellationToken, deadline: Option<Deadline>) -> Self {
        Self { token, deadline }
    }

    /// Run `fut` unless cancellation or the deadline wins first
    ///
    /// Cancellation is checked before the future is polled, so an already
    /// cancelled scope never starts the work.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, CancelCause> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CancelCause::Cancelled),
            _ = wait_for(self.deadline) => Err(self.deadline_cause()),
            out = fut => Ok(out),
        }
    }

    pub async fn sleep(&self, delay: Duration) -> Result<(), CancelCause> {
        self.guard(tokio::time::sleep(delay)).await
    }

    fn deadline_cause(&self) -> CancelCause {
        CancelCause::DeadlineExceeded(self.deadline.map(|d| d.timeout).unwrap_or_default())
    }
}

async fn wait_for(deadline: Option<Deadline>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d.at).await,
        None => std::future::pending::<()>().await,
    }
}
