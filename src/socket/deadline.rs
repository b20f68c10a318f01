//! Shared, shrinking I/O budget.
//!
//! One [`Deadline`] is threaded through every blocking step of a probe
//! (connect, handshake, send, each receive). Each step runs under the
//! remaining budget and the time it took is subtracted afterwards, so the
//! whole sequence is bounded by the originally configured timeout.

use std::future::Future;
use std::time::Duration;

use tokio::time::error::Elapsed;
use tokio::time::Instant;

/// Remaining time budget for a sequence of I/O operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    remaining: Duration,
}

impl Deadline {
    /// Create a budget of `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { remaining: timeout }
    }

    /// Time left for the next operation.
    #[inline]
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Whether the budget has been used up.
    ///
    /// An exhausted budget is still usable: the next operation gets a zero
    /// timeout and fails unless it is ready on its first poll.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_zero()
    }

    /// Subtract `elapsed` from the budget, clamping at zero.
    pub fn consume(&mut self, elapsed: Duration) {
        self.remaining = self.remaining.saturating_sub(elapsed);
    }

    /// Run `fut` under the remaining budget and charge the time it took.
    ///
    /// The charge is applied on success, on error and on expiry alike.
    pub async fn run<F: Future>(&mut self, fut: F) -> Result<F::Output, Elapsed> {
        let start = Instant::now();
        let result = tokio::time::timeout(self.remaining, fut).await;
        self.consume(start.elapsed());
        result
    }
}
