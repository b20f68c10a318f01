//! Caller-supplied observation of probe results.
//!
//! [`Observed`] wraps any [`Monitor`] and reports every finished probe to a
//! [`ProbeHook`]. The hook sees the outcome but cannot change it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::monitor::{Monitor, MonitorFailed, MonitorParams};

/// Receives the outcome of every probe.
pub trait ProbeHook: Send + Sync {
    fn on_result(
        &self,
        monitor: &str,
        dst: &str,
        result: Result<(), &MonitorFailed>,
        elapsed: Duration,
    );
}

/// Hook that emits one structured `tracing` event per probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHook;

impl ProbeHook for TracingHook {
    fn on_result(
        &self,
        monitor: &str,
        dst: &str,
        result: Result<(), &MonitorFailed>,
        elapsed: Duration,
    ) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        match result {
            Ok(()) => info!(monitor, dst, elapsed_ms, "probe succeeded"),
            Err(e) => warn!(
                monitor,
                dst,
                elapsed_ms,
                reason = e.message(),
                error = %e,
                "probe failed"
            ),
        }
    }
}

/// A monitor wrapped with a [`ProbeHook`].
///
/// Each probe also runs inside a `probe` span carrying a fresh `probe_id`,
/// so events from the socket and matcher layers correlate.
pub struct Observed<M> {
    inner: M,
    hook: Arc<dyn ProbeHook>,
}

impl<M: Monitor> Observed<M> {
    /// Wrap `inner` and report to `hook`.
    pub fn new(inner: M, hook: Arc<dyn ProbeHook>) -> Self {
        Self { inner, hook }
    }

    /// Wrap `inner` with the [`TracingHook`].
    pub fn traced(inner: M) -> Self {
        Self::new(inner, Arc::new(TracingHook))
    }

    /// The wrapped monitor.
    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: Monitor> std::fmt::Debug for Observed<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observed").field("inner", &self.inner).finish()
    }
}

#[async_trait]
impl<M: Monitor> Monitor for Observed<M> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn params(&self) -> &MonitorParams {
        self.inner.params()
    }

    async fn run(&self, dst: &str) -> Result<(), MonitorFailed> {
        let span = tracing::debug_span!(
            "probe",
            probe_id = %Uuid::new_v4(),
            monitor = self.inner.name(),
            dst
        );

        let start = Instant::now();
        let result = self.inner.run(dst).instrument(span).await;
        self.hook
            .on_result(self.inner.name(), dst, result.as_ref().map(|_| ()), start.elapsed());
        result
    }
}
