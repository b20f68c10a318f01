//! Health monitors.
//!
//! A [`Monitor`] answers one question for one destination: did this single
//! check succeed, and if not, why. Scheduling, retries and up/down state
//! belong to the caller, which typically holds `Arc<dyn Monitor>` and spawns
//! one task per destination:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use health_probe::monitor::{Monitor, TcpMonitor};
//!
//! let monitor: Arc<dyn Monitor> = Arc::new(
//!     TcpMonitor::builder(443).tls(TlsOptions::verified()).build()?,
//! );
//!
//! for dst in ["10.0.0.1", "10.0.0.2"] {
//!     let monitor = Arc::clone(&monitor);
//!     tokio::spawn(async move {
//!         if let Err(e) = monitor.run(dst).await {
//!             tracing::warn!(dst, error = %e, "probe failed");
//!         }
//!     });
//! }
//! ```
//!
//! `run()` takes `&self` and keeps all per-probe state on its own stack, so
//! concurrent probes of the same monitor never interfere.

mod error;
mod external;
mod tcp;

pub use error::{MonitorFailed, ValidationError, MAX_RESPONSE_SHOWN};
pub use external::ExternalScript;
pub use tcp::{TcpMonitor, TcpMonitorBuilder, MAX_SEND_LEN};

use std::time::Duration;

use async_trait::async_trait;
use tracing::error;

/// Smallest allowed probe interval.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);
/// Largest allowed probe interval.
pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);
/// Smallest allowed probe timeout.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(100);
/// Largest allowed probe timeout.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(5);
/// Largest allowed retry count.
pub const MAX_RETRIES: u32 = 5;

/// Scheduling parameters shared by all monitor types.
///
/// Only `timeout` is acted on by the monitor itself; `interval` and
/// `retries` are carried for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorParams {
    interval: Duration,
    timeout: Duration,
    retries: u32,
}

impl MonitorParams {
    /// Validate and create parameters.
    pub fn new(interval: Duration, timeout: Duration, retries: u32) -> Result<Self, ValidationError> {
        let check = || {
            if !(MIN_INTERVAL..=MAX_INTERVAL).contains(&interval) {
                return Err(ValidationError::Interval(interval));
            }
            if !(MIN_TIMEOUT..=MAX_TIMEOUT).contains(&timeout) {
                return Err(ValidationError::Timeout(timeout));
            }
            if timeout >= interval {
                return Err(ValidationError::TimeoutExceedsInterval { timeout, interval });
            }
            if retries > MAX_RETRIES {
                return Err(ValidationError::Retries(retries));
            }
            Ok(())
        };

        check().map_err(|e| {
            error!("{}", e);
            e
        })?;

        Ok(Self {
            interval,
            timeout,
            retries,
        })
    }

    /// Same as [`MonitorParams::new`] with float seconds.
    pub fn from_secs_f64(interval: f64, timeout: f64, retries: u32) -> Result<Self, ValidationError> {
        let interval = secs(interval).ok_or(ValidationError::Interval(Duration::ZERO))?;
        let timeout = secs(timeout).ok_or(ValidationError::Timeout(Duration::ZERO))?;
        Self::new(interval, timeout, retries)
    }

    /// Time between probes of one destination.
    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Budget for one probe.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Consecutive failures tolerated by the scheduler.
    #[inline]
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

impl Default for MonitorParams {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(5),
            retries: 2,
        }
    }
}

/// Non-negative, finite seconds to a duration.
pub(crate) fn secs(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok()
}

/// A health-check strategy.
///
/// Implementations must be thread-safe: the same instance is probed
/// concurrently for many destinations. `run()` never retries.
#[async_trait]
pub trait Monitor: Send + Sync + std::fmt::Debug {
    /// Monitor type name, used in exported state and logs.
    fn name(&self) -> &'static str;

    /// Scheduling parameters.
    fn params(&self) -> &MonitorParams;

    /// Time between probes of one destination.
    fn interval(&self) -> Duration {
        self.params().interval()
    }

    /// Budget for one probe.
    fn timeout(&self) -> Duration {
        self.params().timeout()
    }

    /// Consecutive failures tolerated by the scheduler.
    fn retries(&self) -> u32 {
        self.params().retries()
    }

    /// Probe `dst` once.
    async fn run(&self, dst: &str) -> Result<(), MonitorFailed>;
}
