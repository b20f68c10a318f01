//! health_probe - Async health-check probes powered by Rust and Tokio.
//!
//! This crate answers, for one invocation, whether a single check against
//! one destination succeeded and, if not, why. Scheduling, retries and
//! up/down state are left to the caller.
//!
//! # Features
//!
//! - **Deadline budget**: connect, TLS handshake, send and every receive
//!   share one timeout that only ever shrinks
//! - **TCP/TLS monitor**: optional payload and a case-insensitive pattern
//!   matched against the accumulated response
//! - **External script monitor**: runs an executable with the destination
//!   as its argument and checks exit code and output
//! - **Structured logging**: `tracing` events, with an optional JSON formatter
//!
//! # Example
//!
//! ```rust,ignore
//! use health_probe::monitor::{Monitor, TcpMonitor};
//! use health_probe::socket::TlsOptions;
//!
//! let monitor = TcpMonitor::builder(443)
//!     .tls(TlsOptions::verified())
//!     .send_string("HEAD / HTTP/1.0\r\n\r\n")
//!     .match_re("^HTTP/1\\.[01] 200")
//!     .build()?;
//!
//! monitor.run("10.0.0.1").await?;
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars), empty when built outside a checkout
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod config;
pub mod logging;
pub mod monitor;
pub mod observe;
pub mod pattern;
pub mod socket;

// Re-exports for convenience
pub use config::{Config, MonitorConfig};
pub use monitor::{ExternalScript, Monitor, MonitorFailed, MonitorParams, TcpMonitor};
pub use observe::{Observed, ProbeHook, TracingHook};
pub use pattern::Pattern;
pub use socket::{DeadlineSocket, SocketError, TlsOptions};
