//! Monitor error types.
//!
//! [`ValidationError`] is raised while building a monitor and means the
//! monitor can never be used. [`MonitorFailed`] is the outcome of one failed
//! probe and is handed to the scheduler, which owns any retry decision.

use std::fmt;
use std::io;
use std::time::Duration;

use crate::socket::SocketError;

/// Maximum number of response characters quoted in a failure message.
pub const MAX_RESPONSE_SHOWN: usize = 512;

/// Invalid construction-time parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Port outside 1..=65535.
    Port(i64),
    /// Pattern longer than the allowed number of characters.
    PatternTooLong { pattern: String, max: usize },
    /// Pattern does not compile.
    PatternInvalid { pattern: String, error: String },
    /// Send payload longer than the allowed number of characters.
    SendTooLong { payload: String, max: usize },
    /// Interval outside the allowed range.
    Interval(Duration),
    /// Timeout outside the allowed range.
    Timeout(Duration),
    /// Timeout not strictly shorter than the interval.
    TimeoutExceedsInterval { timeout: Duration, interval: Duration },
    /// Retries outside the allowed range.
    Retries(u32),
    /// TLS client configuration could not be built.
    TlsConfig(String),
}

impl ValidationError {
    /// Name of the offending parameter.
    pub fn param(&self) -> &'static str {
        match self {
            ValidationError::Port(_) => "port",
            ValidationError::PatternTooLong { .. } | ValidationError::PatternInvalid { .. } => {
                "match_re"
            }
            ValidationError::SendTooLong { .. } => "send_string",
            ValidationError::Interval(_) => "interval",
            ValidationError::Timeout(_) | ValidationError::TimeoutExceedsInterval { .. } => {
                "timeout"
            }
            ValidationError::Retries(_) => "retries",
            ValidationError::TlsConfig(_) => "tls",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Port(port) => {
                write!(f, "port \"{}\" must be an integer between 1 and 65535", port)
            }
            ValidationError::PatternTooLong { pattern, max } => {
                write!(f, "match_re \"{}\" must be a string, {} chars max", pattern, max)
            }
            ValidationError::PatternInvalid { pattern, error } => {
                write!(
                    f,
                    "failed to compile a regular expression from \"{}\": {}",
                    pattern, error
                )
            }
            ValidationError::SendTooLong { payload, max } => {
                write!(f, "send_string \"{}\" must be a string, {} chars max", payload, max)
            }
            ValidationError::Interval(interval) => {
                write!(
                    f,
                    "interval {:.3}s must be between {}s and {}s",
                    interval.as_secs_f64(),
                    super::MIN_INTERVAL.as_secs_f64(),
                    super::MAX_INTERVAL.as_secs_f64()
                )
            }
            ValidationError::Timeout(timeout) => {
                write!(
                    f,
                    "timeout {:.3}s must be between {}s and {}s",
                    timeout.as_secs_f64(),
                    super::MIN_TIMEOUT.as_secs_f64(),
                    super::MAX_TIMEOUT.as_secs_f64()
                )
            }
            ValidationError::TimeoutExceedsInterval { timeout, interval } => {
                write!(
                    f,
                    "timeout {:.3}s must be less than interval {:.3}s",
                    timeout.as_secs_f64(),
                    interval.as_secs_f64()
                )
            }
            ValidationError::Retries(retries) => {
                write!(
                    f,
                    "retries {} must be between 0 and {}",
                    retries,
                    super::MAX_RETRIES
                )
            }
            ValidationError::TlsConfig(msg) => write!(f, "invalid TLS configuration: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Why a single probe failed.
#[derive(Debug)]
pub enum MonitorFailed {
    /// Connect, TLS handshake or send failed.
    Socket(SocketError),

    /// Receiving stopped (error or deadline) before the pattern matched.
    /// `response` is everything received so far.
    NoMatch { cause: SocketError, response: String },

    /// The peer closed the connection before the pattern matched.
    RemoteClosed { response: String },

    /// The script did not finish within the timeout.
    ScriptTimeout(Duration),

    /// The script could not be started.
    ScriptSpawn { path: String, error: io::Error },

    /// The script exited unsuccessfully. `code` is `None` when it was
    /// terminated by a signal.
    ScriptExit { code: Option<i32>, stderr: String },

    /// The script succeeded but its output did not match.
    ScriptOutputMismatch { pattern: String, stdout: String },
}

impl MonitorFailed {
    /// Check if this failure is a deadline or script timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            MonitorFailed::Socket(e) | MonitorFailed::NoMatch { cause: e, .. } => e.is_timeout(),
            MonitorFailed::ScriptTimeout(_) => true,
            _ => false,
        }
    }

    /// Check if any data was received before the failure.
    pub fn has_partial_response(&self) -> bool {
        match self {
            MonitorFailed::NoMatch { response, .. } | MonitorFailed::RemoteClosed { response } => {
                !response.is_empty()
            }
            _ => false,
        }
    }

    /// Short label for metrics and logs.
    pub fn message(&self) -> &'static str {
        match self {
            MonitorFailed::Socket(e) => match e {
                SocketError::TlsHandshake { .. } => "TLS handshake failed",
                SocketError::Send { .. } => "Send failed",
                SocketError::Timeout { .. } => "Timeout",
                _ => "Connect failed",
            },
            MonitorFailed::NoMatch { .. } => "Pattern not matched",
            MonitorFailed::RemoteClosed { .. } => "Remote closed",
            MonitorFailed::ScriptTimeout(_) => "Script timeout",
            MonitorFailed::ScriptSpawn { .. } => "Script execution error",
            MonitorFailed::ScriptExit { .. } => "Script failed",
            MonitorFailed::ScriptOutputMismatch { .. } => "Script output mismatch",
        }
    }
}

/// First [`MAX_RESPONSE_SHOWN`] characters of a response.
fn shown(response: &str) -> &str {
    match response.char_indices().nth(MAX_RESPONSE_SHOWN) {
        Some((idx, _)) => &response[..idx],
        None => response,
    }
}

impl fmt::Display for MonitorFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorFailed::Socket(e) => write!(f, "{}", e),
            MonitorFailed::NoMatch { cause, response } if response.is_empty() => {
                write!(f, "got {}, no data received from the peer", cause)
            }
            MonitorFailed::NoMatch { cause, response } => {
                write!(
                    f,
                    "failed to match the regexp within the timeout, got {}, response(up to {} chars): {}",
                    cause,
                    MAX_RESPONSE_SHOWN,
                    shown(response)
                )
            }
            MonitorFailed::RemoteClosed { response } if response.is_empty() => {
                write!(f, "remote closed the connection, no data received from the peer")
            }
            MonitorFailed::RemoteClosed { response } => {
                write!(
                    f,
                    "remote closed the connection, failed to match the regexp in the response(up to {} chars): {}",
                    MAX_RESPONSE_SHOWN,
                    shown(response)
                )
            }
            MonitorFailed::ScriptTimeout(after) => {
                write!(f, "external script timed out after {} seconds", after.as_secs_f64())
            }
            MonitorFailed::ScriptSpawn { path, error } => {
                write!(f, "external script {} failed with error: {}", path, error)
            }
            MonitorFailed::ScriptExit { code: Some(code), stderr } => {
                write!(f, "external script failed with exit code {}: stderr={}", code, stderr)
            }
            MonitorFailed::ScriptExit { code: None, stderr } => {
                write!(f, "external script terminated by signal: stderr={}", stderr)
            }
            MonitorFailed::ScriptOutputMismatch { pattern, .. } => {
                write!(f, "failed to match regexp \"{}\" in script output", pattern)
            }
        }
    }
}

impl std::error::Error for MonitorFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorFailed::Socket(e) | MonitorFailed::NoMatch { cause: e, .. } => Some(e),
            MonitorFailed::ScriptSpawn { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<SocketError> for MonitorFailed {
    fn from(e: SocketError) -> Self {
        MonitorFailed::Socket(e)
    }
}
