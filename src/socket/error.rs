//! Socket operation error types.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Socket operation that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketOp {
    Connect,
    TlsHandshake,
    Send,
    Receive,
}

impl SocketOp {
    /// Short name used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            SocketOp::Connect => "connect",
            SocketOp::TlsHandshake => "TLS handshake",
            SocketOp::Send => "send",
            SocketOp::Receive => "receive",
        }
    }
}

impl fmt::Display for SocketOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by [`DeadlineSocket`](super::DeadlineSocket).
///
/// Every variant is produced after the socket has already been released.
#[derive(Debug)]
pub enum SocketError {
    /// The destination is not a literal IP address.
    InvalidAddress { destination: String, error: String },

    /// Connection refused, unreachable or another OS-level connect error.
    Connect { addr: SocketAddr, source: io::Error },

    /// TLS negotiation or certificate verification failed.
    TlsHandshake { source: io::Error },

    /// Writing the payload failed.
    Send { source: io::Error },

    /// Reading from the peer failed.
    Receive { source: io::Error },

    /// The shared deadline ran out while `op` was in progress; `after` is the
    /// budget the operation was given.
    Timeout { op: SocketOp, after: Duration },
}

impl SocketError {
    /// Operation during which the error happened.
    pub fn op(&self) -> SocketOp {
        match self {
            SocketError::InvalidAddress { .. } | SocketError::Connect { .. } => SocketOp::Connect,
            SocketError::TlsHandshake { .. } => SocketOp::TlsHandshake,
            SocketError::Send { .. } => SocketOp::Send,
            SocketError::Receive { .. } => SocketOp::Receive,
            SocketError::Timeout { op, .. } => *op,
        }
    }

    /// Check if the deadline expired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SocketError::Timeout { .. })
    }

    /// Check if this is a TLS handshake failure.
    pub fn is_tls(&self) -> bool {
        matches!(self, SocketError::TlsHandshake { .. })
            || matches!(self, SocketError::Timeout { op: SocketOp::TlsHandshake, .. })
    }

    /// Underlying OS error, if any.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            SocketError::Connect { source, .. }
            | SocketError::TlsHandshake { source }
            | SocketError::Send { source }
            | SocketError::Receive { source } => Some(source),
            SocketError::InvalidAddress { .. } | SocketError::Timeout { .. } => None,
        }
    }
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketError::InvalidAddress { destination, error } => {
                write!(f, "invalid destination address '{}': {}", destination, error)
            }
            SocketError::Connect { addr, source } => {
                write!(f, "{:?} {} during connect to {}", source.kind(), source, addr)
            }
            SocketError::TlsHandshake { source } => {
                write!(f, "TLS error: {} during TLS handshake", source)
            }
            SocketError::Send { source } => {
                write!(f, "{:?} {} during send", source.kind(), source)
            }
            SocketError::Receive { source } => {
                write!(f, "{:?} {} during receive", source.kind(), source)
            }
            SocketError::Timeout { op, after } => {
                write!(f, "timed out after {:.3}s during {}", after.as_secs_f64(), op)
            }
        }
    }
}

impl std::error::Error for SocketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SocketError::Connect { source, .. }
            | SocketError::TlsHandshake { source }
            | SocketError::Send { source }
            | SocketError::Receive { source } => Some(source),
            _ => None,
        }
    }
}
