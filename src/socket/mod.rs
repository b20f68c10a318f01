//! Deadline-budgeted TCP/TLS socket.
//!
//! A [`DeadlineSocket`] owns exactly one connection for the duration of one
//! probe. Every blocking operation runs under the same shrinking
//! [`Deadline`], so connect + handshake + send + any number of receives
//! together never take longer than the configured timeout.
//!
//! ```text
//!   new(ip, port, timeout)
//!        │
//!   connect() ──► wrap_tls(config)? ──► send(bytes)? ──► receive()* ──► close()
//!        └──────────────── one shared, decaying budget ────────────────┘
//! ```
//!
//! Any failed operation releases the socket before returning the error.

mod deadline;
mod error;
mod tls;

pub use deadline::Deadline;
pub use error::{SocketError, SocketOp};
pub use tls::TlsOptions;

use std::net::{IpAddr, Shutdown, SocketAddr, SocketAddrV6};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::ClientConfig;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

/// Maximum number of bytes returned by one [`DeadlineSocket::receive`].
pub const RECV_BUFF_SIZE: usize = 8192;

enum Stream {
    /// Socket created, not yet connected.
    Unconnected(TcpSocket),
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Stream {
    fn tcp(&self) -> Option<&TcpStream> {
        match self {
            Stream::Unconnected(_) => None,
            Stream::Plain(stream) => Some(stream),
            Stream::Tls(stream) => Some(stream.get_ref().0),
        }
    }
}

/// One TCP connection, optionally TLS-wrapped, with a shared I/O budget.
pub struct DeadlineSocket {
    addr: SocketAddr,
    /// `None` once the socket has been released after an error.
    stream: Option<Stream>,
    deadline: Deadline,
}

impl DeadlineSocket {
    /// Create a socket for `ip:port`.
    ///
    /// The address family follows the textual form of `ip`: a colon means
    /// IPv6, anything else IPv4. A link-local IPv6 address may carry a
    /// numeric zone (`fe80::1%2`); interface names are not resolved.
    pub fn new(ip: &str, port: u16, timeout: Duration) -> Result<Self, SocketError> {
        let domain = if ip.contains(':') {
            Domain::IPV6
        } else {
            Domain::IPV4
        };

        let addr = parse_destination(ip, port).map_err(|error| SocketError::InvalidAddress {
            destination: ip.to_string(),
            error,
        })?;

        let socket = Self::open(domain).map_err(|source| SocketError::Connect { addr, source })?;

        Ok(Self {
            addr,
            stream: Some(Stream::Unconnected(socket)),
            deadline: Deadline::new(timeout),
        })
    }

    fn open(domain: Domain) -> std::io::Result<TcpSocket> {
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nonblocking(true)?;
        socket.set_nodelay(true)?;
        Ok(TcpSocket::from_std_stream(socket.into()))
    }

    /// Destination address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Budget left for the next operation.
    pub fn remaining(&self) -> Duration {
        self.deadline.remaining()
    }

    /// Whether the connection is TLS-wrapped.
    pub fn is_tls(&self) -> bool {
        matches!(self.stream, Some(Stream::Tls(_)))
    }

    /// Whether the socket has been released after a failed operation.
    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }

    /// Connect to the destination.
    pub async fn connect(&mut self) -> Result<(), SocketError> {
        let socket = match self.stream.take() {
            Some(Stream::Unconnected(socket)) => socket,
            _ => return Err(self.misuse(SocketOp::Connect, "socket already connected")),
        };

        let budget = self.deadline.remaining();
        let addr = self.addr;
        match self.deadline.run(socket.connect(addr)).await {
            Ok(Ok(stream)) => {
                debug!(%addr, remaining_ms = self.remaining().as_millis() as u64, "connected");
                self.stream = Some(Stream::Plain(stream));
                Ok(())
            }
            Ok(Err(source)) => Err(SocketError::Connect { addr, source }),
            Err(_) => Err(SocketError::Timeout {
                op: SocketOp::Connect,
                after: budget,
            }),
        }
    }

    /// Perform a TLS handshake over the connected socket.
    ///
    /// The destination IP is used as the server name.
    pub async fn wrap_tls(&mut self, config: Arc<ClientConfig>) -> Result<(), SocketError> {
        let stream = match self.stream.take() {
            Some(Stream::Plain(stream)) => stream,
            _ => {
                return Err(self.misuse(SocketOp::TlsHandshake, "socket not connected or already TLS"))
            }
        };

        let connector = TlsConnector::from(config);
        let server_name = ServerName::from(self.addr.ip());

        let budget = self.deadline.remaining();
        match self.deadline.run(connector.connect(server_name, stream)).await {
            Ok(Ok(tls)) => {
                debug!(addr = %self.addr, "TLS handshake complete");
                self.stream = Some(Stream::Tls(Box::new(tls)));
                Ok(())
            }
            Ok(Err(source)) => Err(SocketError::TlsHandshake { source }),
            Err(_) => Err(SocketError::Timeout {
                op: SocketOp::TlsHandshake,
                after: budget,
            }),
        }
    }

    /// Write the whole payload.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), SocketError> {
        let budget = self.deadline.remaining();
        let result = match self.stream.as_mut() {
            Some(Stream::Plain(stream)) => self.deadline.run(stream.write_all(payload)).await,
            Some(Stream::Tls(stream)) => {
                self.deadline
                    .run(async {
                        stream.write_all(payload).await?;
                        stream.flush().await
                    })
                    .await
            }
            _ => return Err(self.misuse(SocketOp::Send, "socket not connected")),
        };

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => {
                self.release();
                Err(SocketError::Send { source })
            }
            Err(_) => {
                self.release();
                Err(SocketError::Timeout {
                    op: SocketOp::Send,
                    after: budget,
                })
            }
        }
    }

    /// Read up to [`RECV_BUFF_SIZE`] bytes.
    ///
    /// An empty result means the peer closed the connection. Over TLS this
    /// includes a close without `close_notify`.
    pub async fn receive(&mut self) -> Result<Bytes, SocketError> {
        let mut buf = BytesMut::with_capacity(RECV_BUFF_SIZE);

        let budget = self.deadline.remaining();
        let result = match self.stream.as_mut() {
            Some(Stream::Plain(stream)) => self.deadline.run(stream.read_buf(&mut buf)).await,
            Some(Stream::Tls(stream)) => self
                .deadline
                .run(stream.read_buf(&mut buf))
                .await
                .map(|read| match read {
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                        debug!(addr = %self.addr, "TLS peer closed without close_notify");
                        Ok(0)
                    }
                    other => other,
                }),
            _ => return Err(self.misuse(SocketOp::Receive, "socket not connected")),
        };

        match result {
            Ok(Ok(_)) => Ok(buf.freeze()),
            Ok(Err(source)) => {
                self.release();
                Err(SocketError::Receive { source })
            }
            Err(_) => {
                self.release();
                Err(SocketError::Timeout {
                    op: SocketOp::Receive,
                    after: budget,
                })
            }
        }
    }

    /// Shut down both directions and close.
    ///
    /// Best effort: failures are logged, never returned.
    pub fn close(mut self) {
        if let Some(stream) = self.stream.take() {
            if let Some(tcp) = stream.tcp() {
                if let Err(e) = SockRef::from(tcp).shutdown(Shutdown::Both) {
                    warn!(
                        addr = %self.addr,
                        error = %e,
                        "Got {:?} {} when shutting down and closing the socket",
                        e.kind(),
                        e
                    );
                }
            }
        }
    }

    /// Drop the connection without an orderly shutdown.
    fn release(&mut self) {
        self.stream = None;
    }

    /// Operation called in the wrong state; the socket is released.
    fn misuse(&mut self, op: SocketOp, message: &str) -> SocketError {
        self.release();
        let source = std::io::Error::new(std::io::ErrorKind::NotConnected, message.to_string());
        match op {
            SocketOp::Connect => SocketError::Connect {
                addr: self.addr,
                source,
            },
            SocketOp::TlsHandshake => SocketError::TlsHandshake { source },
            SocketOp::Send => SocketError::Send { source },
            SocketOp::Receive => SocketError::Receive { source },
        }
    }
}

fn parse_destination(ip: &str, port: u16) -> Result<SocketAddr, String> {
    if ip.contains('%') {
        return format!("[{}]:{}", ip, port)
            .parse::<SocketAddrV6>()
            .map(SocketAddr::V6)
            .map_err(|e| format!("{} (zone must be a numeric interface index)", e));
    }
    ip.parse::<IpAddr>()
        .map(|addr| SocketAddr::new(addr, port))
        .map_err(|e| e.to_string())
}

impl std::fmt::Debug for DeadlineSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.stream {
            None => "released",
            Some(Stream::Unconnected(_)) => "unconnected",
            Some(Stream::Plain(_)) => "plain",
            Some(Stream::Tls(_)) => "tls",
        };
        f.debug_struct("DeadlineSocket")
            .field("addr", &self.addr)
            .field("state", &state)
            .field("remaining", &self.deadline.remaining())
            .finish()
    }
}
