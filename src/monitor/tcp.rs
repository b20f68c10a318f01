//! TCP monitor with optional TLS, payload and streamed response matching.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use tokio_rustls::rustls::ClientConfig;
use tracing::{debug, error};

use super::{Monitor, MonitorFailed, MonitorParams, ValidationError};
use crate::pattern::Pattern;
use crate::socket::{DeadlineSocket, TlsOptions};

/// Maximum allowed length of the send payload, in characters.
pub const MAX_SEND_LEN: usize = 256;

/// TCP health monitor.
///
/// Each probe walks the same sequence under one shared deadline:
///
/// ```text
/// Connecting ─► TLS handshake? ─► Send? ─┬─► (no pattern) Done
///                                        └─► Reading ⟲ ─► Matched | Failed
/// ```
///
/// When a pattern is set, it is searched in everything received so far
/// after every read, so a match may span several reads.
#[derive(Clone)]
pub struct TcpMonitor {
    port: u16,
    tls: Option<Tls>,
    send: Option<Payload>,
    pattern: Option<Pattern>,
    params: MonitorParams,
}

#[derive(Clone)]
struct Tls {
    options: TlsOptions,
    config: Arc<ClientConfig>,
}

#[derive(Clone)]
struct Payload {
    text: String,
    bytes: Arc<[u8]>,
}

impl TcpMonitor {
    /// Start building a monitor for `port`.
    pub fn builder(port: i64) -> TcpMonitorBuilder {
        TcpMonitorBuilder {
            port,
            tls: None,
            send: None,
            pattern: None,
            params: MonitorParams::default(),
        }
    }

    /// Destination port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// TLS settings, if TLS is enabled.
    pub fn tls(&self) -> Option<&TlsOptions> {
        self.tls.as_ref().map(|t| &t.options)
    }

    /// Payload sent after connecting.
    pub fn send_string(&self) -> Option<&str> {
        self.send.as_ref().map(|p| p.text.as_str())
    }

    /// Pattern the response must contain.
    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    /// Read until the pattern matches, the peer closes, or the budget runs out.
    async fn read_until_match(
        &self,
        sock: &mut DeadlineSocket,
        pattern: &Pattern,
    ) -> Result<(), MonitorFailed> {
        let mut received = Received::default();

        loop {
            let chunk = match sock.receive().await {
                Ok(chunk) => chunk,
                Err(cause) => {
                    return Err(MonitorFailed::NoMatch {
                        cause,
                        response: received.into_response(),
                    });
                }
            };

            if chunk.is_empty() {
                return Err(MonitorFailed::RemoteClosed {
                    response: received.into_response(),
                });
            }

            received.push(&chunk);

            if pattern.matches(received.as_str()) {
                debug!(
                    peer = %sock.peer_addr(),
                    bytes = received.len,
                    "response matched"
                );
                return Ok(());
            }
        }
    }
}

/// Response text decoded as it arrives.
///
/// Invalid bytes become U+FFFD. An incomplete sequence at the end of a read
/// is held back until the next read completes it.
#[derive(Default)]
struct Received {
    text: String,
    pending: BytesMut,
    len: usize,
}

impl Received {
    fn push(&mut self, chunk: &[u8]) {
        self.len += chunk.len();
        self.pending.extend_from_slice(chunk);

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = self.pending.split_to(e.valid_up_to());
                    self.text.push_str(&String::from_utf8_lossy(&valid));
                    match e.error_len() {
                        Some(invalid) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.advance(invalid);
                        }
                        None => return,
                    }
                }
            }
        }
    }

    fn as_str(&self) -> &str {
        &self.text
    }

    /// Everything received, with a truncated trailing sequence replaced.
    fn into_response(mut self) -> String {
        if !self.pending.is_empty() {
            self.text.push_str(&String::from_utf8_lossy(&self.pending));
        }
        self.text
    }
}

impl std::fmt::Debug for TcpMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpMonitor")
            .field("port", &self.port)
            .field("tls", &self.tls())
            .field("send_string", &self.send_string())
            .field("pattern", &self.pattern)
            .field("params", &self.params)
            .finish()
    }
}

#[async_trait]
impl Monitor for TcpMonitor {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn params(&self) -> &MonitorParams {
        &self.params
    }

    async fn run(&self, dst: &str) -> Result<(), MonitorFailed> {
        let mut sock = DeadlineSocket::new(dst, self.port, self.params.timeout())?;

        sock.connect().await?;

        if let Some(ref tls) = self.tls {
            sock.wrap_tls(Arc::clone(&tls.config)).await?;
        }

        if let Some(ref payload) = self.send {
            sock.send(&payload.bytes).await?;
        }

        let Some(ref pattern) = self.pattern else {
            sock.close();
            return Ok(());
        };

        // On failure the peer is already gone or the socket was released,
        // so it is dropped without a shutdown
        self.read_until_match(&mut sock, pattern).await?;
        sock.close();
        Ok(())
    }
}

/// Builder for [`TcpMonitor`]. All validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct TcpMonitorBuilder {
    port: i64,
    tls: Option<TlsOptions>,
    send: Option<String>,
    pattern: Option<String>,
    params: MonitorParams,
}

impl TcpMonitorBuilder {
    /// Enable TLS with the given options.
    pub fn tls(mut self, options: TlsOptions) -> Self {
        self.tls = Some(options);
        self
    }

    /// Payload to send after connecting (and after the TLS handshake).
    pub fn send_string(mut self, payload: impl Into<String>) -> Self {
        self.send = Some(payload.into());
        self
    }

    /// Pattern to search for in the response.
    pub fn match_re(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Scheduling parameters.
    pub fn params(mut self, params: MonitorParams) -> Self {
        self.params = params;
        self
    }

    /// Validate everything and build the monitor.
    pub fn build(self) -> Result<TcpMonitor, ValidationError> {
        let port = u16::try_from(self.port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                let err = ValidationError::Port(self.port);
                error!("{}", err);
                err
            })?;

        let pattern = Pattern::optional(self.pattern.as_deref())?;

        let send = match self.send {
            Some(text) if text.chars().count() > MAX_SEND_LEN => {
                let err = ValidationError::SendTooLong {
                    payload: text,
                    max: MAX_SEND_LEN,
                };
                error!("{}", err);
                return Err(err);
            }
            Some(text) => Some(Payload {
                bytes: Arc::from(text.as_bytes()),
                text,
            }),
            None => None,
        };

        let tls = match self.tls {
            Some(options) => {
                let config = options.client_config().map_err(|e| {
                    let err = ValidationError::TlsConfig(e.to_string());
                    error!("{}", err);
                    err
                })?;
                Some(Tls { options, config })
            }
            None => None,
        };

        Ok(TcpMonitor {
            port,
            tls,
            send,
            pattern,
            params: self.params,
        })
    }
}
