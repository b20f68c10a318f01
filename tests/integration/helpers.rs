//! Test helpers and utilities

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use health_probe::MonitorParams;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::rustls::{self, ServerConfig};
use tokio_rustls::TlsAcceptor;

/// Schedule with a short timeout; the interval stays above any
/// allowed timeout.
pub fn quick(timeout_ms: u64) -> MonitorParams {
    MonitorParams::new(
        Duration::from_secs(10),
        Duration::from_millis(timeout_ms),
        0,
    )
    .expect("valid test params")
}

/// Accept connections on `listener` forever, one task per connection.
pub fn serve_on<F, Fut>(listener: TcpListener, handler: F)
where
    F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(handler(stream));
        }
    });
}

/// Start a loopback server and return its port.
pub async fn serve<F, Fut>(handler: F) -> u16
where
    F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let port = listener.local_addr().unwrap().port();
    serve_on(listener, handler);
    port
}

/// Server that writes `chunks` with `gap` between them, then holds the
/// connection open for a while.
pub async fn chunked_server(chunks: &'static [&'static [u8]], gap: Duration) -> u16 {
    serve(move |mut stream| async move {
        for chunk in chunks {
            if stream.write_all(chunk).await.is_err() {
                return;
            }
            tokio::time::sleep(gap).await;
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
    })
    .await
}

/// Server that writes `banner` and closes.
pub async fn banner_then_close(banner: &'static [u8]) -> u16 {
    serve(move |mut stream| async move {
        let _ = stream.write_all(banner).await;
        let _ = stream.shutdown().await;
    })
    .await
}

/// Server that accepts and never writes.
pub async fn silent_server() -> u16 {
    serve(|stream| async move {
        let _stream = stream;
        tokio::time::sleep(Duration::from_secs(30)).await;
    })
    .await
}

/// Port that is very likely closed.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// A throwaway CA and a leaf certificate for 127.0.0.1 signed by it.
pub struct TestPki {
    pub acceptor: TlsAcceptor,
    _dir: tempfile::TempDir,
    pub ca_file: PathBuf,
}

impl TestPki {
    pub fn new() -> Self {
        let ca_key = KeyPair::generate().expect("CA key");
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).expect("CA params");
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "health_probe test CA");
        let ca_cert = ca_params.self_signed(&ca_key).expect("CA cert");

        let leaf_key = KeyPair::generate().expect("leaf key");
        let leaf_params =
            CertificateParams::new(vec!["127.0.0.1".to_string()]).expect("leaf params");
        let leaf_cert = leaf_params
            .signed_by(&leaf_key, &ca_cert, &ca_key)
            .expect("leaf cert");

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .expect("protocol versions")
            .with_no_client_auth()
            .with_single_cert(
                vec![leaf_cert.der().clone()],
                PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(leaf_key.serialize_der())),
            )
            .expect("server config");

        let dir = tempfile::tempdir().expect("tempdir");
        let ca_file = dir.path().join("ca.pem");
        std::fs::write(&ca_file, ca_cert.pem()).expect("write CA file");

        Self {
            acceptor: TlsAcceptor::from(Arc::new(config)),
            _dir: dir,
            ca_file,
        }
    }

    /// Start a TLS server that answers every handshake with `banner`.
    pub async fn serve(&self, banner: &'static [u8]) -> u16 {
        self.serve_with(banner, Duration::from_secs(5)).await
    }

    /// Start a TLS server that writes `banner`, waits `hold`, then drops
    /// the connection without sending `close_notify`.
    pub async fn serve_with(&self, banner: &'static [u8], hold: Duration) -> u16 {
        let acceptor = self.acceptor.clone();
        serve(move |stream| {
            let acceptor = acceptor.clone();
            async move {
                if let Ok(mut tls) = acceptor.accept(stream).await {
                    let _ = tls.write_all(banner).await;
                    let _ = tls.flush().await;
                    tokio::time::sleep(hold).await;
                }
            }
        })
        .await
    }
}

/// Address helper for assertions.
pub fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}
