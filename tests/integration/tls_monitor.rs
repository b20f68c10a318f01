//! TLS monitor against a loopback server with a throwaway CA.

use std::time::Duration;

use health_probe::monitor::{Monitor, MonitorFailed, TcpMonitor};
use health_probe::socket::{SocketError, SocketOp, TlsOptions};

use crate::helpers::*;

/// Verification disabled: any certificate is accepted.
#[tokio::test]
async fn test_insecure_accepts_unknown_ca() {
    let pki = TestPki::new();
    let port = pki.serve(b"OK tls\r\n").await;

    let monitor = TcpMonitor::builder(port as i64)
        .tls(TlsOptions::insecure())
        .match_re("^ok tls")
        .params(quick(2000))
        .build()
        .unwrap();

    monitor.run("127.0.0.1").await.unwrap();
}

/// Verification enabled against bundled roots only: the handshake fails.
#[tokio::test]
async fn test_verified_rejects_unknown_ca() {
    let pki = TestPki::new();
    let port = pki.serve(b"OK tls\r\n").await;

    let monitor = TcpMonitor::builder(port as i64)
        .tls(TlsOptions::verified())
        .match_re("^OK")
        .params(quick(2000))
        .build()
        .unwrap();

    let err = monitor.run("127.0.0.1").await.unwrap_err();
    match err {
        MonitorFailed::Socket(ref e) => {
            assert!(e.is_tls(), "{:?}", e);
            assert!(!e.is_timeout());
            assert!(matches!(e, SocketError::TlsHandshake { .. }));
        }
        ref other => panic!("Expected TLS handshake error, got {:?}", other),
    }
    assert_eq!(err.message(), "TLS handshake failed");
}

/// Verification enabled with the test CA added: the IP SAN matches.
#[tokio::test]
async fn test_verified_with_ca_file() {
    let pki = TestPki::new();
    let port = pki.serve(b"OK tls\r\n").await;

    let monitor = TcpMonitor::builder(port as i64)
        .tls(TlsOptions::verified().with_ca_file(&pki.ca_file))
        .match_re("^OK")
        .params(quick(2000))
        .build()
        .unwrap();

    monitor.run("127.0.0.1").await.unwrap();
}

/// A TLS peer that drops the connection without `close_notify` is a
/// remote close, not a receive failure.
#[tokio::test]
async fn test_close_without_close_notify_is_remote_close() {
    let pki = TestPki::new();
    let port = pki
        .serve_with(b"220 banner\r\n", Duration::from_millis(50))
        .await;

    let monitor = TcpMonitor::builder(port as i64)
        .tls(TlsOptions::insecure())
        .match_re("^SSH-")
        .params(quick(2000))
        .build()
        .unwrap();

    let err = monitor.run("127.0.0.1").await.unwrap_err();
    match err {
        MonitorFailed::RemoteClosed { ref response } => assert_eq!(response, "220 banner\r\n"),
        ref other => panic!("Expected remote close, got {:?}", other),
    }
    assert!(!err.is_timeout());
    assert!(err.to_string().contains("remote closed"), "{}", err);
}

/// A peer that never speaks TLS burns the budget in the handshake.
#[tokio::test]
async fn test_handshake_timeout() {
    let port = silent_server().await;

    let monitor = TcpMonitor::builder(port as i64)
        .tls(TlsOptions::insecure())
        .params(quick(200))
        .build()
        .unwrap();

    match monitor.run("127.0.0.1").await.unwrap_err() {
        MonitorFailed::Socket(e) => {
            assert!(e.is_timeout());
            assert_eq!(e.op(), SocketOp::TlsHandshake);
        }
        other => panic!("Expected handshake timeout, got {:?}", other),
    }
}

/// A missing CA file is rejected when the monitor is built.
#[test]
fn test_missing_ca_file_fails_build() {
    let err = TcpMonitor::builder(443)
        .tls(TlsOptions::verified().with_ca_file("/nonexistent/ca.pem"))
        .build()
        .unwrap_err();

    assert_eq!(err.param(), "tls");
}
