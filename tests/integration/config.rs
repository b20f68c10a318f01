//! Monitors built from JSON definitions.

use std::time::Duration;

use health_probe::config::{ConfigError, MonitorConfig};
use health_probe::monitor::ValidationError;

use crate::helpers::*;

/// A TCP definition with payload and pattern probes a live peer.
#[tokio::test]
async fn test_tcp_definition_round_trip() {
    static REPLY: &[&[u8]] = &[b"+PONG\r\n"];
    let port = chunked_server(REPLY, Duration::from_millis(10)).await;

    let config = MonitorConfig::from_json(&format!(
        r#"{{"type": "tcp", "port": {}, "send_string": "PING\r\n", "match_re": "^\\+pong", "interval": 5, "timeout": 0.5, "retries": 1}}"#,
        port
    ))
    .unwrap();

    let monitor = config.build().unwrap();
    assert_eq!(monitor.name(), "tcp");
    assert_eq!(monitor.interval(), Duration::from_secs(5));
    assert_eq!(monitor.timeout(), Duration::from_millis(500));
    assert_eq!(monitor.retries(), 1);

    monitor.run("127.0.0.1").await.unwrap();
}

/// Schedule bounds are enforced when the definition is built.
#[test]
fn test_schedule_is_validated() {
    let cases = [
        (r#"{"type": "tcp", "port": 80, "timeout": 6}"#, "timeout"),
        (r#"{"type": "tcp", "port": 80, "interval": 2, "timeout": 3}"#, "timeout"),
        (r#"{"type": "tcp", "port": 80, "interval": 0.5}"#, "interval"),
        (r#"{"type": "tcp", "port": 80, "retries": 9}"#, "retries"),
        (r#"{"type": "tcp", "port": 0}"#, "port"),
    ];

    for (document, param) in cases {
        let err = MonitorConfig::from_json(document)
            .unwrap()
            .build()
            .unwrap_err();
        match err {
            ConfigError::Validation(ref e) => assert_eq!(e.param(), param, "{}", document),
            ref other => panic!("Expected validation error for {}, got {:?}", document, other),
        }
    }
}

/// An invalid regular expression never reaches a probe.
#[test]
fn test_bad_pattern_is_rejected() {
    let err = MonitorConfig::from_json(r#"{"type": "tcp", "port": 80, "match_re": "(unclosed"}"#)
        .unwrap()
        .build()
        .unwrap_err();

    assert!(matches!(
        err,
        ConfigError::Validation(ValidationError::PatternInvalid { .. })
    ));
}
