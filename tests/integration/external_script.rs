//! External script monitor driven through its JSON definition.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use health_probe::monitor::MonitorFailed;
use health_probe::MonitorConfig;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn definition(script: &Path, extra: &str) -> MonitorConfig {
    MonitorConfig::from_json(&format!(
        r#"{{"type": "external", "script_path": "{}", "timeout": 1{}}}"#,
        script.display(),
        extra
    ))
    .unwrap()
}

/// Destination is passed as the only argument; output is matched trimmed.
#[tokio::test]
async fn test_destination_is_argument() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "echo.sh", r#"echo "  alive $1  ""#);

    let monitor = definition(&script, r#", "match_re": "^alive 10\\.1\\.2\\.3$""#)
        .build()
        .unwrap();

    monitor.run("10.1.2.3").await.unwrap();
    assert!(matches!(
        monitor.run("10.1.2.4").await.unwrap_err(),
        MonitorFailed::ScriptOutputMismatch { .. }
    ));
}

/// Non-zero exit carries the code and trimmed stderr.
#[tokio::test]
async fn test_exit_code_and_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "fail.sh", "echo 'db down' >&2\nexit 3");

    let monitor = definition(&script, "").build().unwrap();

    match monitor.run("10.0.0.1").await.unwrap_err() {
        MonitorFailed::ScriptExit { code, stderr } => {
            assert_eq!(code, Some(3));
            assert_eq!(stderr, "db down");
        }
        other => panic!("Expected script exit, got {:?}", other),
    }
}

/// A hanging script is abandoned at the timeout.
#[tokio::test]
async fn test_hanging_script_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "hang.sh", "sleep 10");

    let monitor = MonitorConfig::from_json(&format!(
        r#"{{"type": "external", "script_path": "{}", "timeout": 0.3}}"#,
        script.display()
    ))
    .unwrap()
    .build()
    .unwrap();

    let start = std::time::Instant::now();
    let err = monitor.run("10.0.0.1").await.unwrap_err();

    assert!(err.is_timeout());
    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(err.to_string().contains("timed out after 0.3 seconds"), "{}", err);
}
