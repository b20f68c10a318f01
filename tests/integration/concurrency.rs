//! One monitor instance probing many destinations at once.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use health_probe::monitor::{Monitor, MonitorFailed, TcpMonitor};
use health_probe::observe::{Observed, ProbeHook};
use tokio::io::AsyncWriteExt;

use crate::helpers::*;

#[derive(Default)]
struct Outcomes(Mutex<Vec<(String, bool)>>);

impl ProbeHook for Outcomes {
    fn on_result(
        &self,
        _monitor: &str,
        dst: &str,
        result: Result<(), &MonitorFailed>,
        _elapsed: Duration,
    ) {
        self.0.lock().unwrap().push((dst.to_string(), result.is_ok()));
    }
}

/// Healthy and unhealthy peers on the same port do not affect each other.
#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_destinations_are_independent() {
    let healthy = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = healthy.local_addr().unwrap().port();
    let unhealthy = tokio::net::TcpListener::bind(("127.0.0.2", port))
        .await
        .unwrap();

    serve_on(healthy, |mut stream| async move {
        let _ = stream.write_all(b"STATUS green\n").await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    });
    serve_on(unhealthy, |mut stream| async move {
        let _ = stream.write_all(b"STATUS red\n").await;
        let _ = stream.shutdown().await;
    });

    let hook = Arc::new(Outcomes::default());
    let monitor: Arc<dyn Monitor> = Arc::new(Observed::new(
        TcpMonitor::builder(port as i64)
            .match_re("green")
            .params(quick(2000))
            .build()
            .unwrap(),
        hook.clone(),
    ));

    let mut tasks = Vec::new();
    for round in 0..8 {
        let dst = if round % 2 == 0 { "127.0.0.1" } else { "127.0.0.2" };
        let monitor = Arc::clone(&monitor);
        tasks.push(tokio::spawn(async move { (dst, monitor.run(dst).await) }));
    }

    for task in tasks {
        let (dst, result) = task.await.unwrap();
        match dst {
            "127.0.0.1" => assert!(result.is_ok(), "{:?}", result),
            _ => {
                let err = result.unwrap_err();
                assert!(matches!(err, MonitorFailed::RemoteClosed { .. }));
                assert!(err.to_string().contains("STATUS red"));
            }
        }
    }

    let seen = hook.0.lock().unwrap();
    assert_eq!(seen.len(), 8);
    assert!(seen
        .iter()
        .all(|(dst, ok)| *ok == (dst.as_str() == "127.0.0.1")));
}

/// Many concurrent probes against one peer all succeed.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_monitor_under_load() {
    let port = banner_then_close(b"SSH-2.0-OpenSSH_9.6\r\n").await;
    let monitor = Arc::new(
        TcpMonitor::builder(port as i64)
            .match_re("^ssh-2\\.0-")
            .build()
            .unwrap(),
    );

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let monitor = Arc::clone(&monitor);
            tokio::spawn(async move { monitor.run("127.0.0.1").await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }
}
