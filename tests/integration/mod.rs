//! Integration tests for health_probe
//!
//! Every test brings up its own loopback listener (plain or TLS) or writes
//! its own script, so nothing external needs to be running.
//!
//! Run with: cargo test --test integration

mod helpers;

mod concurrency;
mod config;
#[cfg(unix)]
mod external_script;
mod tls_monitor;
