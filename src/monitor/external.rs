//! External script monitor.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error};

use super::{Monitor, MonitorFailed, MonitorParams, ValidationError};
use crate::pattern::Pattern;

/// Runs an executable with the destination as its only argument.
///
/// The probe succeeds when the script exits with status 0 within the
/// timeout and, if a pattern is set, its standard output contains a match.
/// A script still running at the timeout is killed.
#[derive(Debug, Clone)]
pub struct ExternalScript {
    script_path: String,
    pattern: Option<Pattern>,
    params: MonitorParams,
}

impl ExternalScript {
    /// Create a monitor for `script_path`.
    ///
    /// The path is not checked here; a missing script fails each probe.
    pub fn new(
        script_path: impl Into<String>,
        match_re: Option<&str>,
        params: MonitorParams,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            script_path: script_path.into(),
            pattern: Pattern::optional(match_re)?,
            params,
        })
    }

    /// Path of the executable.
    pub fn script_path(&self) -> &str {
        &self.script_path
    }

    /// Pattern the output must contain.
    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }
}

#[async_trait]
impl Monitor for ExternalScript {
    fn name(&self) -> &'static str {
        "external_script"
    }

    fn params(&self) -> &MonitorParams {
        &self.params
    }

    async fn run(&self, dst: &str) -> Result<(), MonitorFailed> {
        let child = Command::new(&self.script_path)
            .arg(dst)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                let failed = MonitorFailed::ScriptSpawn {
                    path: self.script_path.clone(),
                    error: e,
                };
                error!("{}", failed);
                failed
            })?;

        let timeout = self.params.timeout();
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                let failed = MonitorFailed::ScriptSpawn {
                    path: self.script_path.clone(),
                    error: e,
                };
                error!("{}", failed);
                return Err(failed);
            }
            Err(_) => {
                // Dropping the wait future kills the child
                let failed = MonitorFailed::ScriptTimeout(timeout);
                error!("{}", failed);
                return Err(failed);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let failed = MonitorFailed::ScriptExit {
                code: output.status.code(),
                stderr,
            };
            error!("{}", failed);
            return Err(failed);
        }

        if let Some(ref pattern) = self.pattern {
            if !pattern.matches(&stdout) {
                let failed = MonitorFailed::ScriptOutputMismatch {
                    pattern: pattern.as_str().to_string(),
                    stdout,
                };
                error!("{}", failed);
                return Err(failed);
            }
        }

        debug!(dst, script = %self.script_path, output = %stdout, "external script ran successfully");
        Ok(())
    }
}
