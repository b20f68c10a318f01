//! Monitor definitions.
//!
//! A definition is plain data; [`MonitorConfig::build`] validates it and
//! produces a ready monitor. Definitions come from a JSON document (as
//! embedded in a larger topology file) or from environment variables.
//!
//! ```json
//! {"type": "tcp", "port": 443, "use_tls": true, "match_re": "^SSH-", "timeout": 2.5}
//! {"type": "external", "script_path": "/usr/local/bin/check-db", "match_re": "^OK$"}
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::parse::{env_bool, env_duration, env_opt, env_or, env_parse};
use super::ConfigError;
use crate::monitor::{ExternalScript, Monitor, MonitorParams, TcpMonitor};
use crate::socket::TlsOptions;

/// Scheduling fields shared by every monitor type. Seconds, fractional allowed.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval: f64,
    pub timeout: f64,
    pub retries: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let params = MonitorParams::default();
        Self {
            interval: params.interval().as_secs_f64(),
            timeout: params.timeout().as_secs_f64(),
            retries: params.retries(),
        }
    }
}

impl ScheduleConfig {
    fn params(&self) -> Result<MonitorParams, ConfigError> {
        Ok(MonitorParams::from_secs_f64(self.interval, self.timeout, self.retries)?)
    }
}

/// TCP monitor definition.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TcpConfig {
    pub port: i64,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    #[serde(default)]
    pub send_string: Option<String>,
    #[serde(default)]
    pub match_re: Option<String>,
    #[serde(flatten)]
    pub schedule: ScheduleConfig,
}

fn default_verify_tls() -> bool {
    true
}

/// External script monitor definition.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ExternalConfig {
    pub script_path: String,
    #[serde(default)]
    pub match_re: Option<String>,
    #[serde(flatten)]
    pub schedule: ScheduleConfig,
}

/// Any monitor definition, tagged by `type`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorConfig {
    Tcp(TcpConfig),
    #[serde(alias = "external_script")]
    External(ExternalConfig),
}

impl MonitorConfig {
    /// Parse a JSON definition.
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Load a definition from environment variables.
    ///
    /// `PROBE_TYPE` selects `tcp` (default) or `external`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = MonitorParams::default();
        let schedule = ScheduleConfig {
            interval: env_duration("PROBE_INTERVAL", defaults.interval())?.as_secs_f64(),
            timeout: env_duration("PROBE_TIMEOUT", defaults.timeout())?.as_secs_f64(),
            retries: env_parse("PROBE_RETRIES", defaults.retries())?,
        };

        match env_or("PROBE_TYPE", "tcp").to_lowercase().as_str() {
            "tcp" => {
                let port = env_opt("PROBE_PORT").ok_or_else(|| ConfigError::Missing {
                    key: "PROBE_PORT".into(),
                })?;
                let port = port.parse().map_err(|e: std::num::ParseIntError| ConfigError::Parse {
                    key: "PROBE_PORT".into(),
                    value: port.clone(),
                    error: e.to_string(),
                })?;

                Ok(MonitorConfig::Tcp(TcpConfig {
                    port,
                    use_tls: env_bool("PROBE_TLS", false),
                    verify_tls: env_bool("PROBE_TLS_VERIFY", true),
                    ca_file: env_opt("PROBE_TLS_CA_FILE").map(PathBuf::from),
                    send_string: env_opt("PROBE_SEND").map(|s| unescape(&s)),
                    match_re: env_opt("PROBE_MATCH"),
                    schedule,
                }))
            }
            "external" | "external_script" => {
                let script_path = env_opt("PROBE_SCRIPT").ok_or_else(|| ConfigError::Missing {
                    key: "PROBE_SCRIPT".into(),
                })?;

                Ok(MonitorConfig::External(ExternalConfig {
                    script_path,
                    match_re: env_opt("PROBE_MATCH"),
                    schedule,
                }))
            }
            other => Err(ConfigError::Invalid {
                key: "PROBE_TYPE".into(),
                message: format!("unknown monitor type '{}', expected: tcp, external", other),
            }),
        }
    }

    /// Monitor type name.
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorConfig::Tcp(_) => "tcp",
            MonitorConfig::External(_) => "external_script",
        }
    }

    /// Configured probe timeout.
    pub fn timeout(&self) -> Option<Duration> {
        let schedule = match self {
            MonitorConfig::Tcp(c) => &c.schedule,
            MonitorConfig::External(c) => &c.schedule,
        };
        crate::monitor::secs(schedule.timeout)
    }

    /// Validate the definition and build the monitor.
    pub fn build(&self) -> Result<Arc<dyn Monitor>, ConfigError> {
        match self {
            MonitorConfig::Tcp(c) => {
                let mut builder = TcpMonitor::builder(c.port).params(c.schedule.params()?);
                if c.use_tls {
                    builder = builder.tls(TlsOptions {
                        verify: c.verify_tls,
                        ca_file: c.ca_file.clone(),
                    });
                }
                if let Some(ref send) = c.send_string {
                    builder = builder.send_string(send.clone());
                }
                if let Some(ref pattern) = c.match_re {
                    builder = builder.match_re(pattern.clone());
                }
                Ok(Arc::new(builder.build()?))
            }
            MonitorConfig::External(c) => Ok(Arc::new(ExternalScript::new(
                c.script_path.clone(),
                c.match_re.as_deref(),
                c.schedule.params()?,
            )?)),
        }
    }
}

/// Expand `\r`, `\n`, `\t` and `\\` so payloads like `HEAD / HTTP/1.0\r\n\r\n`
/// can be written in a single environment variable.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
