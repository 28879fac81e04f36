//! Settings file support
//!
//! Deployment knobs that are not event-script arguments live in an
//! optional TOML file next to the script. Every field has a default, so a
//! missing file is not an error.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use junos_script_common::netconf::SessionConfig;
use junos_script_common::shell::{CLI_CMD, LOGGER_CMD};
use junos_script_common::SyslogPriority;

use crate::error::{HandlerError, HandlerResult};
use crate::reconciler::CommitPolicy;

/// Default settings location in the event script directory.
pub const DEFAULT_SETTINGS_PATH: &str = "/var/db/scripts/event/monitor_ae_bw_auto.toml";

/// Name used in audit lines and as the syslog tag.
pub const SCRIPT_NAME: &str = "monitor_ae_bw_auto.py";

/// NETCONF transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetconfSettings {
    /// Program providing NETCONF on stdio
    #[serde(default = "default_netconf_command")]
    pub command: String,

    /// Arguments for `command`
    #[serde(default = "default_netconf_args")]
    pub args: Vec<String>,

    /// Per-RPC deadline in seconds
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
}

/// Audit channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyslogSettings {
    /// Numeric priority or `facility.severity`
    #[serde(default = "default_syslog_priority")]
    pub priority: String,

    /// Path of the `logger` utility
    #[serde(default = "default_logger")]
    pub logger: String,

    /// Script name used as syslog tag and audit line prefix
    #[serde(default = "default_tag")]
    pub tag: String,
}

/// Commit behaviour when the database is contended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSettings {
    /// Repeat load+commit on lock conflicts, up to `-wait` attempts
    #[serde(default)]
    pub retry_on_contention: bool,

    /// Pause between attempts in milliseconds
    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,
}

/// Complete handler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerSettings {
    /// Pause after connecting so the AE speed has settled, in milliseconds
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    #[serde(default)]
    pub netconf: NetconfSettings,

    #[serde(default)]
    pub syslog: SyslogSettings,

    #[serde(default)]
    pub commit: CommitSettings,
}

fn default_netconf_command() -> String {
    CLI_CMD.to_string()
}

fn default_netconf_args() -> Vec<String> {
    SessionConfig::default().args
}

fn default_rpc_timeout() -> u64 {
    30
}

fn default_syslog_priority() -> String {
    SyslogPriority::LOCAL5_WARNING.value().to_string()
}

fn default_logger() -> String {
    LOGGER_CMD.to_string()
}

fn default_tag() -> String {
    SCRIPT_NAME.to_string()
}

fn default_backoff() -> u64 {
    1000
}

fn default_settle_delay() -> u64 {
    1000
}

impl Default for NetconfSettings {
    fn default() -> Self {
        Self {
            command: default_netconf_command(),
            args: default_netconf_args(),
            rpc_timeout_secs: default_rpc_timeout(),
        }
    }
}

impl Default for SyslogSettings {
    fn default() -> Self {
        Self {
            priority: default_syslog_priority(),
            logger: default_logger(),
            tag: default_tag(),
        }
    }
}

impl Default for CommitSettings {
    fn default() -> Self {
        Self {
            retry_on_contention: false,
            backoff_ms: default_backoff(),
        }
    }
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            netconf: NetconfSettings::default(),
            syslog: SyslogSettings::default(),
            commit: CommitSettings::default(),
        }
    }
}

impl HandlerSettings {
    /// Load settings from file, falling back to defaults if the file is absent
    pub fn load_or_default(path: impl AsRef<Path>) -> HandlerResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let settings: Self = toml::from_str(&content).map_err(|e| {
                    HandlerError::Settings(format!(
                        "Failed to parse settings file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                settings.validate()?;
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Settings file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(HandlerError::Settings(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn validate(&self) -> HandlerResult<()> {
        if self.netconf.command.is_empty() {
            return Err(HandlerError::Settings(
                "netconf.command must not be empty".to_string(),
            ));
        }
        if self.netconf.rpc_timeout_secs == 0 {
            return Err(HandlerError::Settings(
                "netconf.rpc_timeout_secs must be > 0".to_string(),
            ));
        }
        self.syslog_priority()?;
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            program: self.netconf.command.clone(),
            args: self.netconf.args.clone(),
            rpc_timeout: Duration::from_secs(self.netconf.rpc_timeout_secs),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn syslog_priority(&self) -> HandlerResult<SyslogPriority> {
        self.syslog
            .priority
            .parse::<SyslogPriority>()
            .map_err(|e: String| HandlerError::Settings(format!("syslog.priority: {}", e)))
    }

    pub fn commit_policy(&self) -> CommitPolicy {
        if self.commit.retry_on_contention {
            CommitPolicy::RetryOnContention {
                backoff: Duration::from_millis(self.commit.backoff_ms),
            }
        } else {
            CommitPolicy::SingleAttempt
        }
    }
}
