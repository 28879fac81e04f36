//! Audit channel: one-way syslog submission.
//!
//! Scripts report to operators through syslog rather than exit codes.
//! The [`AuditSink`] trait is fire-and-forget; a sink that cannot deliver
//! a line logs the failure through `tracing` and carries on.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::shell::{self, shellquote, LOGGER_CMD};

const FACILITIES: [&str; 24] = [
    "kern", "user", "mail", "daemon", "auth", "syslog", "lpr", "news", "uucp", "cron",
    "authpriv", "ftp", "ntp", "security", "console", "cron2", "local0", "local1", "local2",
    "local3", "local4", "local5", "local6", "local7",
];

const SEVERITIES: [&str; 8] = [
    "emerg", "alert", "crit", "err", "warning", "notice", "info", "debug",
];

/// A syslog priority value (`facility * 8 + severity`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyslogPriority(u8);

impl SyslogPriority {
    /// `local5.warning`, the priority Junos event scripts conventionally use.
    pub const LOCAL5_WARNING: SyslogPriority = SyslogPriority(172);

    /// Returns `None` for values outside the 24 facilities.
    pub fn new(value: u8) -> Option<Self> {
        if usize::from(value / 8) < FACILITIES.len() {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn facility(&self) -> &'static str {
        FACILITIES[usize::from(self.0 / 8)]
    }

    pub fn severity(&self) -> &'static str {
        SEVERITIES[usize::from(self.0 % 8)]
    }
}

impl Default for SyslogPriority {
    fn default() -> Self {
        Self::LOCAL5_WARNING
    }
}

impl fmt::Display for SyslogPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.facility(), self.severity())
    }
}

impl FromStr for SyslogPriority {
    type Err = String;

    /// Accepts a numeric priority (`"172"`) or a selector (`"local5.warning"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(value) = s.parse::<u8>() {
            return Self::new(value).ok_or_else(|| format!("priority {} out of range", value));
        }
        let (facility, severity) = s
            .split_once('.')
            .ok_or_else(|| format!("invalid syslog priority '{}'", s))?;
        let facility = FACILITIES
            .iter()
            .position(|f| f.eq_ignore_ascii_case(facility))
            .ok_or_else(|| format!("unknown facility '{}'", facility))?;
        let severity = SEVERITIES
            .iter()
            .position(|v| v.eq_ignore_ascii_case(severity))
            .ok_or_else(|| format!("unknown severity '{}'", severity))?;
        // Both indices are bounded by the tables above.
        Ok(Self((facility * 8 + severity) as u8))
    }
}

/// Destination for audit lines.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Submits one line. Delivery failures are not reported to the caller.
    async fn send(&self, priority: SyslogPriority, message: &str);
}

/// Sends lines through the system `logger` utility.
#[derive(Debug, Clone)]
pub struct LoggerSink {
    logger: String,
    tag: String,
}

impl LoggerSink {
    pub fn new(logger: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            logger: logger.into(),
            tag: tag.into(),
        }
    }

    /// Shell command that submits `message` at `priority`.
    pub fn command(&self, priority: SyslogPriority, message: &str) -> String {
        format!(
            "{} -p {} -t {} -- {}",
            self.logger,
            priority,
            shellquote(&self.tag),
            shellquote(message)
        )
    }
}

impl Default for LoggerSink {
    fn default() -> Self {
        Self::new(LOGGER_CMD, "cscript")
    }
}

#[async_trait]
impl AuditSink for LoggerSink {
    async fn send(&self, priority: SyslogPriority, message: &str) {
        let cmd = self.command(priority, message);
        if let Err(e) = shell::exec_or_throw(&cmd).await {
            tracing::warn!(error = %e, "Failed to submit syslog line");
        }
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(SyslogPriority, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages in submission order.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn entries(&self) -> Vec<(SyslogPriority, String)> {
        self.lines.lock().clone()
    }

    /// True if any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|(_, m)| m.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn send(&self, priority: SyslogPriority, message: &str) {
        self.lines.lock().push((priority, message.to_string()));
    }
}
