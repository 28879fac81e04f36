//! Operator-facing audit trail.
//!
//! Lines go to the syslog sink in the format operators grep for:
//! `monitor_ae_bw_auto.py: iteration 1:DEBUG: Connection successful`.
//! The per-step trail is only sent when `-debug enable`; notifications and
//! fatal errors are always sent. Every line is mirrored to `tracing`.

use std::fmt;

use junos_script_common::{AuditSink, SyslogPriority};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Debug,
    Error,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogKind::Debug => write!(f, "DEBUG"),
            LogKind::Error => write!(f, "ERROR"),
        }
    }
}

/// Audit writer bound to one sink and one run.
#[derive(Clone, Copy)]
pub struct AuditLog<'a> {
    sink: &'a dyn AuditSink,
    priority: SyslogPriority,
    script: &'a str,
    debug: bool,
}

impl<'a> AuditLog<'a> {
    pub fn new(
        sink: &'a dyn AuditSink,
        priority: SyslogPriority,
        script: &'a str,
        debug: bool,
    ) -> Self {
        Self {
            sink,
            priority,
            script,
            debug,
        }
    }

    pub fn format_line(&self, iteration: u32, kind: LogKind, text: &str) -> String {
        format!("{}: iteration {}:{}: {}", self.script, iteration, kind, text)
    }

    /// Sends a trail line when debugging is enabled.
    pub async fn log(&self, iteration: u32, kind: LogKind, text: &str) {
        let line = self.format_line(iteration, kind, text);
        match kind {
            LogKind::Debug => tracing::debug!("{}", line),
            LogKind::Error => tracing::warn!("{}", line),
        }
        if self.debug {
            self.sink.send(self.priority, &line).await;
        }
    }

    pub async fn debug(&self, iteration: u32, text: &str) {
        self.log(iteration, LogKind::Debug, text).await;
    }

    pub async fn error(&self, iteration: u32, text: &str) {
        self.log(iteration, LogKind::Error, text).await;
    }

    /// Sends an ERROR line regardless of the debug setting.
    pub async fn error_always(&self, iteration: u32, text: &str) {
        let line = self.format_line(iteration, LogKind::Error, text);
        tracing::error!("{}", line);
        self.sink.send(self.priority, &line).await;
    }

    /// Sends `<script>: <text>` regardless of the debug setting.
    pub async fn notify(&self, text: &str) {
        let line = format!("{}: {}", self.script, text);
        tracing::info!("{}", line);
        self.sink.send(self.priority, &line).await;
    }
}

impl fmt::Debug for AuditLog<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLog")
            .field("priority", &self.priority)
            .field("script", &self.script)
            .field("debug", &self.debug)
            .finish()
    }
}
