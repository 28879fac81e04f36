//! Shell command execution for on-box scripts.
//!
//! Junos runs event scripts on a FreeBSD userland, so the helpers here
//! go through `/bin/sh -c` and rely on [`shellquote`] for every value that
//! originates from the device or the operator.
//!
//! ```ignore
//! use junos_script_common::shell::{self, LOGGER_CMD, shellquote};
//!
//! let cmd = format!("{} -p local5.warning {}", LOGGER_CMD, shellquote(message));
//! shell::exec_or_throw(&cmd).await?;
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{ScriptError, ScriptResult};

/// Interpreter used for command strings.
pub const SH_CMD: &str = "/bin/sh";

/// Junos operational CLI.
pub const CLI_CMD: &str = "/usr/sbin/cli";

/// Syslog submission utility.
pub const LOGGER_CMD: &str = "/usr/bin/logger";

/// Characters with special meaning inside double quotes: $, `, ", \ and newline.
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Wraps `s` in double quotes, escaping everything the shell would expand.
///
/// ```
/// use junos_script_common::shell::shellquote;
///
/// assert_eq!(shellquote("ae3"), "\"ae3\"");
/// assert_eq!(shellquote("cost $5"), "\"cost \\$5\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Exit code, `-1` when the process was killed by a signal.
    pub exit_code: i32,
    /// Trimmed stdout.
    pub stdout: String,
    /// Trimmed stderr.
    pub stderr: String,
}

impl ExecResult {
    /// Returns true if the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout and stderr joined for error reporting.
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Runs `cmd` through `/bin/sh -c` and captures its output.
///
/// A non-zero exit is reported in the [`ExecResult`], not as an error;
/// only a failure to spawn the shell is an `Err`.
pub async fn exec(cmd: &str) -> ScriptResult<ExecResult> {
    tracing::debug!(command = %cmd, "Executing shell command");

    let output = Command::new(SH_CMD)
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ScriptError::ShellExec {
            command: cmd.to_string(),
            source: e,
        })?;

    let result = ExecResult {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    };

    if !result.success() {
        tracing::warn!(
            command = %cmd,
            exit_code = result.exit_code,
            stderr = %result.stderr,
            "Command failed"
        );
    }

    Ok(result)
}

/// Runs `cmd` and turns a non-zero exit into [`ScriptError::ShellCommandFailed`].
pub async fn exec_or_throw(cmd: &str) -> ScriptResult<String> {
    let result = exec(cmd).await?;
    if result.success() {
        Ok(result.stdout)
    } else {
        Err(ScriptError::ShellCommandFailed {
            command: cmd.to_string(),
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }
}
