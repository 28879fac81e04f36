//! Common infrastructure for on-box Junos automation scripts.
//!
//! - [`shell`]: shell command execution with safe quoting
//! - [`netconf`]: NETCONF 1.0 session over a child process' stdio
//! - [`syslog`]: fire-and-forget audit sinks and syslog priorities
//! - [`xml`]: escaping and element text extraction for the NETCONF boundary
//! - [`error`]: error types shared by the above
//!
//! # Architecture
//!
//! An event script is started by the event daemon once per matching event:
//!
//! 1. Read the trigger event from the script input document
//! 2. Open a NETCONF session to the management daemon
//! 3. Query operational state and committed configuration
//! 4. Load and commit a configuration change
//! 5. Report through syslog; there is no caller to return a value to

pub mod error;
pub mod netconf;
pub mod shell;
pub mod syslog;
pub mod xml;

pub use error::{ScriptError, ScriptResult};
pub use netconf::{NetconfSession, RpcError, RpcReply, SessionConfig};
pub use syslog::{AuditSink, LoggerSink, MemorySink, SyslogPriority};
