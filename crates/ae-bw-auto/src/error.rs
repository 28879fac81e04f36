//! Error types for the bandwidth-community handler

use junos_script_common::ScriptError;
use thiserror::Error;

/// Fatal conditions that stop a run.
///
/// Expected early exits (interface out of scope, ambiguous description)
/// are reported through [`crate::RunOutcome`], not here.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The trigger message carries no `Bandwidth ... > aeN index` token.
    #[error("Could not retrieve AE name from event: {message}")]
    EventParse { message: String },

    /// An invocation parameter failed validation.
    #[error("Invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    /// The settings file could not be read or parsed.
    #[error("Settings error: {0}")]
    Settings(String),

    /// Transport-level failure talking to the device.
    #[error("Device error: {0}")]
    Device(#[from] ScriptError),

    /// The device answered, but not with something we can read.
    #[error("Malformed {rpc} reply: {message}")]
    MalformedReply { rpc: String, message: String },

    /// `routing-options autonomous-system` is absent from the committed configuration.
    #[error("Autonomous system number is not configured")]
    MissingAsn,

    /// The fragment was refused by the candidate database.
    #[error("Configuration load rejected: {message}")]
    LoadRejected { message: String },

    /// The commit was refused, usually because another writer holds the database.
    #[error("Commit rejected: {message}")]
    CommitRejected { message: String },

    #[error("Unable to unlock configuration: {message}")]
    UnlockFailed { message: String },
}

/// Result type for handler operations
pub type HandlerResult<T> = std::result::Result<T, HandlerError>;

impl HandlerError {
    pub fn event_parse(message: impl Into<String>) -> Self {
        Self::EventParse {
            message: message.into(),
        }
    }

    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn malformed_reply(rpc: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedReply {
            rpc: rpc.into(),
            message: message.into(),
        }
    }

    /// True for commit failures caused by another writer holding the database.
    pub fn is_contention(&self) -> bool {
        match self {
            HandlerError::CommitRejected { message } => {
                let message = message.to_ascii_lowercase();
                message.contains("lock")
                    || message.contains("in use")
                    || message.contains("database modified")
            }
            _ => false,
        }
    }
}
