//! Invocation parameters and the per-run configuration derived from them.
//!
//! The event daemon passes script arguments Junos-style (`-debug enable
//! -wait 10 ...`); [`normalize_junos_args`] rewrites the known names to
//! the `--name` form before clap sees them.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config_file::DEFAULT_SETTINGS_PATH;
use crate::error::{HandlerError, HandlerResult};

/// Prefix used when the configured one is rejected.
pub const DEFAULT_COMMUNITY_PREFIX: &str = "bw_community_";

/// Value of `-debug` that enables the audit trail.
pub const DEBUG_ENABLE: &str = "enable";

/// Long option names accepted with a single leading dash.
pub const JUNOS_ARG_NAMES: &[&str] = &[
    "debug",
    "wait",
    "bgp_community_prefix",
    "ae_intf_regex",
    "config",
    "event-message",
    "event-facility",
];

static PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_]{2,}$").expect("Invalid regex pattern"));

/// Keeps a BGP link-bandwidth community in sync with an AE interface's speed
#[derive(Parser, Debug, Clone)]
#[command(name = "monitor_ae_bw_auto")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// `enable` turns on the per-step audit trail
    #[arg(long = "debug")]
    pub debug: String,

    /// Load/commit attempt budget
    #[arg(long = "wait", value_parser = clap::value_parser!(u32).range(1..))]
    pub wait: u32,

    /// Community name prefix; the interface name is appended
    #[arg(long = "bgp_community_prefix")]
    pub bgp_community_prefix: String,

    /// Regex matched against the start of the unit 0 or IFD description
    #[arg(long = "ae_intf_regex", allow_hyphen_values = true)]
    pub ae_intf_regex: String,

    /// Handler settings file (TOML)
    #[arg(long = "config", default_value = DEFAULT_SETTINGS_PATH)]
    pub config: PathBuf,

    /// Trigger message for manual runs; otherwise read from stdin
    #[arg(long = "event-message", allow_hyphen_values = true)]
    pub event_message: Option<String>,

    /// Trigger facility for manual runs
    #[arg(long = "event-facility", default_value = "")]
    pub event_facility: String,
}

/// Rewrites `-name` to `--name` for every name in [`JUNOS_ARG_NAMES`].
pub fn normalize_junos_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            let rewritten = arg.to_str().and_then(|s| {
                let name = s.strip_prefix('-')?;
                if JUNOS_ARG_NAMES.contains(&name) {
                    Some(OsString::from(format!("-{}", s)))
                } else {
                    None
                }
            });
            rewritten.unwrap_or(arg)
        })
        .collect()
}

/// Returns `prefix` if it is at least two letters or underscores.
pub fn validate_prefix(prefix: &str) -> Option<&str> {
    if PREFIX_RE.is_match(prefix) {
        Some(prefix)
    } else {
        None
    }
}

/// Operator parameters for one run. Built once, passed by reference.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub debug: bool,
    /// Upper bound of the load/commit attempt counter.
    pub max_attempts: u32,
    pub community_prefix: String,
    /// True when the requested prefix was rejected and the default used.
    pub prefix_defaulted: bool,
    /// The description regex as supplied.
    pub description_pattern: String,
    description_regex: Regex,
}

impl RunConfig {
    pub fn new(
        debug: bool,
        max_attempts: u32,
        community_prefix: &str,
        description_pattern: &str,
    ) -> HandlerResult<Self> {
        if max_attempts == 0 {
            return Err(HandlerError::invalid_argument(
                "wait",
                "must be a positive integer",
            ));
        }

        let (community_prefix, prefix_defaulted) = match validate_prefix(community_prefix) {
            Some(prefix) => (prefix.to_string(), false),
            None => (DEFAULT_COMMUNITY_PREFIX.to_string(), true),
        };

        // Anchored at the start only, like a prefix match.
        // Checked on its own so an unbalanced pattern cannot close the group.
        Regex::new(description_pattern)
            .map_err(|e| HandlerError::invalid_argument("ae_intf_regex", e.to_string()))?;
        let description_regex = Regex::new(&format!("^(?:{})", description_pattern))
            .map_err(|e| HandlerError::invalid_argument("ae_intf_regex", e.to_string()))?;

        Ok(Self {
            debug,
            max_attempts,
            community_prefix,
            prefix_defaulted,
            description_pattern: description_pattern.to_string(),
            description_regex,
        })
    }

    pub fn from_args(args: &Args) -> HandlerResult<Self> {
        Self::new(
            args.debug == DEBUG_ENABLE,
            args.wait,
            &args.bgp_community_prefix,
            &args.ae_intf_regex,
        )
    }

    /// True if the description regex matches at the start of `description`.
    pub fn matches_description(&self, description: &str) -> bool {
        self.description_regex.is_match(description)
    }
}
