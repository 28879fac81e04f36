//! Local autonomous-system lookup.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::device::Device;
use crate::error::{HandlerError, HandlerResult};

/// Plain (`65000`) or asdot (`1.10`) notation.
static AS_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?$").expect("Invalid regex pattern"));

/// The local AS, kept in the notation the configuration uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AsNumber(String);

impl AsNumber {
    /// Returns `None` unless `text` is a plain or asdot AS number.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if AS_NUMBER_RE.is_match(text) {
            Some(Self(text.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AsNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads the committed `routing-options autonomous-system`.
///
/// The community value is namespaced by the AS, so its absence is fatal.
pub async fn resolve_asn<D: Device + ?Sized>(device: &mut D) -> HandlerResult<AsNumber> {
    let configured = device.autonomous_system().await?;
    debug!(asn = ?configured, "Committed autonomous-system");

    match configured.as_deref().map(str::trim) {
        None | Some("") => Err(HandlerError::MissingAsn),
        Some(text) => AsNumber::parse(text).ok_or_else(|| {
            HandlerError::malformed_reply(
                "get-configuration",
                format!("unexpected autonomous-system '{}'", text),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_as_number() {
        assert_eq!(AsNumber::parse("65000").unwrap().as_str(), "65000");
        assert_eq!(AsNumber::parse(" 4200000000 ").unwrap().as_str(), "4200000000");
        assert_eq!(AsNumber::parse("1.10").unwrap().to_string(), "1.10");
        assert!(AsNumber::parse("").is_none());
        assert!(AsNumber::parse("AS65000").is_none());
        assert!(AsNumber::parse("65000 loops 2").is_none());
    }
}
