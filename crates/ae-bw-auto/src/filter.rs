//! Decides whether an AE is managed by this handler.

use std::fmt;

use crate::config::RunConfig;
use crate::device::InterfaceSnapshot;

/// Where the matched description came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionSource {
    Unit0,
    Ifd,
}

impl fmt::Display for DescriptionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptionSource::Unit0 => write!(f, "unit 0"),
            DescriptionSource::Ifd => write!(f, "IFD"),
        }
    }
}

/// Why an interface was left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeReason {
    /// Neither unit 0 nor the IFD carries a description.
    NoDescription,
    /// The description does not match the configured regex.
    NoMatch { description: String },
}

impl fmt::Display for ScopeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeReason::NoDescription => write!(f, "no description found"),
            ScopeReason::NoMatch { description } => {
                write!(f, "description '{}' does not match", description)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeDecision {
    Proceed {
        description: String,
        source: DescriptionSource,
    },
    OutOfScope(ScopeReason),
    /// More than one unit 0 description; refuse to act.
    Ambiguous { count: usize },
}

impl ScopeDecision {
    pub fn is_proceed(&self) -> bool {
        matches!(self, ScopeDecision::Proceed { .. })
    }
}

/// Picks the description to test and matches it against the run's regex.
///
/// Unit 0 wins; the IFD description is consulted only when unit 0 has none.
pub fn evaluate(snapshot: &InterfaceSnapshot, config: &RunConfig) -> ScopeDecision {
    let (description, source) = match snapshot.unit0_descriptions.as_slice() {
        [] => match snapshot.ifd_descriptions.first() {
            Some(description) => (description, DescriptionSource::Ifd),
            None => return ScopeDecision::OutOfScope(ScopeReason::NoDescription),
        },
        [description] => (description, DescriptionSource::Unit0),
        many => return ScopeDecision::Ambiguous { count: many.len() },
    };

    if config.matches_description(description) {
        ScopeDecision::Proceed {
            description: description.clone(),
            source,
        }
    } else {
        ScopeDecision::OutOfScope(ScopeReason::NoMatch {
            description: description.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pattern: &str) -> RunConfig {
        RunConfig::new(false, 1, "bw_community_", pattern).unwrap()
    }

    fn snapshot(unit0: &[&str], ifd: &[&str]) -> InterfaceSnapshot {
        InterfaceSnapshot {
            name: "ae3".to_string(),
            raw_speed: Some("10Gbps".to_string()),
            unit0_descriptions: unit0.iter().map(|s| s.to_string()).collect(),
            ifd_descriptions: ifd.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_unit0_match() {
        let decision = evaluate(&snapshot(&["prod-uplink-1"], &["lab-test"]), &config(".*prod.*"));
        assert_eq!(
            decision,
            ScopeDecision::Proceed {
                description: "prod-uplink-1".to_string(),
                source: DescriptionSource::Unit0,
            }
        );
        assert!(decision.is_proceed());
    }

    #[test]
    fn test_no_match() {
        assert_eq!(
            evaluate(&snapshot(&["lab-test"], &[]), &config(".*prod.*")),
            ScopeDecision::OutOfScope(ScopeReason::NoMatch {
                description: "lab-test".to_string()
            })
        );
    }

    #[test]
    fn test_falls_back_to_ifd() {
        assert_eq!(
            evaluate(&snapshot(&[], &["prod-uplink-1"]), &config(".*prod.*")),
            ScopeDecision::Proceed {
                description: "prod-uplink-1".to_string(),
                source: DescriptionSource::Ifd,
            }
        );
    }

    #[test]
    fn test_unit0_shadows_ifd() {
        let decision = evaluate(&snapshot(&["lab-test"], &["prod-uplink-1"]), &config(".*prod.*"));
        assert!(!decision.is_proceed());
    }

    #[test]
    fn test_no_description() {
        assert_eq!(
            evaluate(&snapshot(&[], &[]), &config(".*")),
            ScopeDecision::OutOfScope(ScopeReason::NoDescription)
        );
    }

    #[test]
    fn test_ambiguous_unit0() {
        assert_eq!(
            evaluate(&snapshot(&["prod-a", "prod-b"], &["prod"]), &config(".*prod.*")),
            ScopeDecision::Ambiguous { count: 2 }
        );
    }
}
