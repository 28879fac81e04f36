//! AE speed to link-bandwidth value conversion.
//!
//! The community value is `speed_in_gbps * 1_000_000 / 8`. The result is
//! saturated at `u32::MAX` because the link-bandwidth field is 32 bits wide.

use std::fmt;

use crate::device::InterfaceSnapshot;

/// Speed reported for an AE with no active members.
pub const UNSPECIFIED_SPEED: &str = "Unspecified";

/// Unit suffix on the reported speed.
pub const SPEED_UNIT_SUFFIX: &str = "Gbps";

const UNITS_PER_GBPS: u64 = 1_000_000;
const BITS_PER_BYTE: u64 = 8;

/// Value carried in `bandwidth:<asn>:<value>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BandwidthValue(u32);

impl BandwidthValue {
    pub const ZERO: BandwidthValue = BandwidthValue(0);

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Converts a whole number of Gbps, saturating at the 32-bit limit.
    pub fn from_gbps(gbps: u64) -> Self {
        let value = gbps.saturating_mul(UNITS_PER_GBPS) / BITS_PER_BYTE;
        Self(u32::try_from(value).unwrap_or(u32::MAX))
    }

    /// Converts the textual speed field (`"10Gbps"`, `"Unspecified"`).
    ///
    /// Anything that does not reduce to a positive integer is zero.
    pub fn from_speed(raw: &str) -> Self {
        let numeral = raw
            .replace(UNSPECIFIED_SPEED, "0")
            .replace(SPEED_UNIT_SUFFIX, "");
        match numeral.trim().parse::<u64>() {
            Ok(gbps) if gbps > 0 => Self::from_gbps(gbps),
            _ => Self::ZERO,
        }
    }
}

impl fmt::Display for BandwidthValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bandwidth for the AE in `snapshot`; zero when no speed was reported.
pub fn resolve_bandwidth(snapshot: &InterfaceSnapshot) -> BandwidthValue {
    snapshot
        .raw_speed
        .as_deref()
        .map(BandwidthValue::from_speed)
        .unwrap_or(BandwidthValue::ZERO)
}
