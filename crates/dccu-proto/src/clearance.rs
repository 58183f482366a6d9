//! Clearance levels.
//!
//! Clearance is a total order over four tiers:
//! `DELTA(1) < GAMMA(2) < BETA(3) < ALPHA(4)`. The same order gates both which
//! rows a viewer may read and whether the viewer may write at all.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A clearance tier.
///
/// Variants are declared lowest first so the derived `Ord` matches
/// [`ClearanceLevel::rank`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClearanceLevel {
    /// Lowest tier, assumed for viewers without a session.
    #[default]
    Delta,
    /// Second tier.
    Gamma,
    /// Third tier.
    Beta,
    /// Highest tier, the only one allowed to modify data.
    Alpha,
}

impl ClearanceLevel {
    /// All levels, lowest first.
    pub const ALL: [ClearanceLevel; 4] = [
        ClearanceLevel::Delta,
        ClearanceLevel::Gamma,
        ClearanceLevel::Beta,
        ClearanceLevel::Alpha,
    ];

    /// Numeric position in the order, from 1 (DELTA) to 4 (ALPHA).
    pub fn rank(self) -> u8 {
        match self {
            ClearanceLevel::Delta => 1,
            ClearanceLevel::Gamma => 2,
            ClearanceLevel::Beta => 3,
            ClearanceLevel::Alpha => 4,
        }
    }

    /// Wire name of the level.
    pub fn as_str(self) -> &'static str {
        match self {
            ClearanceLevel::Delta => "DELTA",
            ClearanceLevel::Gamma => "GAMMA",
            ClearanceLevel::Beta => "BETA",
            ClearanceLevel::Alpha => "ALPHA",
        }
    }

    /// Parse an exact wire name. Unlike `FromStr`, this is case-sensitive,
    /// matching how the backend stores levels.
    pub fn from_wire(s: &str) -> Option<Self> {
        ClearanceLevel::ALL.into_iter().find(|l| l.as_str() == s)
    }

    /// Whether a viewer at this level may see a row at `row_level`.
    pub fn dominates(self, row_level: ClearanceLevel) -> bool {
        row_level.rank() <= self.rank()
    }
}

impl fmt::Display for ClearanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClearanceLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DELTA" => Ok(ClearanceLevel::Delta),
            "GAMMA" => Ok(ClearanceLevel::Gamma),
            "BETA" => Ok(ClearanceLevel::Beta),
            "ALPHA" => Ok(ClearanceLevel::Alpha),
            _ => Err(Error::UnknownClearance(s.to_string())),
        }
    }
}
