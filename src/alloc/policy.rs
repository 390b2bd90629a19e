//! Placement policy selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Strategy for choosing the free block that satisfies a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlacementPolicy {
    /// Lowest-address free block that fits
    First,
    /// Smallest free block that fits (ties to lowest address)
    Best,
    /// Largest free block, or nothing if even that is too small
    Worst,
}

impl PlacementPolicy {
    /// Key the free index by size for best/worst fit, by address for first fit
    pub(crate) fn keys_by_size(&self) -> bool {
        matches!(self, Self::Best | Self::Worst)
    }
}

impl fmt::Display for PlacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::First => "first",
            Self::Best => "best",
            Self::Worst => "worst",
        };
        f.write_str(name)
    }
}

impl FromStr for PlacementPolicy {
    type Err = String;

    /// Accepts the trace-header codes (`1`/`2`/`3`) as well as policy names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "first" | "first-fit" => Ok(Self::First),
            "2" | "best" | "best-fit" => Ok(Self::Best),
            "3" | "worst" | "worst-fit" => Ok(Self::Worst),
            other => Err(format!("unknown placement policy: {other:?}")),
        }
    }
}
