//! Stream Processing capacity tiers
//!
//! Tiers are totally ordered by compute capacity. Every comparison goes
//! through the derived `Ord`, never through the tier's string form
//! (`"SP10" < "SP2"` lexically, which is wrong).

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Capacity class a stream processor runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "SP2")]
    Sp2,
    #[serde(rename = "SP5")]
    Sp5,
    #[serde(rename = "SP10")]
    Sp10,
    #[serde(rename = "SP30")]
    Sp30,
    #[serde(rename = "SP50")]
    Sp50,
}

impl Tier {
    /// All tiers, smallest first.
    pub const ALL: [Tier; 5] = [Tier::Sp2, Tier::Sp5, Tier::Sp10, Tier::Sp30, Tier::Sp50];

    /// Tier used when no analysis could be made.
    pub const FALLBACK: Tier = Tier::Sp10;

    /// Wire name used by the Atlas API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sp2 => "SP2",
            Self::Sp5 => "SP5",
            Self::Sp10 => "SP10",
            Self::Sp30 => "SP30",
            Self::Sp50 => "SP50",
        }
    }

    /// Position in the capacity ladder (0 = smallest).
    pub fn ordinal(&self) -> usize {
        *self as usize
    }

    /// Tier implied by a pipeline complexity score.
    pub fn for_complexity(score: u32) -> Self {
        match score {
            s if s >= 80 => Self::Sp50,
            s if s >= 50 => Self::Sp30,
            s if s >= 25 => Self::Sp10,
            s if s >= 10 => Self::Sp5,
            _ => Self::Sp2,
        }
    }

    /// Minimum tier for the summed extra parallelism of a pipeline.
    pub fn for_total_parallelism(total: u32) -> Self {
        match total {
            0 => Self::Sp2,
            1 => Self::Sp5,
            2..=8 => Self::Sp10,
            9..=48 => Self::Sp30,
            _ => Self::Sp50,
        }
    }

    /// Tier the API expects for a rejected stage parallelism request.
    ///
    /// These brackets come from the service's validation errors and are
    /// deliberately different from [`Tier::for_total_parallelism`].
    pub fn for_requested_parallelism(requested: u32) -> Self {
        match requested {
            r if r > 8 => Self::Sp50,
            r if r > 4 => Self::Sp30,
            r if r > 2 => Self::Sp10,
            _ => Self::Sp5,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known tier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tier '{0}' (expected one of SP2, SP5, SP10, SP30, SP50)")]
pub struct UnknownTier(pub String);

impl FromStr for Tier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Tier::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| UnknownTier(s.to_string()))
    }
}
