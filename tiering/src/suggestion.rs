//! Tier suggestions from Atlas validation errors
//!
//! When a tiered start is rejected with HTTP 400, the body usually says what
//! the workload needs, in one of two forms:
//!
//! ```text
//! ... Minimum tier for this workload: SP30 or larger ...
//! ... parallelism exceeds tier limit. Requested: 6 ...
//! ```
//!
//! Anything else reads as "no suggestion".

use crate::tier::Tier;
use regex::Regex;
use std::sync::LazyLock;

static MINIMUM_TIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Minimum tier for this workload: (SP\d+)")
        .expect("MINIMUM_TIER_PATTERN regex should compile")
});

static REQUESTED_PARALLELISM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Requested: (\d+)").expect("REQUESTED_PARALLELISM_PATTERN regex should compile")
});

/// Where a suggestion was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionSource {
    /// Explicit "Minimum tier for this workload" phrase.
    MinimumTier,
    /// Derived from the "Requested: N" parallelism figure.
    RequestedParallelism(u32),
}

/// A tier the service hinted at in an error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSuggestion {
    pub tier: Tier,
    pub source: SuggestionSource,
}

/// Extract the suggested minimum tier from an error body.
pub fn parse_tier_suggestion(error_text: &str) -> Option<TierSuggestion> {
    let explicit = MINIMUM_TIER_PATTERN
        .captures(error_text)
        .and_then(|caps| caps[1].parse::<Tier>().ok());
    if let Some(tier) = explicit {
        return Some(TierSuggestion {
            tier,
            source: SuggestionSource::MinimumTier,
        });
    }

    // The pattern only admits digits, so a failed parse is an overflow.
    let requested = REQUESTED_PARALLELISM_PATTERN
        .captures(error_text)
        .map(|caps| caps[1].parse::<u32>().unwrap_or(u32::MAX))?;
    Some(TierSuggestion {
        tier: Tier::for_requested_parallelism(requested),
        source: SuggestionSource::RequestedParallelism(requested),
    })
}

/// Convenience wrapper returning just the tier.
pub fn suggested_tier(error_text: &str) -> Option<Tier> {
    parse_tier_suggestion(error_text).map(|s| s.tier)
}
