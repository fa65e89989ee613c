//! Tier-aware start protocol: explicit states and legal transition guards.
//!
//! Starting a processor on a specific tier can be rejected by the service
//! when the workload needs more capacity. The protocol reacts to that
//! rejection with at most one retry on the tier the service suggested, and
//! otherwise falls back to an untiered start.
//!
//! ```text
//! Requested → Resolved                       tiered start accepted
//! Requested → Rejected → Retrying → Resolved retry on the suggested tier accepted
//! Requested → Rejected → Fallback            no distinct suggestion
//! Retrying  → Fallback                       retry also failed
//! Requested → Fallback                       no tier requested, or tiered start unsupported
//! Requested → Failed                         any other failure
//! ```
//!
//! `Retrying` is only reachable from `Rejected`, which is only reachable from
//! `Requested`, so a run can never retry twice. The machine does no I/O: the
//! caller performs the request named by [`StartProtocol::next_step`] and
//! feeds the outcome back through [`StartProtocol::record`].

use crate::suggestion::parse_tier_suggestion;
use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartState {
    /// Tiered start about to be (or being) attempted.
    Requested,
    /// Tiered start refused with a capacity-validation error.
    Rejected,
    /// Single retry on the suggested tier.
    Retrying,
    /// A tiered start succeeded. Terminal.
    Resolved,
    /// Hand over to the untiered start request. Terminal.
    Fallback,
    /// Non-validation failure. Terminal.
    Failed,
}

impl StartState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Fallback | Self::Failed)
    }
}

impl fmt::Display for StartState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "Requested"),
            Self::Rejected => write!(f, "Rejected"),
            Self::Retrying => write!(f, "Retrying"),
            Self::Resolved => write!(f, "Resolved"),
            Self::Fallback => write!(f, "Fallback"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

fn is_legal_transition(from: StartState, to: StartState) -> bool {
    use StartState::*;

    matches!(
        (from, to),
        (Requested, Resolved)
            | (Requested, Rejected)
            | (Requested, Fallback)
            | (Requested, Failed)
            | (Rejected, Retrying)
            | (Rejected, Fallback)
            | (Retrying, Resolved)
            | (Retrying, Fallback)
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: StartState,
    pub to: StartState,
    /// Milliseconds since the protocol run began.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IllegalTransition {
    pub from: StartState,
    pub to: StartState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal start transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Outcome of one tiered start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The service accepted the tier.
    Accepted,
    /// Capacity-validation failure (HTTP 400) with the response body.
    Rejected { body: String },
    /// The tiered endpoint does not exist for this deployment.
    Unsupported { status: u16 },
    /// Any other failure.
    Failed {
        message: String,
        status: Option<u16>,
    },
}

impl AttemptOutcome {
    /// State this outcome leads to from `Requested`.
    pub fn target_state(&self) -> StartState {
        match self {
            Self::Accepted => StartState::Resolved,
            Self::Rejected { .. } => StartState::Rejected,
            Self::Unsupported { .. } => StartState::Fallback,
            Self::Failed { .. } => StartState::Failed,
        }
    }
}

/// What the caller should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    StartWithTier(Tier),
    StartUntiered,
    Done,
}

/// Drives one tier-aware start.
pub struct StartProtocol {
    current: StartState,
    requested: Option<Tier>,
    retry_tier: Option<Tier>,
    resolved_tier: Option<Tier>,
    failure: Option<(String, Option<u16>)>,
    retries: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StartProtocol {
    /// Begin a run. Without a requested tier the run goes straight to
    /// `Fallback`.
    pub fn new(requested: Option<Tier>) -> Self {
        let mut protocol = Self {
            current: StartState::Requested,
            requested,
            retry_tier: None,
            resolved_tier: None,
            failure: None,
            retries: 0,
            created_at: Instant::now(),
            transitions: Vec::new(),
        };
        if requested.is_none() {
            protocol.force(StartState::Fallback, "no tier requested");
        }
        protocol
    }

    pub fn state(&self) -> StartState {
        self.current
    }

    pub fn requested(&self) -> Option<Tier> {
        self.requested
    }

    /// Tier the service suggested, when a retry was made.
    pub fn retry_tier(&self) -> Option<Tier> {
        self.retry_tier
    }

    /// Tier the processor was started on, once `Resolved`.
    pub fn resolved_tier(&self) -> Option<Tier> {
        self.resolved_tier
    }

    /// Requested tier, when the resolved tier differs from it.
    pub fn upgraded_from(&self) -> Option<Tier> {
        match (self.requested, self.resolved_tier) {
            (Some(requested), Some(resolved)) if requested != resolved => Some(requested),
            _ => None,
        }
    }

    /// Message and HTTP status of a `Failed` run.
    pub fn failure(&self) -> Option<(&str, Option<u16>)> {
        self.failure.as_ref().map(|(m, s)| (m.as_str(), *s))
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Why the run ended in `Fallback`, if it did.
    pub fn fallback_reason(&self) -> Option<&str> {
        if self.current != StartState::Fallback {
            return None;
        }
        self.transitions.last().and_then(|t| t.reason.as_deref())
    }

    /// The request the caller should issue now.
    pub fn next_step(&self) -> NextStep {
        match self.current {
            StartState::Requested => match self.requested {
                Some(tier) => NextStep::StartWithTier(tier),
                None => NextStep::StartUntiered,
            },
            StartState::Retrying => match self.retry_tier {
                Some(tier) => NextStep::StartWithTier(tier),
                None => NextStep::StartUntiered,
            },
            StartState::Fallback => NextStep::StartUntiered,
            StartState::Rejected | StartState::Resolved | StartState::Failed => NextStep::Done,
        }
    }

    /// Feed back the outcome of the request named by `next_step`.
    pub fn record(&mut self, outcome: AttemptOutcome) -> Result<(), IllegalTransition> {
        match (self.current, outcome) {
            (StartState::Requested, AttemptOutcome::Accepted) => {
                self.resolved_tier = self.requested;
                self.advance(StartState::Resolved, None)
            }
            (StartState::Requested, AttemptOutcome::Rejected { body }) => {
                self.advance(StartState::Rejected, Some("capacity validation failed"))?;
                let suggestion = parse_tier_suggestion(&body).map(|s| s.tier);
                match suggestion {
                    Some(tier) if Some(tier) != self.requested => {
                        self.retry_tier = Some(tier);
                        self.retries += 1;
                        let reason = format!("service suggests {tier}");
                        self.advance(StartState::Retrying, Some(&reason))
                    }
                    Some(tier) => {
                        let reason = format!("service suggests the requested tier {tier}");
                        self.advance(StartState::Fallback, Some(&reason))
                    }
                    None => self.advance(StartState::Fallback, Some("no tier suggestion in error")),
                }
            }
            (StartState::Requested, AttemptOutcome::Unsupported { status }) => {
                let reason = format!("tiered start unsupported (HTTP {status})");
                self.advance(StartState::Fallback, Some(&reason))
            }
            (StartState::Requested, AttemptOutcome::Failed { message, status }) => {
                self.failure = Some((message.clone(), status));
                self.advance(StartState::Failed, Some(&message))
            }
            (StartState::Retrying, AttemptOutcome::Accepted) => {
                self.resolved_tier = self.retry_tier;
                self.advance(StartState::Resolved, Some("retry accepted"))
            }
            (StartState::Retrying, _) => {
                let reason = match self.retry_tier {
                    Some(tier) => format!("retry with {tier} also failed"),
                    None => "retry failed".to_string(),
                };
                self.advance(StartState::Fallback, Some(&reason))
            }
            (from, outcome) => Err(IllegalTransition {
                from,
                to: outcome.target_state(),
            }),
        }
    }

    fn advance(&mut self, to: StartState, reason: Option<&str>) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }
        self.force(to, reason.unwrap_or_default());
        Ok(())
    }

    fn force(&mut self, to: StartState, reason: &str) {
        let record = TransitionRecord {
            from: self.current,
            to,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: (!reason.is_empty()).then(|| reason.to_string()),
        };

        tracing::debug!(from = %self.current, to = %to, reason, "Start protocol transition");

        self.transitions.push(record);
        self.current = to;
    }

    /// One-line history, e.g. `Requested → Rejected → Retrying → Resolved (SP30)`.
    pub fn summary(&self) -> String {
        let mut states = vec![StartState::Requested.to_string()];
        states.extend(self.transitions.iter().map(|t| t.to.to_string()));
        match self.resolved_tier {
            Some(tier) => format!("{} ({tier})", states.join(" → ")),
            None => states.join(" → "),
        }
    }
}
