//! Tier recommendation for Atlas Stream Processing
//!
//! This library provides:
//! - A deterministic complexity analyzer mapping a processor pipeline to a
//!   capacity tier (SP2..SP50), with a structured explanation
//! - Parsing of tier suggestions out of Atlas validation errors
//! - The tier-aware start protocol as an explicit state machine
//! - Statistics, trends and recommendations over profiling samples
//!
//! Nothing here performs network I/O; the `atlas-sp` crate drives these
//! pieces against the Atlas Admin API.

pub mod analyzer;
pub mod definition;
pub mod error;
pub mod pipeline;
pub mod profile;
pub mod start_protocol;
pub mod suggestion;
pub mod tier;

pub use analyzer::{
    AnalysisBreakdown, AnalysisReport, AnalysisResult, ComplexityAnalyzer, ComplexityFactor,
    ParallelismDetail, Reasoning, ReasoningReport, TierDriver, TierRecommendation,
};
pub use definition::{definition_path, ProcessorDefinition};
pub use error::{AnalysisError, ProfileError};
pub use pipeline::{DeclaredParallelism, Pipeline, PipelineStage};
pub use profile::{
    analyze_profile, MetricStats, ProcessorProfile, ProcessorSample, ProfileAnalysis,
    ProfileSample, ProfileSummary, ProfileThresholds, SampleEntry, Trend,
};
pub use start_protocol::{
    AttemptOutcome, IllegalTransition, NextStep, StartProtocol, StartState, TransitionRecord,
};
pub use suggestion::{parse_tier_suggestion, suggested_tier, SuggestionSource, TierSuggestion};
pub use tier::{Tier, UnknownTier};
