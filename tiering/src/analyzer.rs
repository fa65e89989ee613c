//! Pipeline complexity analyzer
//!
//! Scores a processor's declared pipeline and maps it onto a capacity tier.
//! Two independent tiers are derived and the larger one wins:
//!
//! ```text
//! stages ──┬─ operator markers, Kafka, length, connections ─→ complexity_score ─→ complexity_tier
//!          └─ declared parallelism (value - 1 per stage)    ─→ total_parallelism ─→ parallelism_tier
//!
//! recommended_tier = max(complexity_tier, parallelism_tier)
//! ```
//!
//! Parallelism feeds both sides: each declared value `v > 1` adds `v - 1` to
//! `total_parallelism` and `v * 5` to the complexity score.

use crate::definition::ProcessorDefinition;
use crate::pipeline::PipelineStage;
use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use std::path::Path;

struct OperatorMarker {
    keys: &'static [&'static str],
    label: &'static str,
    points: u32,
}

/// Operator keys that make a stage expensive. A stage matching several
/// markers scores each of them.
///
/// The windowed marker also counts `$tumblingWindow`, `$hoppingWindow` and
/// `$sessionWindow`, not only `$window`, so such stages score +30 where a
/// `$window`-only check would give nothing.
const OPERATOR_MARKERS: &[OperatorMarker] = &[
    OperatorMarker {
        keys: &["$function"],
        label: "JavaScript function",
        points: 40,
    },
    OperatorMarker {
        keys: &["$window", "$tumblingWindow", "$hoppingWindow", "$sessionWindow"],
        label: "Window processing",
        points: 30,
    },
    OperatorMarker {
        keys: &["$facet"],
        label: "Facet operation",
        points: 25,
    },
    OperatorMarker {
        keys: &["$lookup"],
        label: "Lookup/join operation",
        points: 20,
    },
    OperatorMarker {
        keys: &["$group"],
        label: "Grouping operation",
        points: 15,
    },
    OperatorMarker {
        keys: &["$sort"],
        label: "Sort operation",
        points: 10,
    },
];

const KAFKA_POINTS: u32 = 15;
const PARALLELISM_POINTS_PER_UNIT: u32 = 5;

/// Stages that open a connection to an external system.
const CONNECTION_STAGES: &[&str] = &["$source", "$merge"];

/// (minimum stage count exclusive, points), highest bracket first.
const LENGTH_BRACKETS: &[(usize, u32)] = &[(8, 20), (5, 10), (3, 5)];

/// (minimum connection count exclusive, points), highest bracket first.
const CONNECTION_BRACKETS: &[(u32, u32)] = &[(4, 15), (2, 10)];

/// One scored reason behind the complexity score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityFactor {
    /// Zero-based stage index; `None` for pipeline-wide bonuses.
    pub stage: Option<usize>,
    pub description: String,
    pub points: u32,
}

impl std::fmt::Display for ComplexityFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.stage {
            Some(i) => write!(
                f,
                "Stage {}: {} (+{} complexity)",
                i + 1,
                self.description,
                self.points
            ),
            None => write!(f, "{} (+{} complexity)", self.description, self.points),
        }
    }
}

/// A stage whose declared parallelism raised the parallelism requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelismDetail {
    pub stage: usize,
    pub location: String,
    pub parallelism: u32,
    pub contribution: u32,
}

impl std::fmt::Display for ParallelismDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Stage {} ({}): parallelism={} (contributes {})",
            self.stage + 1,
            self.location,
            self.parallelism,
            self.contribution
        )
    }
}

/// Which requirement decided the final tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierDriver {
    Complexity,
    Parallelism,
}

/// Full outcome of analyzing one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub recommended_tier: Tier,
    pub complexity_score: u32,
    pub total_parallelism: u32,
    pub factors: Vec<ComplexityFactor>,
    pub parallelism_tier: Tier,
    pub complexity_tier: Tier,
    pub pipeline_stages: usize,
    pub connections_count: u32,
    pub parallelism_details: Vec<ParallelismDetail>,
    pub driver: TierDriver,
}

impl AnalysisResult {
    /// Human description of the complexity bracket.
    pub fn complexity_reason(&self) -> &'static str {
        match self.complexity_tier {
            Tier::Sp50 => "Very complex pipeline (80+ complexity points)",
            Tier::Sp30 => "Complex pipeline (50+ complexity points)",
            Tier::Sp10 => "Moderate complexity (25+ complexity points)",
            Tier::Sp5 => "Simple pipeline (10+ complexity points)",
            Tier::Sp2 => "Very simple pipeline (<10 complexity points)",
        }
    }

    /// Explain the decision, naming the decisive driver first.
    pub fn reasoning(&self) -> Reasoning {
        let (primary, secondary) = match self.driver {
            TierDriver::Complexity => (
                format!("Complexity-driven: {}", self.complexity_reason()),
                format!(
                    "Parallelism requirement: {} (total parallelism: {})",
                    self.parallelism_tier, self.total_parallelism
                ),
            ),
            TierDriver::Parallelism => (
                format!(
                    "Parallelism-driven: {} required for {} total parallelism",
                    self.parallelism_tier, self.total_parallelism
                ),
                format!(
                    "Complexity score: {} (suggests {})",
                    self.complexity_score, self.complexity_tier
                ),
            ),
        };
        Reasoning {
            primary,
            secondary,
            final_decision: format!(
                "Selected {} as the higher requirement",
                self.recommended_tier
            ),
        }
    }

    /// Compact one-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "score={} parallelism={} complexity_tier={} parallelism_tier={} → {}",
            self.complexity_score,
            self.total_parallelism,
            self.complexity_tier,
            self.parallelism_tier,
            self.recommended_tier
        )
    }
}

/// Explanation attached to a recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reasoning {
    pub primary: String,
    pub secondary: String,
    pub final_decision: String,
}

/// Score breakdown in the recommendation document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisBreakdown {
    pub total_parallelism: u32,
    pub complexity_score: u32,
    pub pipeline_stages: usize,
    pub connections_count: u32,
    pub complexity_tier: Tier,
    pub parallelism_tier: Tier,
    pub parallelism_details: Vec<String>,
    pub complexity_factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisReport {
    Breakdown(AnalysisBreakdown),
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReasoningReport {
    Detailed(Reasoning),
    Note(String),
}

/// The JSON document handed to callers: `recommended_tier`, `analysis`,
/// `reasoning`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRecommendation {
    pub recommended_tier: Tier,
    pub analysis: AnalysisReport,
    pub reasoning: ReasoningReport,
}

impl TierRecommendation {
    /// Fixed SP10 recommendation used when nothing could be analyzed.
    pub fn fallback(error: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            recommended_tier: Tier::FALLBACK,
            analysis: AnalysisReport::Error {
                error: error.into(),
            },
            reasoning: ReasoningReport::Note(note.into()),
        }
    }

    /// Error text when this is a fallback recommendation.
    pub fn error(&self) -> Option<&str> {
        match &self.analysis {
            AnalysisReport::Error { error } => Some(error),
            AnalysisReport::Breakdown(_) => None,
        }
    }
}

impl From<&AnalysisResult> for TierRecommendation {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            recommended_tier: result.recommended_tier,
            analysis: AnalysisReport::Breakdown(AnalysisBreakdown {
                total_parallelism: result.total_parallelism,
                complexity_score: result.complexity_score,
                pipeline_stages: result.pipeline_stages,
                connections_count: result.connections_count,
                complexity_tier: result.complexity_tier,
                parallelism_tier: result.parallelism_tier,
                parallelism_details: result
                    .parallelism_details
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                complexity_factors: result.factors.iter().map(ToString::to_string).collect(),
            }),
            reasoning: ReasoningReport::Detailed(result.reasoning()),
        }
    }
}

/// Stateless analyzer that maps pipelines to tiers.
pub struct ComplexityAnalyzer;

impl ComplexityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Score a pipeline and pick its tier.
    pub fn analyze(&self, pipeline: &[PipelineStage]) -> AnalysisResult {
        let mut score: u32 = 0;
        let mut total_parallelism: u32 = 0;
        let mut connections_count: u32 = 0;
        let mut factors = Vec::new();
        let mut parallelism_details = Vec::new();

        for (i, stage) in pipeline.iter().enumerate() {
            // ── Operator markers ──────────────────────────────────────────
            for marker in OPERATOR_MARKERS {
                if marker.keys.iter().any(|k| stage.contains_key(k)) {
                    score = score.saturating_add(marker.points);
                    factors.push(ComplexityFactor {
                        stage: Some(i),
                        description: marker.label.to_string(),
                        points: marker.points,
                    });
                }
            }

            // ── Connections ───────────────────────────────────────────────
            connections_count += CONNECTION_STAGES
                .iter()
                .filter(|k| stage.has_top_level(k))
                .count() as u32;

            // ── Declared parallelism ──────────────────────────────────────
            for declared in stage.declared_parallelism() {
                if declared.value <= 1 {
                    continue;
                }
                let parallelism = u32::try_from(declared.value).unwrap_or(u32::MAX);
                let contribution = parallelism - 1;
                total_parallelism = total_parallelism.saturating_add(contribution);
                score = score.saturating_add(parallelism.saturating_mul(PARALLELISM_POINTS_PER_UNIT));
                parallelism_details.push(ParallelismDetail {
                    stage: i,
                    location: declared.location,
                    parallelism,
                    contribution,
                });
            }

            // ── Kafka ─────────────────────────────────────────────────────
            if stage.mentions("kafka") {
                score = score.saturating_add(KAFKA_POINTS);
                factors.push(ComplexityFactor {
                    stage: Some(i),
                    description: "Kafka integration".to_string(),
                    points: KAFKA_POINTS,
                });
            }
        }

        let pipeline_stages = pipeline.len();
        if let Some(&(_, points)) = LENGTH_BRACKETS
            .iter()
            .find(|(min, _)| pipeline_stages > *min)
        {
            score = score.saturating_add(points);
            factors.push(ComplexityFactor {
                stage: None,
                description: format!("Pipeline length: {pipeline_stages} stages"),
                points,
            });
        }

        if let Some(&(_, points)) = CONNECTION_BRACKETS
            .iter()
            .find(|(min, _)| connections_count > *min)
        {
            score = score.saturating_add(points);
            factors.push(ComplexityFactor {
                stage: None,
                description: format!("Connection count: {connections_count}"),
                points,
            });
        }

        let complexity_tier = Tier::for_complexity(score);
        let parallelism_tier = Tier::for_total_parallelism(total_parallelism);
        let (recommended_tier, driver) = if complexity_tier.ordinal() >= parallelism_tier.ordinal()
        {
            (complexity_tier, TierDriver::Complexity)
        } else {
            (parallelism_tier, TierDriver::Parallelism)
        };

        let result = AnalysisResult {
            recommended_tier,
            complexity_score: score,
            total_parallelism,
            factors,
            parallelism_tier,
            complexity_tier,
            pipeline_stages,
            connections_count,
            parallelism_details,
            driver,
        };
        tracing::debug!(summary = %result.summary(), "Pipeline analyzed");
        result
    }

    /// Analyze a pipeline and render the recommendation document.
    pub fn recommend(&self, pipeline: &[PipelineStage]) -> TierRecommendation {
        TierRecommendation::from(&self.analyze(pipeline))
    }

    /// Analyze the definition stored at `path`.
    ///
    /// Never fails: a missing or unreadable definition yields the SP10
    /// fallback with the error text preserved.
    pub fn recommend_for_file(&self, path: &Path) -> TierRecommendation {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Processor definition not found");
            return TierRecommendation::fallback(
                "Processor file not found",
                "Default fallback for missing processor",
            );
        }
        match ProcessorDefinition::load(path) {
            Ok(definition) => self.recommend(&definition.pipeline),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Processor analysis failed");
                TierRecommendation::fallback(
                    e.to_string(),
                    "Error occurred during analysis, using default tier",
                )
            }
        }
    }
}

impl Default for ComplexityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn pipeline(stages: Vec<Value>) -> Vec<PipelineStage> {
        stages.into_iter().map(PipelineStage::new).collect()
    }

    fn analyze(stages: Vec<Value>) -> AnalysisResult {
        ComplexityAnalyzer::new().analyze(&pipeline(stages))
    }

    #[test]
    fn test_empty_pipeline_is_sp2() {
        let r = analyze(vec![]);
        assert_eq!(r.complexity_score, 0);
        assert_eq!(r.total_parallelism, 0);
        assert_eq!(r.recommended_tier, Tier::Sp2);
        assert!(r.factors.is_empty());
    }

    #[test]
    fn test_single_function_stage_is_sp10() {
        let r = analyze(vec![json!({"$addFields": {"x": {"$function": {"body": "f", "args": [], "lang": "js"}}}})]);
        assert_eq!(r.complexity_score, 40);
        assert_eq!(r.complexity_tier, Tier::Sp10);
        assert_eq!(r.recommended_tier, Tier::Sp10);
        assert_eq!(r.factors[0].to_string(), "Stage 1: JavaScript function (+40 complexity)");
    }

    #[test]
    fn test_parallelism_ten_drives_sp30() {
        let r = analyze(vec![json!({"$merge": {"into": {"coll": "out"}, "parallelism": 10}})]);
        assert_eq!(r.total_parallelism, 9);
        assert_eq!(r.complexity_score, 50);
        assert_eq!(r.parallelism_tier, Tier::Sp30);
        assert!(r.recommended_tier >= Tier::Sp30);
        assert_eq!(
            r.parallelism_details[0].to_string(),
            "Stage 1 ($merge): parallelism=10 (contributes 9)"
        );
    }

    #[test]
    fn test_parallelism_of_one_contributes_nothing() {
        let r = analyze(vec![json!({"$merge": {"parallelism": 1}}), json!({"parallelism": 0})]);
        assert_eq!(r.total_parallelism, 0);
        assert_eq!(r.complexity_score, 0);
        assert!(r.parallelism_details.is_empty());
    }

    #[test]
    fn test_length_bonus_is_not_cumulative() {
        let stages = (0..9).map(|i| json!({"$match": {"n": i}})).collect();
        let r = analyze(stages);
        assert_eq!(r.complexity_score, 20);
        assert_eq!(r.factors.len(), 1);
        assert_eq!(r.factors[0].stage, None);
        assert_eq!(r.factors[0].to_string(), "Pipeline length: 9 stages (+20 complexity)");
    }

    #[test]
    fn test_length_bracket_edges() {
        let plain = |n: usize| (0..n).map(|_| json!({"$project": {"a": 1}})).collect::<Vec<_>>();
        assert_eq!(analyze(plain(3)).complexity_score, 0);
        assert_eq!(analyze(plain(4)).complexity_score, 5);
        assert_eq!(analyze(plain(6)).complexity_score, 10);
        assert_eq!(analyze(plain(8)).complexity_score, 10);
    }

    #[test]
    fn test_stage_can_match_several_markers() {
        let r = analyze(vec![json!({
            "$facet": {
                "a": [{"$group": {"_id": "$k"}}, {"$sort": {"_id": 1}}],
                "b": [{"$lookup": {"from": "x"}}]
            }
        })]);
        assert_eq!(r.complexity_score, 25 + 20 + 15 + 10);
        assert_eq!(r.factors.len(), 4);
        assert_eq!(r.recommended_tier, Tier::Sp30);
    }

    #[test]
    fn test_window_stages_count_as_windowed_aggregation() {
        let r = analyze(vec![json!({
            "$tumblingWindow": {"interval": {"size": 1, "unit": "minute"}, "pipeline": [{"$group": {"_id": null}}]}
        })]);
        assert_eq!(r.complexity_score, 30 + 15);
    }

    #[test]
    fn test_kafka_mention_scores_once_per_stage() {
        let r = analyze(vec![json!({"$source": {"connectionName": "kafkaProd", "topic": "kafka.orders"}})]);
        assert_eq!(r.complexity_score, 15);
        assert_eq!(r.connections_count, 1);
    }

    #[test]
    fn test_operator_name_inside_string_does_not_score() {
        let r = analyze(vec![json!({"$match": {"comment": "no $group here"}})]);
        assert_eq!(r.complexity_score, 0);
    }

    #[test]
    fn test_connection_bonus_brackets() {
        let sources = |n: usize| (0..n).map(|_| json!({"$source": {"connectionName": "c"}})).collect::<Vec<_>>();
        // 3 connections: +10, plus no length bonus
        assert_eq!(analyze(sources(3)).complexity_score, 10);
        // 5 connections: +15 plus +5 length
        let r = analyze(sources(5));
        assert_eq!(r.connections_count, 5);
        assert_eq!(r.complexity_score, 15 + 5);
    }

    #[test]
    fn test_final_tier_is_max_of_both() {
        // complexity SP50 via many markers, parallelism SP5
        let r = analyze(vec![
            json!({"$source": {"connectionName": "kafka"}, "parallelism": 2}),
            json!({"$addFields": {"f": {"$function": {}}}}),
            json!({"$facet": {}}),
        ]);
        assert_eq!(r.total_parallelism, 1);
        assert_eq!(r.parallelism_tier, Tier::Sp5);
        assert_eq!(r.complexity_score, 15 + 10 + 40 + 25);
        assert_eq!(r.recommended_tier, Tier::Sp50);
        assert_eq!(r.driver, TierDriver::Complexity);
        assert_eq!(r.recommended_tier, r.complexity_tier.max(r.parallelism_tier));
    }

    #[test]
    fn test_parallelism_can_be_the_driver() {
        // total 2 → SP10, while score 15 only reaches SP5
        let r = analyze(vec![json!({"$project": {"parallelism": 3}})]);
        assert_eq!(r.total_parallelism, 2);
        assert_eq!(r.complexity_score, 15);
        assert_eq!(r.complexity_tier, Tier::Sp5);
        assert_eq!(r.parallelism_tier, Tier::Sp10);
        assert_eq!(r.recommended_tier, Tier::Sp10);
        assert_eq!(r.driver, TierDriver::Parallelism);

        let reasoning = r.reasoning();
        assert_eq!(
            reasoning.primary,
            "Parallelism-driven: SP10 required for 2 total parallelism"
        );
        assert_eq!(reasoning.secondary, "Complexity score: 15 (suggests SP5)");
    }

    #[test]
    fn test_tie_goes_to_complexity() {
        // total 10 → SP30; score 60 → SP30
        let stages = (0..2).map(|_| json!({"$merge": {"parallelism": 6}})).collect();
        let r = analyze(stages);
        assert_eq!(r.total_parallelism, 10);
        assert_eq!(r.recommended_tier, Tier::Sp30);
        assert_eq!(r.driver, TierDriver::Complexity);
    }

    #[test]
    fn test_reasoning_mentions_driver() {
        let r = analyze(vec![json!({"$group": {"_id": 1}})]);
        let reasoning = r.reasoning();
        assert!(reasoning.primary.starts_with("Complexity-driven"));
        assert_eq!(reasoning.final_decision, "Selected SP5 as the higher requirement");
    }

    #[test]
    fn test_recommendation_document_shape() {
        let doc = ComplexityAnalyzer::new().recommend(&pipeline(vec![json!({"$sort": {"a": 1}})]));
        let v = serde_json::to_value(&doc).unwrap();
        assert_eq!(v["recommended_tier"], "SP5");
        assert_eq!(v["analysis"]["complexity_score"], 10);
        assert_eq!(v["analysis"]["complexity_factors"][0], "Stage 1: Sort operation (+10 complexity)");
        assert!(v["reasoning"]["primary"].is_string());
        assert!(doc.error().is_none());
    }

    #[test]
    fn test_missing_file_falls_back_to_sp10() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ComplexityAnalyzer::new().recommend_for_file(&dir.path().join("missing.json"));
        assert_eq!(doc.recommended_tier, Tier::Sp10);
        assert!(!doc.error().unwrap().is_empty());
        let v = serde_json::to_value(&doc).unwrap();
        assert_eq!(v["analysis"]["error"], "Processor file not found");
        assert_eq!(v["reasoning"], "Default fallback for missing processor");
    }

    #[test]
    fn test_malformed_file_falls_back_with_error_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let doc = ComplexityAnalyzer::new().recommend_for_file(&path);
        assert_eq!(doc.recommended_tier, Tier::Sp10);
        assert!(doc.error().unwrap().contains("broken.json"));
    }

    #[test]
    fn test_file_analysis_reads_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.json");
        std::fs::write(
            &path,
            r#"{"name": "orders", "pipeline": [{"$source": {"connectionName": "c"}}, {"$group": {"_id": "$k"}}]}"#,
        )
        .unwrap();
        let doc = ComplexityAnalyzer::new().recommend_for_file(&path);
        assert_eq!(doc.recommended_tier, Tier::Sp5);
        match doc.analysis {
            AnalysisReport::Breakdown(b) => {
                assert_eq!(b.pipeline_stages, 2);
                assert_eq!(b.connections_count, 1);
            }
            AnalysisReport::Error { error } => panic!("unexpected fallback: {error}"),
        }
    }
}
