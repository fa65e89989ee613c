//! Profile samples and their analysis.
//!
//! The profiler loop (in the CLI crate) collects one [`ProfileSample`] per
//! round; everything here is pure and works on the collected series.

use crate::error::ProfileError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const BYTES_PER_MB: f64 = 1_048_576.0;

/// Change below this percentage (either direction) reads as stable.
const TREND_THRESHOLD_PCT: f64 = 5.0;

const HIGH_MEMORY_MB: f64 = 1000.0;
const LOW_MEMORY_MB: f64 = 100.0;
const HIGH_LATENCY_MS: f64 = 50.0;
const LOW_THROUGHPUT_PER_SEC: f64 = 1.0;

/// Metrics of one processor in one sampling round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorSample {
    pub name: String,
    pub memory_mb: f64,
    pub input_count: u64,
    pub output_count: u64,
    pub dlq_count: u64,
    pub latency_p50_us: f64,
    pub latency_p99_us: f64,
    pub state_size_bytes: u64,
    pub scale_factor: f64,
    pub throughput_per_sec: f64,
}

impl ProcessorSample {
    /// Build a sample from a verbose stats object.
    ///
    /// Throughput is the input-count delta against `previous` divided by the
    /// interval, clamped at zero; without a previous sample it is zero.
    pub fn from_stats(
        name: &str,
        stats: &Value,
        previous: Option<&ProcessorSample>,
        interval_secs: f64,
    ) -> Self {
        let count = |key: &str| stats.get(key).and_then(Value::as_u64).unwrap_or(0);
        let latency = |key: &str| {
            stats
                .get("latency")
                .and_then(|l| l.get(key))
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
        };

        let input_count = count("inputMessageCount");
        let throughput_per_sec = match previous {
            Some(prev) if interval_secs > 0.0 => {
                let diff = input_count as f64 - prev.input_count as f64;
                (diff / interval_secs).max(0.0)
            }
            _ => 0.0,
        };

        Self {
            name: name.to_string(),
            memory_mb: stats
                .get("memoryUsageBytes")
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
                / BYTES_PER_MB,
            input_count,
            output_count: count("outputMessageCount"),
            dlq_count: count("dlqMessageCount"),
            latency_p50_us: latency("p50"),
            latency_p99_us: latency("p99"),
            state_size_bytes: count("stateSize"),
            scale_factor: stats
                .get("scaleFactor")
                .and_then(Value::as_f64)
                .unwrap_or(1.0),
            throughput_per_sec,
        }
    }

    pub fn latency_p50_ms(&self) -> f64 {
        self.latency_p50_us / 1000.0
    }

    pub fn latency_p99_ms(&self) -> f64 {
        self.latency_p99_us / 1000.0
    }
}

/// A processor's slot in a sampling round: either metrics or the error that
/// prevented collecting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleEntry {
    Sample(ProcessorSample),
    Error { name: String, error: String },
}

impl SampleEntry {
    pub fn sample(&self) -> Option<&ProcessorSample> {
        match self {
            Self::Sample(s) => Some(s),
            Self::Error { .. } => None,
        }
    }
}

/// One sampling round across all profiled processors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSample {
    pub timestamp: DateTime<Utc>,
    pub processors: Vec<SampleEntry>,
    #[serde(default)]
    pub alerts: Vec<String>,
}

impl ProfileSample {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            processors: Vec::new(),
            alerts: Vec::new(),
        }
    }

    /// Successful sample for `name` in this round.
    pub fn find(&self, name: &str) -> Option<&ProcessorSample> {
        self.processors
            .iter()
            .filter_map(SampleEntry::sample)
            .find(|s| s.name == name)
    }
}

/// Optional alert thresholds. Unset thresholds never fire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileThresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_p99_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput_min: Option<f64>,
}

impl ProfileThresholds {
    /// Alert messages for every threshold `sample` crosses.
    pub fn check(&self, sample: &ProcessorSample) -> Vec<String> {
        let mut alerts = Vec::new();
        let name = &sample.name;

        if let Some(max) = self.memory_mb {
            if sample.memory_mb > max {
                alerts.push(format!(
                    "{name}: High memory usage ({:.1}MB > {max}MB)",
                    sample.memory_mb
                ));
            }
        }

        if let Some(max) = self.latency_p99_ms {
            let p99_ms = sample.latency_p99_ms();
            if p99_ms > max {
                alerts.push(format!("{name}: High latency ({p99_ms:.1}ms > {max}ms)"));
            }
        }

        if let Some(min) = self.throughput_min {
            if sample.throughput_per_sec < min {
                alerts.push(format!(
                    "{name}: Low throughput ({:.1}/sec < {min}/sec)",
                    sample.throughput_per_sec
                ));
            }
        }

        alerts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

/// Compare the averages of the first and second half of a series.
pub fn calculate_trend(values: &[f64]) -> Trend {
    if values.len() < 2 {
        return Trend::InsufficientData;
    }

    let (first, second) = values.split_at(values.len() / 2);
    let first_avg = mean(first);
    let second_avg = mean(second);

    if first_avg <= 0.0 {
        return Trend::Stable;
    }

    let change_pct = (second_avg - first_avg) / first_avg * 100.0;
    if change_pct.abs() < TREND_THRESHOLD_PCT {
        Trend::Stable
    } else if change_pct > 0.0 {
        Trend::Increasing
    } else {
        Trend::Decreasing
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub trend: Trend,
}

impl MetricStats {
    /// Empty or all-zero series collapse to zeros and `stable`.
    pub fn from_values(values: &[f64]) -> Self {
        if values.iter().all(|v| *v == 0.0) {
            return Self {
                min: 0.0,
                max: 0.0,
                avg: 0.0,
                trend: Trend::Stable,
            };
        }
        Self {
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            avg: mean(values),
            trend: calculate_trend(values),
        }
    }
}

/// Per-processor statistics over a profiling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorProfile {
    pub memory_mb: MetricStats,
    pub latency_p50_ms: MetricStats,
    pub latency_p99_ms: MetricStats,
    pub throughput_per_sec: MetricStats,
    pub samples: usize,
    pub recommendations: Vec<String>,
}

impl ProcessorProfile {
    pub fn from_samples(samples: &[&ProcessorSample]) -> Self {
        let series = |f: fn(&ProcessorSample) -> f64| -> Vec<f64> {
            samples.iter().map(|s| f(s)).collect()
        };

        let mut profile = Self {
            memory_mb: MetricStats::from_values(&series(|s| s.memory_mb)),
            latency_p50_ms: MetricStats::from_values(&series(ProcessorSample::latency_p50_ms)),
            latency_p99_ms: MetricStats::from_values(&series(ProcessorSample::latency_p99_ms)),
            throughput_per_sec: MetricStats::from_values(&series(|s| s.throughput_per_sec)),
            samples: samples.len(),
            recommendations: Vec::new(),
        };
        profile.recommendations = recommendations(&profile);
        profile
    }
}

/// Human-readable advice derived from a processor's statistics.
pub fn recommendations(profile: &ProcessorProfile) -> Vec<String> {
    let mut out = Vec::new();
    let memory = &profile.memory_mb;
    let latency = &profile.latency_p99_ms;
    let throughput = &profile.throughput_per_sec;

    if memory.trend == Trend::Increasing {
        out.push("Memory usage is increasing - monitor for potential memory leaks".to_string());
    } else if memory.max > HIGH_MEMORY_MB {
        out.push(
            "High memory usage detected - consider increasing tier or optimizing processor"
                .to_string(),
        );
    } else if memory.avg < LOW_MEMORY_MB {
        out.push("Low memory usage - processor may be over-provisioned".to_string());
    }

    if latency.trend == Trend::Increasing {
        out.push("Latency is increasing - check for performance degradation".to_string());
    } else if latency.avg > HIGH_LATENCY_MS {
        out.push("High average latency - consider tier upgrade or optimization".to_string());
    }

    if throughput.trend == Trend::Decreasing {
        out.push("Throughput is decreasing - investigate potential bottlenecks".to_string());
    } else if throughput.avg < LOW_THROUGHPUT_PER_SEC {
        out.push("Low throughput detected - verify data source and processing logic".to_string());
    }

    if out.is_empty() {
        out.push("Processor performance appears healthy".to_string());
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub sample_count: usize,
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileAnalysis {
    pub profile_summary: ProfileSummary,
    pub processors: BTreeMap<String, ProcessorProfile>,
    pub alerts: Vec<String>,
}

/// Summarize a profiling run.
///
/// Processors are those that produced metrics in the first round; later
/// rounds contribute only their successful samples.
pub fn analyze_profile(
    samples: &[ProfileSample],
    duration_seconds: f64,
    interval_seconds: u64,
) -> Result<ProfileAnalysis, ProfileError> {
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return Err(ProfileError::NoSamples);
    };

    let alerts = samples
        .iter()
        .flat_map(|s| s.alerts.iter().cloned())
        .collect();

    let mut processors = BTreeMap::new();
    for name in first
        .processors
        .iter()
        .filter_map(SampleEntry::sample)
        .map(|s| s.name.as_str())
    {
        let series: Vec<&ProcessorSample> = samples.iter().filter_map(|s| s.find(name)).collect();
        if !series.is_empty() {
            processors.insert(name.to_string(), ProcessorProfile::from_samples(&series));
        }
    }

    Ok(ProfileAnalysis {
        profile_summary: ProfileSummary {
            start_time: first.timestamp,
            end_time: last.timestamp,
            duration_seconds,
            sample_count: samples.len(),
            interval_seconds,
        },
        processors,
        alerts,
    })
}
