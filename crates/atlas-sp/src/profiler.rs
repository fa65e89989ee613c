//! Processor profiler loop
//!
//! Samples verbose stats of a set of processors at a fixed interval, either
//! for a fixed duration or until cancelled, then hands the series to
//! [`tiering::analyze_profile`]. Cancellation (Ctrl-C in the CLI) stops the
//! loop between rounds; samples already collected are still analyzed.

use crate::client::AtlasClient;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Duration;
use tiering::{
    analyze_profile, ProcessorSample, ProfileAnalysis, ProfileError, ProfileSample,
    ProfileThresholds, SampleEntry,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_DURATION: Duration = Duration::from_secs(300);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Where per-processor stats come from.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Verbose stats document of one processor, or a message explaining why
    /// none is available.
    async fn processor_stats(&self, name: &str) -> Result<Value, String>;
}

#[async_trait]
impl StatsSource for AtlasClient {
    async fn processor_stats(&self, name: &str) -> Result<Value, String> {
        let report = self.stats_report(Some(name), true).await;
        if let Some(entry) = report.first_success() {
            return Ok(entry.stats.clone().unwrap_or_else(|| json!({})));
        }
        Err(report
            .processors
            .first()
            .map(|p| p.message.clone())
            .unwrap_or_else(|| format!("No stats for processor '{name}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileMode {
    /// Sample until this much time has passed.
    Timed(Duration),
    /// Sample until cancelled.
    Continuous,
}

#[derive(Debug, Clone)]
pub struct ProfileOptions {
    pub processors: Vec<String>,
    pub interval: Duration,
    pub mode: ProfileMode,
    pub thresholds: ProfileThresholds,
}

/// One sampling round over every processor.
pub async fn collect_round<S>(
    source: &S,
    processors: &[String],
    previous: Option<&ProfileSample>,
    interval: Duration,
    thresholds: &ProfileThresholds,
) -> ProfileSample
where
    S: StatsSource + ?Sized,
{
    let mut round = ProfileSample::new(Utc::now());

    for name in processors {
        match source.processor_stats(name).await {
            Ok(stats) => {
                let prev = previous.and_then(|p| p.find(name));
                let sample =
                    ProcessorSample::from_stats(name, &stats, prev, interval.as_secs_f64());
                for alert in thresholds.check(&sample) {
                    tracing::warn!(processor = %name, "ALERT: {alert}");
                    round.alerts.push(alert);
                }
                round.processors.push(SampleEntry::Sample(sample));
            }
            Err(error) => {
                tracing::warn!(processor = %name, %error, "Stats unavailable");
                round.processors.push(SampleEntry::Error {
                    name: name.clone(),
                    error,
                });
            }
        }
    }
    round
}

/// Run the profiler and analyze what it collected.
pub async fn run_profile<S>(
    source: &S,
    options: &ProfileOptions,
    cancel: CancellationToken,
) -> Result<ProfileAnalysis, ProfileError>
where
    S: StatsSource + ?Sized,
{
    let started = Instant::now();
    let mut samples: Vec<ProfileSample> = Vec::new();

    tracing::info!(
        processors = options.processors.len(),
        interval_secs = options.interval.as_secs(),
        mode = ?options.mode,
        "Profiling started"
    );

    loop {
        if let ProfileMode::Timed(duration) = options.mode {
            if started.elapsed() >= duration {
                break;
            }
        }

        let round = collect_round(
            source,
            &options.processors,
            samples.last(),
            options.interval,
            &options.thresholds,
        )
        .await;
        log_round(samples.len() + 1, &round, started, options.mode);
        samples.push(round);

        let pause = match options.mode {
            ProfileMode::Timed(duration) => {
                let remaining = duration.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    break;
                }
                remaining.min(options.interval)
            }
            ProfileMode::Continuous => options.interval,
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(samples = samples.len(), "Profiling interrupted");
                break;
            }
            _ = tokio::time::sleep(pause) => {}
        }
    }

    let duration_secs = match options.mode {
        ProfileMode::Timed(duration) if !cancel.is_cancelled() => duration.as_secs_f64(),
        _ => started.elapsed().as_secs_f64(),
    };
    analyze_profile(&samples, duration_secs, options.interval.as_secs())
}

fn log_round(number: usize, round: &ProfileSample, started: Instant, mode: ProfileMode) {
    let elapsed = started.elapsed();
    match mode {
        ProfileMode::Timed(duration) => {
            let remaining = duration.saturating_sub(elapsed).as_secs();
            tracing::info!(sample = number, remaining_secs = remaining, "Sample collected");
        }
        ProfileMode::Continuous => {
            tracing::info!(sample = number, elapsed_secs = elapsed.as_secs(), "Sample collected");
        }
    }

    for sample in round.processors.iter().filter_map(SampleEntry::sample) {
        tracing::debug!(
            processor = %sample.name,
            memory_mb = sample.memory_mb,
            p50_ms = sample.latency_p50_ms(),
            throughput = sample.throughput_per_sec,
            "Live stats"
        );
    }
}
