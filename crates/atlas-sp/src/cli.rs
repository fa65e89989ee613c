//! Command-line surface of the `atlas-sp` binary.

use crate::profiler::{ProfileMode, ProfileOptions, DEFAULT_DURATION, DEFAULT_INTERVAL};
use crate::workspaces::{DEFAULT_CLOUD_PROVIDER, DEFAULT_REGION};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tiering::{ProfileThresholds, Tier};

pub const DEFAULT_CONFIG_PATH: &str = "config.txt";

/// Manage Atlas Stream Processing workspaces, connections and processors.
#[derive(Parser, Debug)]
#[command(name = "atlas-sp", author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (key=value text, or TOML when it ends in .toml)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Disable colored output
    #[arg(long, global = true, default_value_t = false)]
    pub no_color: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short = 'v', long = "debug", global = true, default_value_t = false)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List stream processors
    List {
        /// Include stats and pipeline of each processor
        #[arg(long)]
        verbose: bool,
    },
    /// Show processor status
    Status { name: Option<String> },
    /// Show processor statistics
    Stats {
        name: Option<String>,
        #[arg(long)]
        verbose: bool,
    },
    /// Start a processor, optionally on a given tier
    Start {
        name: String,
        /// Tier to start on (SP2, SP5, SP10, SP30, SP50)
        #[arg(long, conflicts_with = "auto_tier")]
        tier: Option<Tier>,
        /// Start on the tier recommended by the complexity analyzer
        #[arg(long)]
        auto_tier: bool,
    },
    /// Stop a processor
    Stop { name: String },
    /// Delete a processor
    Delete { name: String },
    /// Create (or replace) a processor from a JSON or JavaScript definition
    Create {
        name: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Recommend a tier for a processor definition
    Analyze {
        name: String,
        /// Definition to analyze (defaults to <processors_dir>/<name>.json)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Sample processor stats over time and analyze them
    Profile(ProfileArgs),
    /// Manage Stream Processing workspaces
    #[command(subcommand)]
    Workspaces(WorkspaceCommand),
    /// Manage workspace connections
    #[command(subcommand)]
    Connections(ConnectionCommand),
}

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[arg(required = true)]
    pub names: Vec<String>,
    /// Profiling duration in seconds
    #[arg(long, default_value_t = DEFAULT_DURATION.as_secs())]
    pub duration: u64,
    /// Seconds between samples
    #[arg(long, default_value_t = DEFAULT_INTERVAL.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,
    /// Sample until interrupted instead of for a fixed duration
    #[arg(long, conflicts_with = "duration")]
    pub continuous: bool,
    #[arg(long)]
    pub max_memory_mb: Option<f64>,
    #[arg(long)]
    pub max_latency_p99_ms: Option<f64>,
    #[arg(long)]
    pub min_throughput: Option<f64>,
}

impl ProfileArgs {
    pub fn options(&self) -> ProfileOptions {
        let mode = if self.continuous {
            ProfileMode::Continuous
        } else {
            ProfileMode::Timed(Duration::from_secs(self.duration))
        };
        ProfileOptions {
            processors: self.names.clone(),
            interval: Duration::from_secs(self.interval),
            mode,
            thresholds: ProfileThresholds {
                memory_mb: self.max_memory_mb,
                latency_p99_ms: self.max_latency_p99_ms,
                throughput_min: self.min_throughput,
            },
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum WorkspaceCommand {
    List,
    Show {
        name: String,
    },
    Create {
        name: String,
        #[arg(long, default_value = DEFAULT_CLOUD_PROVIDER)]
        cloud_provider: String,
        #[arg(long, default_value = DEFAULT_REGION)]
        region: String,
    },
    Delete {
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConnectionCommand {
    List,
    /// Create an HTTPS connection
    CreateHttp {
        name: String,
        #[arg(long)]
        url: String,
    },
    /// Create a connection to an Atlas cluster
    CreateCluster {
        name: String,
        #[arg(long)]
        cluster: String,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        role_type: Option<String>,
    },
    Delete {
        name: String,
    },
}
