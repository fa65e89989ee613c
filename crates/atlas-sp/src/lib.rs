//! Atlas Stream Processing client
//!
//! HTTP Digest authenticated access to the Atlas Admin API for stream
//! processing workspaces, connections and processors, plus the tier-aware
//! start and the stats profiler built on the `tiering` crate.

pub mod cli;
pub mod client;
pub mod config;
pub mod connections;
pub mod digest;
pub mod error;
pub mod js_pipeline;
pub mod output;
pub mod processors;
pub mod profiler;
pub mod report;
pub mod starter;
pub mod workspaces;

pub use client::{ApiVersion, AtlasClient};
pub use config::AtlasConfig;
pub use error::{ApiError, ApiResult, ConfigError, PipelineParseError};
pub use report::{BatchReport, Operation, OperationResult, OperationStatus};
pub use starter::{start_processor, StartApi};
