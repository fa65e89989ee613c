//! Error types for the Atlas Stream Processing client
//!
//! Operation methods fold [`ApiError`] into failed
//! [`OperationResult`](crate::report::OperationResult) records; only
//! configuration problems and listing failures escape to the CLI.

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for API calls
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file {} not found", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML configuration in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Missing required configuration keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Stream Processing workspace not configured. Please set SP_WORKSPACE_NAME or SP_INSTANCE_NAME in the configuration file.")]
    WorkspaceNotConfigured,

    #[error("{status} for url: {url}")]
    Status {
        status: StatusCode,
        url: String,
        body: String,
    },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Digest authentication failed: {0}")]
    Auth(String),

    #[error("Invalid JSON response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn status(status: StatusCode, url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            url: url.into(),
            body: body.into(),
        }
    }

    /// HTTP status code, when the server answered.
    pub fn http_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(status.as_u16()),
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Response body of a non-success answer.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Status line plus the API's `detail` field, or the raw body when the
    /// body is not a JSON object carrying one.
    pub fn detailed_message(&self) -> String {
        let Some(body) = self.body().filter(|b| !b.trim().is_empty()) else {
            return self.to_string();
        };
        let detail = match serde_json::from_str::<serde_json::Value>(body) {
            Ok(json) => match json.get("detail").and_then(|d| d.as_str()) {
                Some(detail) => detail.to_string(),
                None => json.to_string(),
            },
            Err(_) => body.to_string(),
        };
        format!("{self} - {detail}")
    }
}

/// Failures turning a JavaScript processor file into a JSON pipeline.
#[derive(Error, Debug)]
pub enum PipelineParseError {
    #[error("Could not find pipeline array in JavaScript content")]
    MissingPipeline,

    #[error("Unbalanced brackets in pipeline array")]
    Unbalanced,

    #[error("Could not parse pipeline as JSON: {0}")]
    Json(#[from] serde_json::Error),
}
