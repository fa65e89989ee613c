//! Result records printed by the CLI
//!
//! Mutating operations return one [`OperationResult`]; status and stats
//! queries return a [`BatchReport`] covering one or all processors.

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Start,
    Stop,
    CreateProcessor,
    DeleteProcessor,
    CreateWorkspace,
    DeleteWorkspace,
    CreateConnection,
    DeleteConnection,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::CreateProcessor => "create_processor",
            Self::DeleteProcessor => "delete_processor",
            Self::CreateWorkspace => "create_workspace",
            Self::DeleteWorkspace => "delete_workspace",
            Self::CreateConnection => "create_connection",
            Self::DeleteConnection => "delete_connection",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Started,
    Stopped,
    Created,
    Deleted,
    AlreadyExists,
    NotFound,
    Failed,
}

impl OperationStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Outcome of one mutating operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub name: String,
    pub operation: Operation,
    pub status: OperationStatus,
    pub message: String,
    /// Operation-specific fields (`tier`, `file`, `type`, `url`, ...).
    #[serde(flatten)]
    pub details: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_code: Option<u16>,
}

impl OperationResult {
    pub fn new(
        name: impl Into<String>,
        operation: Operation,
        status: OperationStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            operation,
            status,
            message: message.into(),
            details: Map::new(),
            http_code: None,
        }
    }

    /// Failed record carrying the detailed API message and status code.
    pub fn failed(name: impl Into<String>, operation: Operation, error: &ApiError) -> Self {
        Self {
            http_code: error.http_code(),
            ..Self::new(
                name,
                operation,
                OperationStatus::Failed,
                error.detailed_message(),
            )
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }
}

/// Status of a processor entry in a [`BatchReport`].
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const ERROR: &str = "ERROR";
pub const UNKNOWN_STATE: &str = "UNKNOWN";
/// Entry name used when listing all processors fails.
pub const API_ERROR_NAME: &str = "API_ERROR";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorEntry {
    pub name: String,
    pub operation: String,
    /// Processor state (`STARTED`, `STOPPED`, ...), `NOT_FOUND` or `ERROR`.
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Value>,
}

/// Status or stats report over one or all processors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub summary: Summary,
    pub processors: Vec<ProcessorEntry>,
}

impl BatchReport {
    pub fn new(operation: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            summary: Summary::default(),
            processors: Vec::new(),
        }
    }

    pub fn push_success(&mut self, entry: ProcessorEntry) {
        self.summary.success += 1;
        self.processors.push(entry);
    }

    pub fn push_failure(&mut self, name: &str, status: &str, message: String) {
        self.summary.failed += 1;
        self.processors.push(ProcessorEntry {
            name: name.to_string(),
            operation: self.operation.clone(),
            status: status.to_string(),
            message,
            stats: None,
            pipeline: None,
        });
    }

    /// First successful entry, if any.
    pub fn first_success(&self) -> Option<&ProcessorEntry> {
        if self.summary.success == 0 {
            return None;
        }
        self.processors
            .iter()
            .find(|p| p.status != NOT_FOUND && p.status != ERROR)
    }
}
