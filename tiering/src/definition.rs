//! Processor definition files
//!
//! A definition is the JSON document a processor is created from:
//!
//! ```json
//! { "name": "orders", "pipeline": [ {"$source": {...}}, ... ], "options": {"dlq": {...}} }
//! ```

use crate::error::AnalysisError;
use crate::pipeline::Pipeline;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessorDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Missing pipelines read as empty.
    #[serde(default)]
    pub pipeline: Pipeline,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

impl ProcessorDefinition {
    /// Parse a definition from JSON text; `origin` is only used in errors.
    pub fn from_json(text: &str, origin: &Path) -> Result<Self, AnalysisError> {
        serde_json::from_str(text).map_err(|source| AnalysisError::Json {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Read and parse a definition file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AnalysisError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text, path)
    }
}

/// Conventional location of a named processor's definition.
pub fn definition_path(processors_dir: &Path, processor_name: &str) -> PathBuf {
    processors_dir.join(format!("{processor_name}.json"))
}
