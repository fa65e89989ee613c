//! Stream processor operations on the configured workspace.

use crate::client::AtlasClient;
use crate::error::ApiResult;
use crate::js_pipeline::parse_js_processor;
use crate::report::{
    BatchReport, Operation, OperationResult, OperationStatus, ProcessorEntry, API_ERROR_NAME,
    ERROR, NOT_FOUND, UNKNOWN_STATE,
};
use serde_json::{json, Map, Value};
use std::path::Path;
use tiering::{PipelineStage, ProcessorDefinition};

/// Query parameters asking the detail endpoint for everything it has.
pub const VERBOSE_PARAMS: [(&str, &str); 3] = [
    ("includeCount", "true"),
    ("verbose", "true"),
    ("options.verbose", "true"),
];

const UNKNOWN: &str = "unknown";

impl AtlasClient {
    /// List processors, each enriched from its detail document with `tier`,
    /// `scaleFactor` and `stats`. A failed detail call marks the processor
    /// `unknown` rather than failing the listing.
    pub async fn list_processors(&self, verbose: bool) -> ApiResult<Vec<Value>> {
        let base = self.workspace_url()?;
        let summaries = self.get_results(&format!("{base}/processors")).await?;
        let params: &[(&str, &str)] = if verbose { &VERBOSE_PARAMS } else { &[] };

        let mut processors = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let detail = match processor_name(&summary) {
                Some(name) => {
                    let url = format!("{base}/processor/{name}");
                    match self.get_json(&url, params).await {
                        Ok(detail) => Some(detail),
                        Err(e) => {
                            tracing::debug!(processor = name, error = %e, "Processor detail unavailable");
                            None
                        }
                    }
                }
                None => None,
            };
            processors.push(enrich_processor(summary, detail, verbose));
        }
        Ok(processors)
    }

    pub async fn status_report(&self, name: Option<&str>) -> BatchReport {
        status_report(self.list_processors(false).await, name)
    }

    pub async fn stats_report(&self, name: Option<&str>, verbose: bool) -> BatchReport {
        stats_report(self.list_processors(verbose).await, name, verbose)
    }

    pub async fn stop_processor(&self, name: &str) -> OperationResult {
        let result = match self.workspace_url() {
            Ok(base) => self.post_empty(&format!("{base}/processor/{name}:stop")).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                tracing::info!(processor = name, "Stopped processor");
                OperationResult::new(
                    name,
                    Operation::Stop,
                    OperationStatus::Stopped,
                    "Stopped successfully",
                )
            }
            Err(e) => OperationResult::failed(name, Operation::Stop, &e),
        }
    }

    pub async fn delete_processor(&self, name: &str) -> OperationResult {
        let result = match self.workspace_url() {
            Ok(base) => self.delete(&format!("{base}/processor/{name}")).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                tracing::info!(processor = name, "Deleted processor");
                OperationResult::new(
                    name,
                    Operation::DeleteProcessor,
                    OperationStatus::Deleted,
                    "Processor deleted successfully",
                )
            }
            Err(e) => OperationResult::failed(name, Operation::DeleteProcessor, &e),
        }
    }

    /// Create (or replace) a processor. Any existing processor with the same
    /// name is deleted first; errors from that delete are ignored.
    pub async fn create_processor(
        &self,
        name: &str,
        pipeline: &[PipelineStage],
        options: Option<&Value>,
    ) -> OperationResult {
        let base = match self.workspace_url() {
            Ok(base) => base,
            Err(e) => return OperationResult::failed(name, Operation::CreateProcessor, &e),
        };

        if let Err(e) = self.delete(&format!("{base}/processor/{name}")).await {
            tracing::debug!(processor = name, error = %e, "Pre-create delete failed (ignored)");
        }

        match self
            .post_json(&format!("{base}/processor"), &create_payload(name, pipeline, options))
            .await
        {
            Ok(()) => {
                tracing::info!(processor = name, stages = pipeline.len(), "Created processor");
                OperationResult::new(
                    name,
                    Operation::CreateProcessor,
                    OperationStatus::Created,
                    "Processor created successfully",
                )
            }
            Err(e) => OperationResult::failed(name, Operation::CreateProcessor, &e),
        }
    }

    /// Create a processor from a `.json` definition or a JavaScript-style file.
    /// `${VAR}` placeholders are substituted from the configuration first.
    pub async fn create_processor_from_file(&self, name: &str, path: &Path) -> OperationResult {
        let file = path.display().to_string();
        let failed = |message: String| {
            OperationResult::new(
                name,
                Operation::CreateProcessor,
                OperationStatus::Failed,
                message,
            )
            .with_detail("file", file.clone())
        };

        if !path.exists() {
            return failed(format!("Pipeline file '{file}' not found"));
        }
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => return failed(format!("Failed to read pipeline file '{file}': {e}")),
        };

        let content = self.config().substitute_variables(&raw);
        let definition = match load_definition(&content, path) {
            Ok(definition) => definition,
            Err(message) => return failed(format!("Parse error: {message}")),
        };

        self.create_processor(name, &definition.pipeline, definition.options.as_ref())
            .await
            .with_detail("file", file)
    }
}

/// Parse processor file content by extension: `.json` is strict JSON,
/// anything else goes through the JavaScript reader.
pub fn load_definition(content: &str, path: &Path) -> Result<ProcessorDefinition, String> {
    if path.extension().is_some_and(|ext| ext == "json") {
        ProcessorDefinition::from_json(content, path).map_err(|e| e.to_string())
    } else {
        parse_js_processor(content).map_err(|e| e.to_string())
    }
}

pub fn create_payload(name: &str, pipeline: &[PipelineStage], options: Option<&Value>) -> Value {
    let mut payload = json!({ "name": name, "pipeline": pipeline });
    if let (Some(options), Some(map)) = (options, payload.as_object_mut()) {
        map.insert("options".to_string(), options.clone());
    }
    payload
}

fn processor_name(processor: &Value) -> Option<&str> {
    processor.get("name").and_then(Value::as_str)
}

fn processor_state(processor: &Value) -> String {
    processor
        .get("state")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_STATE)
        .to_string()
}

/// Merge a processor's detail document into its list summary.
pub fn enrich_processor(summary: Value, detail: Option<Value>, verbose: bool) -> Value {
    let mut processor = match summary {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };

    let field = |key: &str| {
        detail
            .as_ref()
            .and_then(|d| d.get(key))
            .cloned()
            .unwrap_or_else(|| Value::from(UNKNOWN))
    };
    processor.insert("tier".to_string(), field("tier"));
    processor.insert("scaleFactor".to_string(), field("scaleFactor"));

    if let Some(detail) = detail {
        if let Some(stats) = detail.get("stats") {
            processor.insert("stats".to_string(), stats.clone());
        }
        if verbose {
            processor.insert("full_response".to_string(), detail);
        }
    }
    Value::Object(processor)
}

/// Status report for every processor, or just `name`.
pub fn status_report(listing: ApiResult<Vec<Value>>, name: Option<&str>) -> BatchReport {
    build_report("status", listing, name, |processor, proc_name| ProcessorEntry {
        name: proc_name.to_string(),
        operation: "status".to_string(),
        status: processor_state(processor),
        message: "Status retrieved successfully".to_string(),
        stats: None,
        pipeline: None,
    })
}

/// Stats report for every processor, or just `name`. Verbose reports carry
/// the full stats document and pipeline; otherwise a fixed subset.
pub fn stats_report(listing: ApiResult<Vec<Value>>, name: Option<&str>, verbose: bool) -> BatchReport {
    build_report("stats", listing, name, |processor, proc_name| {
        let full = processor.get("full_response").filter(|_| verbose);
        let (stats, pipeline) = match full {
            Some(full) => (
                full.get("stats").cloned().unwrap_or_else(|| json!({})),
                full.get("pipeline").cloned(),
            ),
            None => (stats_subset(proc_name, processor), None),
        };
        ProcessorEntry {
            name: proc_name.to_string(),
            operation: "stats".to_string(),
            status: processor_state(processor),
            message: "Stats retrieved successfully".to_string(),
            stats: Some(stats),
            pipeline,
        }
    })
}

/// The non-verbose stats fields.
pub fn stats_subset(name: &str, processor: &Value) -> Value {
    let empty = json!({});
    let stats = processor.get("stats").unwrap_or(&empty);
    let count = |key: &str| stats.get(key).cloned().unwrap_or_else(|| json!(0));
    json!({
        "processor": name,
        "state": processor_state(processor),
        "inputMessageCount": count("inputMessageCount"),
        "outputMessageCount": count("outputMessageCount"),
        "dlqMessageCount": count("dlqMessageCount"),
        "memoryUsageBytes": count("memoryUsageBytes"),
        "lastMessageIn": stats.get("lastMessageIn").cloned().unwrap_or(Value::Null),
        "scaleFactor": stats.get("scaleFactor").cloned().unwrap_or_else(|| json!(1)),
    })
}

fn build_report<F>(
    operation: &str,
    listing: ApiResult<Vec<Value>>,
    name: Option<&str>,
    entry: F,
) -> BatchReport
where
    F: Fn(&Value, &str) -> ProcessorEntry,
{
    let mut report = BatchReport::new(operation);
    let processors = match listing {
        Ok(processors) => processors,
        Err(e) => {
            report.summary.total = usize::from(name.is_some());
            report.push_failure(name.unwrap_or(API_ERROR_NAME), ERROR, e.detailed_message());
            return report;
        }
    };

    match name {
        Some(target) => {
            report.summary.total = 1;
            match processors.iter().find(|p| processor_name(p) == Some(target)) {
                Some(processor) => report.push_success(entry(processor, target)),
                None => report.push_failure(
                    target,
                    NOT_FOUND,
                    format!("Processor '{target}' not found"),
                ),
            }
        }
        None => {
            report.summary.total = processors.len();
            for processor in &processors {
                let proc_name = processor_name(processor).unwrap_or_default();
                report.push_success(entry(processor, proc_name));
            }
        }
    }
    report
}
