//! Declared pipeline shape
//!
//! Stages stay opaque JSON. Only the helpers below look inside them, and only
//! to find operator keys, connection stages and declared parallelism.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One stage of an aggregation-style pipeline, e.g. `{"$group": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineStage(pub Value);

/// Ordered list of stages.
pub type Pipeline = Vec<PipelineStage>;

/// A `parallelism` setting found on a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredParallelism {
    /// Key the setting was found under: the stage operator when it sits on
    /// the stage itself, otherwise the argument object holding it.
    pub location: String,
    pub value: i64,
}

impl PipelineStage {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// First key of the stage object, which names its operator.
    pub fn operator(&self) -> Option<&str> {
        self.0.as_object()?.keys().next().map(String::as_str)
    }

    /// Whether `key` appears as an object key anywhere in the stage.
    pub fn contains_key(&self, key: &str) -> bool {
        contains_key(&self.0, key)
    }

    /// Whether `key` is one of the stage's top-level keys.
    pub fn has_top_level(&self, key: &str) -> bool {
        self.0
            .as_object()
            .is_some_and(|obj| obj.contains_key(key))
    }

    /// Case-insensitive search over the stage's serialized form, keys and
    /// values alike.
    pub fn mentions(&self, needle: &str) -> bool {
        self.0
            .to_string()
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }

    /// Numeric `parallelism` settings declared on the stage or one level
    /// inside its argument objects, in key order.
    pub fn declared_parallelism(&self) -> Vec<DeclaredParallelism> {
        let Some(obj) = self.0.as_object() else {
            return Vec::new();
        };
        let operator = self.operator().unwrap_or_default().to_string();

        let mut found = Vec::new();
        for (key, value) in obj {
            if key == "parallelism" {
                if let Some(n) = as_integer(value) {
                    found.push(DeclaredParallelism {
                        location: operator.clone(),
                        value: n,
                    });
                }
            } else if let Some(n) = value
                .as_object()
                .and_then(|inner| inner.get("parallelism"))
                .and_then(as_integer)
            {
                found.push(DeclaredParallelism {
                    location: key.clone(),
                    value: n,
                });
            }
        }
        found
    }
}

impl From<Value> for PipelineStage {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

fn contains_key(value: &Value, key: &str) -> bool {
    match value {
        Value::Object(obj) => obj.iter().any(|(k, v)| k == key || contains_key(v, key)),
        Value::Array(items) => items.iter().any(|v| contains_key(v, key)),
        _ => false,
    }
}

/// Integer view of a JSON number; floats truncate toward zero.
fn as_integer(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    number
        .as_i64()
        .or_else(|| number.as_f64().map(|f| f.trunc() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_is_first_key() {
        let stage = PipelineStage::new(json!({"$group": {"_id": "$k"}}));
        assert_eq!(stage.operator(), Some("$group"));
        assert_eq!(PipelineStage::new(json!([1, 2])).operator(), None);
    }

    #[test]
    fn test_contains_key_walks_nested_objects_and_arrays() {
        let stage = PipelineStage::new(json!({
            "$tumblingWindow": {
                "interval": {"size": 1, "unit": "minute"},
                "pipeline": [{"$group": {"_id": null}}]
            }
        }));
        assert!(stage.contains_key("$group"));
        assert!(stage.contains_key("$tumblingWindow"));
        assert!(!stage.contains_key("$sort"));
    }

    #[test]
    fn test_contains_key_ignores_string_values() {
        let stage = PipelineStage::new(json!({"$match": {"note": "$function in text"}}));
        assert!(!stage.contains_key("$function"));
    }

    #[test]
    fn test_mentions_is_case_insensitive() {
        let stage = PipelineStage::new(json!({"$source": {"connectionName": "KafkaProd"}}));
        assert!(stage.mentions("kafka"));
    }

    #[test]
    fn test_parallelism_direct_and_nested() {
        let stage = PipelineStage::new(json!({
            "$merge": {"into": {"coll": "x"}, "parallelism": 4},
            "parallelism": 2
        }));
        let found = stage.declared_parallelism();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].location, "$merge");
        assert_eq!(found[0].value, 4);
        assert_eq!(found[1].location, "$merge");
        assert_eq!(found[1].value, 2);
    }

    #[test]
    fn test_parallelism_ignores_non_numeric_and_deep_values() {
        let stage = PipelineStage::new(json!({
            "$lookup": {"parallelism": "8"},
            "$other": {"deeper": {"parallelism": 6}}
        }));
        assert!(stage.declared_parallelism().is_empty());
    }

    #[test]
    fn test_parallelism_float_truncates() {
        let stage = PipelineStage::new(json!({"$merge": {"parallelism": 3.9}}));
        assert_eq!(stage.declared_parallelism()[0].value, 3);
    }
}
