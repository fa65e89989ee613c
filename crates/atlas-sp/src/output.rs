//! Terminal rendering of JSON results
//!
//! Pretty-printed with two-space indentation. In color mode keys are blue,
//! strings green, numbers yellow, booleans magenta and `null` dimmed.

use colored::Colorize;
use serde_json::Value;

/// Render a JSON value, colorized when `color` is set.
pub fn render_json(value: &Value, color: bool) -> String {
    if !color {
        return serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    }
    let mut out = String::new();
    write_colored(value, 0, &mut out);
    out
}

pub fn error_value(message: &str) -> Value {
    serde_json::json!({ "error": message })
}

fn quoted(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}

fn write_colored(value: &Value, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Object(map) if map.is_empty() => out.push_str("{}"),
        Value::Object(map) => {
            out.push_str("{\n");
            for (i, (key, item)) in map.iter().enumerate() {
                out.push_str(&pad);
                out.push_str("  ");
                out.push_str(&quoted(key).blue().to_string());
                out.push_str(": ");
                write_colored(item, indent + 1, out);
                if i + 1 < map.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&pad);
            out.push('}');
        }
        Value::Array(items) if items.is_empty() => out.push_str("[]"),
        Value::Array(items) => {
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                out.push_str(&pad);
                out.push_str("  ");
                write_colored(item, indent + 1, out);
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&pad);
            out.push(']');
        }
        Value::String(s) => out.push_str(&quoted(s).green().to_string()),
        Value::Number(n) => out.push_str(&n.to_string().yellow().to_string()),
        Value::Bool(b) => out.push_str(&b.to_string().magenta().to_string()),
        Value::Null => out.push_str(&"null".dimmed().to_string()),
    }
}
