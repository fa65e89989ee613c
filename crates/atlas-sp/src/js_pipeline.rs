//! JavaScript-style processor files
//!
//! Processor files may be written as a JavaScript object literal rather than
//! strict JSON:
//!
//! ```text
//! {
//!   name: 'orders',
//!   pipeline: [
//!     { $source: { connectionName: 'kafka', topic: 'orders' } },  // raw events
//!     { $merge: { into: { connectionName: 'cluster', db: 'shop', coll: 'orders' } } },
//!   ],
//!   options: { dlq: { connectionName: 'cluster', db: 'shop', coll: 'dlq' } }
//! }
//! ```
//!
//! Only the `pipeline` array and the `dlq` options object are extracted. The
//! conversion quotes bare keys, rewrites single-quoted strings and drops
//! trailing commas, all outside string literals.

use crate::error::PipelineParseError;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;
use tiering::{Pipeline, ProcessorDefinition};

static PIPELINE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bpipeline\s*:\s*\[").expect("PIPELINE_START regex should compile")
});

static DLQ_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdlq\s*:\s*\{").expect("DLQ_START regex should compile"));

static NAME_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bname\s*:\s*['"]([^'"]+)['"]"#).expect("NAME_FIELD regex should compile")
});

/// Parse a JavaScript processor file into a definition.
///
/// A malformed `dlq` block is ignored; a missing or malformed pipeline is an
/// error.
pub fn parse_js_processor(content: &str) -> Result<ProcessorDefinition, PipelineParseError> {
    let source = strip_line_comments(content);

    let start = PIPELINE_START
        .find(&source)
        .ok_or(PipelineParseError::MissingPipeline)?;
    let open = start.end() - 1;
    let close = matching_close(&source, open).ok_or(PipelineParseError::Unbalanced)?;
    let pipeline: Pipeline = serde_json::from_str(&js_to_json(&source[open..=close]))?;

    let options = dlq_options(&source).map(|dlq| json!({ "dlq": dlq }));
    let name = NAME_FIELD.captures(&source).map(|caps| caps[1].to_string());

    Ok(ProcessorDefinition {
        name,
        pipeline,
        options,
    })
}

fn dlq_options(source: &str) -> Option<Value> {
    let open = DLQ_START.find(source)?.end() - 1;
    let close = matching_close(source, open)?;
    match serde_json::from_str(&js_to_json(&source[open..=close])) {
        Ok(dlq) => Some(dlq),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unparseable dlq options");
            None
        }
    }
}

/// Remove `//` comments that are outside string literals.
pub fn strip_line_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None if c == '/' && chars.peek() == Some(&'/') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }
    out
}

/// Byte index of the bracket closing the one at `open`, skipping strings.
fn matching_close(source: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (idx, c) in source[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Rewrite a JavaScript object/array literal as JSON text.
pub fn js_to_json(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                i = copy_string(&chars, i, &mut out);
                continue;
            }
            ',' => {
                let next = next_significant(&chars, i + 1);
                if !matches!(next.map(|j| chars[j]), Some('}') | Some(']')) {
                    out.push(',');
                }
            }
            c if c == '$' || c == '_' || c.is_ascii_alphabetic() => {
                let end = identifier_end(&chars, i);
                let ident: String = chars[i..end].iter().collect();
                let is_key = next_significant(&chars, end).is_some_and(|j| chars[j] == ':')
                    && matches!(last_significant(&out), Some('{') | Some(','));
                if is_key {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
                i = end;
                continue;
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

/// Copy the string literal starting at `start` as a double-quoted JSON
/// string; returns the index after its closing quote.
fn copy_string(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            let next = chars[i + 1];
            if quote == '\'' && next == '\'' {
                out.push('\'');
            } else {
                out.push('\\');
                out.push(next);
            }
            i += 2;
            continue;
        }
        if c == quote {
            out.push('"');
            return i + 1;
        }
        if c == '"' {
            out.push_str("\\\"");
        } else {
            out.push(c);
        }
        i += 1;
    }
    out.push('"');
    i
}

fn identifier_end(chars: &[char], start: usize) -> usize {
    let is_ident = |c: char| c == '$' || c == '_' || c.is_ascii_alphanumeric();
    let mut end = start;
    while end < chars.len() && is_ident(chars[end]) {
        end += 1;
    }
    end
}

fn next_significant(chars: &[char], from: usize) -> Option<usize> {
    (from..chars.len()).find(|&j| !chars[j].is_whitespace())
}

fn last_significant(out: &str) -> Option<char> {
    out.chars().rev().find(|c| !c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERS: &str = r#"
// Orders enrichment processor
{
  name: 'orders',
  pipeline: [
    { $source: { connectionName: 'kafka', topic: 'orders' } },  // raw events
    { $addFields: { note: "it's // not a comment", url: 'https://example.com' } },
    { $merge: { into: { connectionName: 'cluster', db: 'shop', coll: 'orders' } } },
  ],
  options: { dlq: { connectionName: 'cluster', db: 'shop', coll: 'dlq' } }
}
"#;

    #[test]
    fn test_parses_pipeline_and_dlq() {
        let def = parse_js_processor(ORDERS).unwrap();
        assert_eq!(def.name.as_deref(), Some("orders"));
        assert_eq!(def.pipeline.len(), 3);
        assert_eq!(def.pipeline[0].operator(), Some("$source"));
        assert_eq!(def.pipeline[1].0["$addFields"]["note"], "it's // not a comment");
        assert_eq!(def.pipeline[1].0["$addFields"]["url"], "https://example.com");
        assert_eq!(
            def.options.unwrap(),
            json!({"dlq": {"connectionName": "cluster", "db": "shop", "coll": "dlq"}})
        );
    }

    #[test]
    fn test_missing_pipeline() {
        let err = parse_js_processor("{ name: 'x' }").unwrap_err();
        assert!(matches!(err, PipelineParseError::MissingPipeline));
    }

    #[test]
    fn test_unbalanced_pipeline() {
        let err = parse_js_processor("{ pipeline: [ { $match: {} } ").unwrap_err();
        assert!(matches!(err, PipelineParseError::Unbalanced));
    }

    #[test]
    fn test_invalid_pipeline_json() {
        let err = parse_js_processor("{ pipeline: [ { $match: { a: undefinedThing } } ] }")
            .unwrap_err();
        assert!(matches!(err, PipelineParseError::Json(_)));
    }

    #[test]
    fn test_bad_dlq_is_ignored() {
        let def = parse_js_processor("{ pipeline: [], options: { dlq: { db: nope } } }").unwrap();
        assert!(def.pipeline.is_empty());
        assert!(def.options.is_none());
    }

    #[test]
    fn test_js_to_json_keeps_literals() {
        assert_eq!(
            js_to_json("{ a: true, b: null, c: [1, 2,], d: 'say \"hi\"' }"),
            r#"{ "a": true, "b": null, "c": [1, 2], "d": "say \"hi\"" }"#
        );
    }

    #[test]
    fn test_quoted_keys_are_untouched() {
        assert_eq!(js_to_json(r#"{"$match": {"x": 1}}"#), r#"{"$match": {"x": 1}}"#);
    }
}
