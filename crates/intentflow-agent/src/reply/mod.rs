//! Normalization of free-form model replies.
//!
//! Models are asked for JSON but routinely wrap it in markdown fences, omit
//! keys, or use the wrong scalar type.  Everything here is lenient: readers
//! take a named default and never fail on a missing or mistyped field.
//!
//! - [`strip_code_fences`] -- remove a surrounding ```` ```json ```` block.
//! - `*_or` readers -- pull typed fields out of a [`serde_json::Value`] tree.
//! - [`scan`] -- string scanning for bodies that are not valid JSON at all.

pub mod scan;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Fence stripping
// ---------------------------------------------------------------------------

/// Strip markdown code fences from around a model reply.
///
/// Removes leading ```` ```json ```` (or bare ```` ``` ````) markers and
/// trailing ```` ``` ```` markers until none remain, trimming whitespace on
/// both sides.  Text without fences is returned trimmed and otherwise
/// untouched.
pub fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();
    loop {
        let next = strip_fence_once(cleaned);
        if next.len() == cleaned.len() {
            return cleaned;
        }
        cleaned = next;
    }
}

fn strip_fence_once(text: &str) -> &str {
    let cleaned = match text.strip_prefix("```json") {
        Some(rest) => rest,
        None => text.strip_prefix("```").unwrap_or(text),
    };
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned);
    cleaned.trim()
}

// ---------------------------------------------------------------------------
// Tree readers
// ---------------------------------------------------------------------------

/// Look up `key` on an object node, treating JSON `null` as absent.
fn present<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    node.get(key).filter(|v| !v.is_null())
}

/// Render any JSON value as text: strings verbatim, everything else compact.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Text field, or `default` when absent.
pub fn text_or(node: &Value, key: &str, default: &str) -> String {
    present(node, key).map_or_else(|| default.to_owned(), render)
}

/// Optional text field; absent stays absent.
pub fn opt_text(node: &Value, key: &str) -> Option<String> {
    present(node, key).map(render)
}

/// Boolean field.  Accepts JSON booleans, `"true"`/`"false"` strings and
/// numbers (non-zero is true).
pub fn bool_or(node: &Value, key: &str, default: bool) -> bool {
    match present(node, key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => default,
        },
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => default,
    }
}

/// Floating-point field.  Accepts numbers and numeric strings.
pub fn f64_or(node: &Value, key: &str, default: f64) -> f64 {
    match present(node, key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Integer field.  Accepts integers, floats (truncated) and numeric strings.
pub fn i64_or(node: &Value, key: &str, default: i64) -> i64 {
    present(node, key).and_then(as_int).unwrap_or(default)
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// List of strings; non-string items are rendered as text.
pub fn string_list(node: &Value, key: &str) -> Vec<String> {
    present(node, key)
        .and_then(Value::as_array)
        .map(|items| items.iter().map(render).collect())
        .unwrap_or_default()
}

/// List of integers; items that are not numeric are skipped.
pub fn int_list(node: &Value, key: &str) -> Vec<i64> {
    present(node, key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(as_int).collect())
        .unwrap_or_default()
}

/// A scalar parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Flag(bool),
    Text(String),
}

/// Parameter map.  Strings and numbers become text, booleans stay booleans,
/// and nested structures are kept as compact JSON text.
pub fn param_map(node: &Value, key: &str) -> BTreeMap<String, ParamValue> {
    present(node, key)
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| {
                    let value = match v {
                        Value::Bool(b) => ParamValue::Flag(*b),
                        other => ParamValue::Text(render(other)),
                    };
                    (k.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn strips_json_fence() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(text), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_fence() {
        let text = "  ```\n{\"a\": 1}\n```  ";
        assert_eq!(strip_code_fences(text), "{\"a\": 1}");
    }

    #[test]
    fn unfenced_text_is_only_trimmed() {
        assert_eq!(strip_code_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn stripping_is_idempotent() {
        for text in [
            "```json\n{\"a\": 1}\n```",
            "```\n[1, 2]\n```",
            "```json\n{\"a\":1}\n```\n```",
            "```json\n```json\n{\"a\":1}\n```",
            "```",
            "{\"plain\": true}",
            "not json at all",
        ] {
            let once = strip_code_fences(text);
            assert_eq!(strip_code_fences(once), once, "input: {text:?}");
        }
    }

    #[test]
    fn stacked_trailing_fences_are_all_removed() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```\n```"), "{\"a\":1}");
    }

    #[test]
    fn fenced_and_unfenced_parse_identically() {
        let body = r#"{"isWorkflowIntent": true, "confidence": 0.9}"#;
        let fenced = format!("```json\n{body}\n```");
        let a: Value = serde_json::from_str(strip_code_fences(body)).unwrap();
        let b: Value = serde_json::from_str(strip_code_fences(&fenced)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn text_reader_defaults_on_missing_and_null() {
        let node = json!({"a": "x", "b": null, "n": 12, "o": {"k": 1}});
        assert_eq!(text_or(&node, "a", "d"), "x");
        assert_eq!(text_or(&node, "b", "d"), "d");
        assert_eq!(text_or(&node, "missing", "d"), "d");
        assert_eq!(text_or(&node, "n", "d"), "12");
        assert_eq!(text_or(&node, "o", "d"), r#"{"k":1}"#);
        assert_eq!(opt_text(&node, "b"), None);
    }

    #[test]
    fn bool_reader_is_lenient() {
        let node = json!({"t": true, "s": "TRUE", "f": "false", "n": 0, "junk": "maybe"});
        assert!(bool_or(&node, "t", false));
        assert!(bool_or(&node, "s", false));
        assert!(!bool_or(&node, "f", true));
        assert!(!bool_or(&node, "n", true));
        assert!(bool_or(&node, "junk", true));
        assert!(!bool_or(&node, "missing", false));
    }

    #[test]
    fn numeric_readers_accept_strings_and_floats() {
        let node = json!({"f": "0.85", "i": 90.7, "s": " 42 ", "bad": "soon"});
        assert!((f64_or(&node, "f", 0.0) - 0.85).abs() < f64::EPSILON);
        assert_eq!(i64_or(&node, "i", 0), 90);
        assert_eq!(i64_or(&node, "s", 0), 42);
        assert_eq!(i64_or(&node, "bad", 7), 7);
    }

    #[test]
    fn lists_preserve_order_and_skip_non_numeric() {
        let node = json!({"names": ["b", "a", 3], "nums": [2, "1", "step one", 3.0]});
        assert_eq!(string_list(&node, "names"), vec!["b", "a", "3"]);
        assert_eq!(int_list(&node, "nums"), vec![2, 1, 3]);
        assert!(string_list(&node, "missing").is_empty());
    }

    #[test]
    fn param_map_keeps_scalars() {
        let node = json!({"p": {"speed": 5, "unit": "m", "on": true, "nested": [1]}});
        let map = param_map(&node, "p");
        assert_eq!(map["speed"], ParamValue::Text("5".into()));
        assert_eq!(map["unit"], ParamValue::Text("m".into()));
        assert_eq!(map["on"], ParamValue::Flag(true));
        assert_eq!(map["nested"], ParamValue::Text("[1]".into()));
    }

    #[test]
    fn param_map_serializes_in_key_order() {
        let node = json!({"p": {"zeta": 1, "alpha": "a", "mid": false}});
        let text = serde_json::to_string(&param_map(&node, "p")).unwrap();
        assert_eq!(text, r#"{"alpha":"a","mid":false,"zeta":"1"}"#);
    }

}
