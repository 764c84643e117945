//! Query-string encoding.
//!
//! ```text
//! {"page": 2, "q": "a b", "filter": {"tag": "x"}, "empty": ""}
//!   → page=2&q=a%20b&filter%5Btag%5D=x
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

// ============================================================================
// Functions
// ============================================================================

/// Returns `true` for `null`, `""`, `[]` and `{}`.
#[must_use]
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(members) => members.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Encodes `params` as a query string, without the leading `?`.
///
/// A string is percent-encoded whole. Object members with blank values are
/// skipped, nested objects become `outer%5Binner%5D=value`, and arrays are
/// joined with commas.
#[must_use]
pub fn encode_query(params: &Value) -> String {
    match params {
        Value::Object(_) => {
            let mut pairs = Vec::new();
            push_pairs(params, None, &mut pairs);
            pairs.join("&")
        }
        other => urlencoding::encode(&scalar(other)).into_owned(),
    }
}

fn push_pairs(value: &Value, prefix: Option<&str>, pairs: &mut Vec<String>) {
    let Value::Object(members) = value else {
        return;
    };

    for (key, value) in members {
        if is_blank(value) {
            continue;
        }

        let name = match prefix {
            Some(prefix) => format!("{prefix}%5B{key}%5D"),
            None => key.clone(),
        };

        if value.is_object() {
            push_pairs(value, Some(&name), pairs);
        } else {
            pairs.push(format!("{name}={}", urlencoding::encode(&scalar(value))));
        }
    }
}

/// Text form of a non-object value.
fn scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(scalar).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
