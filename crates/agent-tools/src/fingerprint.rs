//! Stable request fingerprints for caching and de-duplication

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex-encoded SHA-256 over a tool name and its canonical arguments
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a tool call
    ///
    /// Equal fingerprints mean equal requests after normalization: key order,
    /// null-valued fields and surrounding or repeated whitespace in strings
    /// do not matter. The tool name is case-insensitive.
    pub fn compute(tool: &str, args: &Value) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(tool.trim().to_lowercase().as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical_json(args).as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialize a value with sorted keys, no null fields and normalized strings
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => out.push_str(&value.to_string()),
        Value::String(s) => {
            let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
            out.push_str(&Value::String(normalized).to_string());
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k)
                .collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_and_nulls_ignored() {
        let a = Fingerprint::compute(
            "web_search",
            &json!({"query": "bank outlook", "max_results": 5, "domains": null}),
        );
        let b = Fingerprint::compute(
            "Web_Search ",
            &json!({"max_results": 5, "query": "  bank   outlook "}),
        );
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_different_args_differ() {
        let a = Fingerprint::compute("web_search", &json!({"query": "a"}));
        let b = Fingerprint::compute("web_search", &json!({"query": "b"}));
        let c = Fingerprint::compute("stock_data", &json!({"query": "a"}));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_array_order_is_significant() {
        let a = Fingerprint::compute("t", &json!({"symbols": ["A", "B"]}));
        let b = Fingerprint::compute("t", &json!({"symbols": ["B", "A"]}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_canonical_json_nested() {
        let value = json!({"b": {"y": 1, "x": [true, null]}, "a": "v"});
        assert_eq!(canonical_json(&value), r#"{"a":"v","b":{"x":[true,null],"y":1}}"#);
    }
}
