//! Canonical JSON form and content-derived identifiers.
//!
//! The canonical form of a node is its JSON serialization with object keys
//! sorted lexicographically and no insignificant whitespace. Two nodes with
//! the same structure share one canonical form, which makes it the basis
//! for both content ids and structural event signatures.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serializes a node into its canonical JSON form.
///
/// Object keys are emitted in sorted order regardless of insertion order,
/// so the output is a stable function of structure alone.
#[must_use]
pub fn canonical_json(node: &Value) -> String {
    let mut out = String::new();
    write_canonical(node, &mut out);
    out
}

/// Byte length of the canonical form, used for size-sensitive gas charges.
#[must_use]
pub fn canonical_size(node: &Value) -> usize {
    canonical_json(node).len()
}

/// Computes the content-derived identifier of a node.
///
/// Lowercase hex SHA-256 of the canonical JSON form. Structurally identical
/// nodes always share an id; any structural change produces a new one.
#[must_use]
pub fn content_id(node: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(node).as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn write_canonical(node: &Value, out: &mut String) {
    match node {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
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
        // Scalars already serialize deterministically.
        other => {
            out.push_str(&other.to_string());
        }
    }
}

fn write_json_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_string()).to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_is_irrelevant() {
        let a = json!({"x": 1, "y": {"b": 2, "a": 3}});
        let b = json!({"y": {"a": 3, "b": 2}, "x": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(content_id(&a), content_id(&b));
    }

    #[test]
    fn structural_change_changes_id() {
        let a = json!({"x": 1});
        let b = json!({"x": 2});
        assert_ne!(content_id(&a), content_id(&b));
    }

    #[test]
    fn canonical_form_is_compact_and_sorted() {
        let node = json!({"b": [1, 2], "a": "hi"});
        assert_eq!(canonical_json(&node), r#"{"a":"hi","b":[1,2]}"#);
    }

    #[test]
    fn id_is_hex_sha256() {
        let id = content_id(&json!(null));
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn canonical_size_matches_form() {
        let node = json!({"a": 1});
        assert_eq!(canonical_size(&node), canonical_json(&node).len());
    }
}
