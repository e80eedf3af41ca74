//! Node lookup and structural helpers.
//!
//! [`node_at`] walks a document by pointer without copying. [`resolve_at`]
//! additionally understands the computed `documentId` trailing segment,
//! returning an owned snapshot where a computed value has no storage
//! representation to borrow.

use crate::canonical::content_id;
use crate::pointer;
use serde_json::Value;

/// Trailing pointer segment resolving to the content-derived id of the
/// node it follows.
pub const SEGMENT_DOCUMENT_ID: &str = "documentId";

/// Returns the node at `pointer`, or `None` if the path does not exist.
///
/// Numeric segments index lists; all other segments name object
/// properties. No computed segments are resolved here.
#[must_use]
pub fn node_at<'a>(root: &'a Value, ptr: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in pointer::segments(ptr) {
        current = step(current, &segment)?;
    }
    Some(current)
}

/// Returns a snapshot of the node at `pointer`, resolving the computed
/// `documentId` segment when it appears in final position.
///
/// `/a/b/documentId` yields the content-derived id of `/a/b` as a string
/// scalar when `/a/b` has no literal `documentId` property of its own.
#[must_use]
pub fn resolve_at(root: &Value, ptr: &str) -> Option<Value> {
    if let Some(node) = node_at(root, ptr) {
        return Some(node.clone());
    }
    let parent = pointer::parent(ptr)?;
    let last = pointer::segments(ptr).pop()?;
    if last == SEGMENT_DOCUMENT_ID {
        let node = node_at(root, &parent)?;
        return Some(Value::String(content_id(node)));
    }
    None
}

/// Extracts a node's type name from its `type` property.
///
/// Accepts both spellings: a plain string (`"type": "Timeline Channel"`)
/// and an object carrying a `name` property.
#[must_use]
pub fn type_name_of(node: &Value) -> Option<&str> {
    match node.get("type")? {
        Value::String(name) => Some(name.as_str()),
        Value::Object(map) => map.get("name").and_then(Value::as_str),
        _ => None,
    }
}

/// Structural containment: every leaf of `pattern` must appear at the same
/// position in `value` with an equal scalar.
///
/// Objects match per-key, lists positionally; an empty pattern object
/// matches any object. Used for channel `event` pattern matching.
#[must_use]
pub fn deep_contains(value: &Value, pattern: &Value) -> bool {
    match (value, pattern) {
        (Value::Object(v), Value::Object(p)) => p
            .iter()
            .all(|(key, pv)| v.get(key).is_some_and(|vv| deep_contains(vv, pv))),
        (Value::Array(v), Value::Array(p)) => {
            p.len() <= v.len() && p.iter().zip(v).all(|(pv, vv)| deep_contains(vv, pv))
        }
        (v, p) => v == p,
    }
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => {
            let index: usize = segment.parse().ok()?;
            items.get(index)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn walks_objects_and_lists() {
        let doc = json!({"a": {"b": [10, {"c": true}]}});
        assert_eq!(node_at(&doc, "/a/b/0"), Some(&json!(10)));
        assert_eq!(node_at(&doc, "/a/b/1/c"), Some(&json!(true)));
        assert_eq!(node_at(&doc, "/"), Some(&doc));
        assert!(node_at(&doc, "/a/missing").is_none());
        assert!(node_at(&doc, "/a/b/7").is_none());
    }

    #[test]
    fn document_id_segment_is_computed() {
        let doc = json!({"a": {"x": 1}});
        let resolved = resolve_at(&doc, "/a/documentId").unwrap();
        assert_eq!(resolved, json!(content_id(&json!({"x": 1}))));
    }

    #[test]
    fn literal_document_id_wins_over_computed() {
        let doc = json!({"a": {"documentId": "explicit"}});
        assert_eq!(resolve_at(&doc, "/a/documentId"), Some(json!("explicit")));
    }

    #[test]
    fn type_name_both_spellings() {
        assert_eq!(
            type_name_of(&json!({"type": "Timeline Channel"})),
            Some("Timeline Channel")
        );
        assert_eq!(
            type_name_of(&json!({"type": {"name": "Timeline Channel"}})),
            Some("Timeline Channel")
        );
        assert_eq!(type_name_of(&json!({"x": 1})), None);
    }

    #[test]
    fn deep_contains_matches_subset() {
        let event = json!({"type": "Ping", "payload": {"n": 3, "extra": true}});
        assert!(deep_contains(&event, &json!({"type": "Ping"})));
        assert!(deep_contains(&event, &json!({"payload": {"n": 3}})));
        assert!(!deep_contains(&event, &json!({"payload": {"n": 4}})));
        assert!(deep_contains(&event, &json!({})));
    }
}
