//! The patch envelope: one mutation against the document tree.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Patch operation kind.
///
/// | Kind | Target requirement | `val` |
/// |------|--------------------|-------|
/// | `Add` | parent createable; list index ≤ len or `-` | required |
/// | `Replace` | parent createable; list index in range | required |
/// | `Remove` | full path must pre-exist | absent |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

impl PatchOp {
    /// Wire spelling of the operation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Replace => "REPLACE",
            Self::Remove => "REMOVE",
        }
    }

    /// Parses a case-insensitive wire spelling.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_uppercase().as_str() {
            "ADD" => Some(Self::Add),
            "REPLACE" => Some(Self::Replace),
            "REMOVE" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// A single mutation request: `{ op, path, val? }`.
///
/// Paths are pointers; whether they are scope-relative or absolute is
/// decided by the submitting surface (workflow steps resolve against
/// their scope before submission).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub op: PatchOp,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val: Option<Value>,
}

impl Patch {
    #[must_use]
    pub fn add(path: impl Into<String>, val: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            val: Some(val),
        }
    }

    #[must_use]
    pub fn replace(path: impl Into<String>, val: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            val: Some(val),
        }
    }

    #[must_use]
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            val: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn op_round_trips_wire_spelling() {
        assert_eq!(PatchOp::parse("add"), Some(PatchOp::Add));
        assert_eq!(PatchOp::parse("Replace"), Some(PatchOp::Replace));
        assert_eq!(PatchOp::parse("REMOVE"), Some(PatchOp::Remove));
        assert_eq!(PatchOp::parse("move"), None);
        assert_eq!(PatchOp::Add.as_str(), "ADD");
    }

    #[test]
    fn patch_serializes_without_null_val() {
        let patch = Patch::remove("/x");
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, json!({"op": "REMOVE", "path": "/x"}));
    }

    #[test]
    fn patch_deserializes_from_wire() {
        let patch: Patch =
            serde_json::from_value(json!({"op": "ADD", "path": "/x", "val": 5})).unwrap();
        assert_eq!(patch, Patch::add("/x", json!(5)));
    }
}
