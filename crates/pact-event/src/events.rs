//! Engine-synthesized event constructors.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Type name of the lifecycle event delivered at scope initialization.
pub const TYPE_LIFECYCLE_EVENT: &str = "Document Processing Initiated";

/// Type name of the event emitted when a scope terminates.
pub const TYPE_TERMINATION_EVENT: &str = "Document Processing Terminated";

/// Type name of the event synthesized for document-update channels.
pub const TYPE_DOCUMENT_UPDATE: &str = "Document Update";

/// Why a scope terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminationCause {
    /// Requested by a contract; orderly shutdown of the scope.
    Graceful,
    /// Boundary violation, handler failure, or resource exhaustion.
    Fatal,
}

impl TerminationCause {
    /// Wire spelling of the cause.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Graceful => "graceful",
            Self::Fatal => "fatal",
        }
    }
}

/// Error parsing a [`TerminationCause`] from its wire spelling.
#[derive(Debug, Clone, Error)]
#[error("unknown termination cause: {0}")]
pub struct ParseCauseError(String);

impl std::str::FromStr for TerminationCause {
    type Err = ParseCauseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "graceful" => Ok(Self::Graceful),
            "fatal" => Ok(Self::Fatal),
            other => Err(ParseCauseError(other.to_string())),
        }
    }
}

/// Builds the lifecycle event carrying the content-derived document id.
#[must_use]
pub fn lifecycle_event(document_id: &str) -> Value {
    json!({
        "type": TYPE_LIFECYCLE_EVENT,
        "documentId": document_id,
    })
}

/// Builds the termination event for observers and parent bridging.
#[must_use]
pub fn termination_event(cause: TerminationCause, reason: Option<&str>) -> Value {
    let mut event = json!({
        "type": TYPE_TERMINATION_EVENT,
        "cause": cause.as_str(),
    });
    if let Some(reason) = reason {
        event["reason"] = Value::String(reason.to_string());
    }
    event
}

/// Builds the document-update event delivered on the patch cascade.
///
/// `path` is already relative to the observing scope; absent `before` /
/// `after` snapshots are carried as explicit nulls so handlers see a
/// stable shape.
#[must_use]
pub fn document_update_event(
    op: crate::PatchOp,
    relative_path: &str,
    before: Option<&Value>,
    after: Option<&Value>,
) -> Value {
    json!({
        "type": TYPE_DOCUMENT_UPDATE,
        "op": op.as_str(),
        "path": relative_path,
        "before": before.cloned().unwrap_or(Value::Null),
        "after": after.cloned().unwrap_or(Value::Null),
    })
}
