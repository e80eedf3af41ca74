//! Typed contract model.
//!
//! Deserializing a contract node into its typed struct *is* the schema
//! validation step: missing required fields or mistyped values surface as
//! `serde` errors and become fatal load errors tagged with the offending
//! contract key. Unknown fields (names, descriptions, the `type`
//! discriminator itself) are tolerated everywhere.

use pact_event::TerminationCause;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fires once per scope, at initialization.
///
/// An optional `event` pattern restricts delivery to lifecycle events it
/// is structurally contained in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleChannel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Value>,
}

/// Consumes the scope's internal triggered-event queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredChannel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Value>,
}

/// Fires when a watched scope-relative path changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpdateChannel {
    pub path: String,
}

/// Bridges an embedded child scope's emissions into this scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedNodeChannel {
    /// Scope-relative pointer to the embedded child's root.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Value>,
}

/// Matches timeline entries from one external timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineChannel {
    pub timeline_id: String,
}

/// Fans one event out across several sibling timeline channels, each with
/// an independent, namespaced checkpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeTimelineChannel {
    #[serde(default)]
    pub channels: Vec<String>,
}

/// Declares which child pointers are processed as embedded scopes.
/// Singular per scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEmbedded {
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Engine-written marker recording completed initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializedMarker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

/// Engine-written marker recording termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminatedMarker {
    pub cause: TerminationCause,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Engine-written marker holding the last accepted event and signature
/// per channel key. Singular per scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointMarker {
    #[serde(default)]
    pub last_events: BTreeMap<String, Value>,
    #[serde(default)]
    pub last_signatures: BTreeMap<String, String>,
}

/// Ordered workflow of typed steps, bound to one channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequentialWorkflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub steps: Vec<Value>,
}
