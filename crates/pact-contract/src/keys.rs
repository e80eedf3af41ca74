//! Reserved contract keys and the built-in type-name vocabulary.

/// Engine-owned marker key recording completed initialization.
pub const KEY_INITIALIZED: &str = "initialized";
/// Engine-owned marker key recording termination.
pub const KEY_TERMINATED: &str = "terminated";
/// Engine-owned marker key holding per-channel checkpoints.
pub const KEY_CHECKPOINT: &str = "checkpoint";

/// Contract keys only the engine may write under.
pub const RESERVED_CONTRACT_KEYS: [&str; 3] = [KEY_INITIALIZED, KEY_TERMINATED, KEY_CHECKPOINT];

/// Returns whether `key` is reserved for engine bookkeeping.
#[must_use]
pub fn is_reserved_contract_key(key: &str) -> bool {
    RESERVED_CONTRACT_KEYS.contains(&key)
}

// Channel type names.
pub const TYPE_LIFECYCLE_CHANNEL: &str = "Lifecycle Event Channel";
pub const TYPE_TRIGGERED_CHANNEL: &str = "Triggered Event Channel";
pub const TYPE_DOCUMENT_UPDATE_CHANNEL: &str = "Document Update Channel";
pub const TYPE_EMBEDDED_NODE_CHANNEL: &str = "Embedded Node Channel";
pub const TYPE_TIMELINE_CHANNEL: &str = "Timeline Channel";
pub const TYPE_COMPOSITE_TIMELINE_CHANNEL: &str = "Composite Timeline Channel";

// Marker type names.
pub const TYPE_PROCESS_EMBEDDED: &str = "Process Embedded";
pub const TYPE_INITIALIZED_MARKER: &str = "Processing Initialized Marker";
pub const TYPE_TERMINATED_MARKER: &str = "Processing Terminated Marker";
pub const TYPE_CHECKPOINT_MARKER: &str = "Channel Event Checkpoint";

// Handler type names.
pub const TYPE_SEQUENTIAL_WORKFLOW: &str = "Sequential Workflow";

// Workflow step type names.
pub const TYPE_STEP_TRIGGER_EVENT: &str = "Trigger Event";
pub const TYPE_STEP_UPDATE_DOCUMENT: &str = "Update Document";
pub const TYPE_STEP_LUA_CODE: &str = "Lua Code";

/// Channel kinds the engine drives through dedicated paths (lifecycle
/// delivery, queue draining, patch cascade, emission bridging) instead of
/// external-event matching.
pub const ENGINE_MANAGED_CHANNEL_TYPES: [&str; 4] = [
    TYPE_LIFECYCLE_CHANNEL,
    TYPE_TRIGGERED_CHANNEL,
    TYPE_DOCUMENT_UPDATE_CHANNEL,
    TYPE_EMBEDDED_NODE_CHANNEL,
];

/// Returns whether `type_name` is an engine-managed channel kind.
#[must_use]
pub fn is_engine_managed_channel(type_name: &str) -> bool {
    ENGINE_MANAGED_CHANNEL_TYPES.contains(&type_name)
}

/// Built-in marker type names recognized by the loader.
pub const BUILTIN_MARKER_TYPES: [&str; 3] = [
    TYPE_INITIALIZED_MARKER,
    TYPE_TERMINATED_MARKER,
    TYPE_CHECKPOINT_MARKER,
];
