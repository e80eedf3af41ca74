//! The run result.

use serde_json::Value;

/// Outcome of one `initialize_document` / `process_document` call.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// The resulting document (the input document is never mutated).
    pub document: Value,
    /// Events emitted at the root scope, in emission order.
    pub triggered_events: Vec<Value>,
    /// Total gas charged, reported regardless of outcome.
    pub total_gas: u64,
    /// Set when an unsupported contract type aborted the run; the
    /// document is then byte-for-byte the input.
    pub capability_failure: Option<String>,
}

impl ProcessResult {
    /// Whether the run completed without a capability failure.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.capability_failure.is_none()
    }
}
