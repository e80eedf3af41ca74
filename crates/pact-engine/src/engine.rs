//! The processor engine: public entry points.

use crate::error::EngineError;
use crate::execution::Execution;
use crate::processors;
use crate::result::ProcessResult;
use pact_contract::{keys, ProcessorError, ProcessorRegistry};
use pact_node::{node_at, type_name_of};
use serde_json::Value;
use std::sync::Arc;

/// Deterministic document-processing engine.
///
/// One engine can serve many documents; each call clones the input,
/// builds a fresh [`Execution`], and returns a new document. The engine
/// performs no locking — callers serialize concurrent calls against the
/// same logical document.
pub struct ProcessorEngine {
    registry: Arc<ProcessorRegistry>,
    gas_budget: Option<u64>,
}

impl ProcessorEngine {
    /// Engine with the built-in processors registered.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = ProcessorRegistry::new();
        processors::register_builtins(&mut registry);
        Self::with_registry(registry)
    }

    /// Engine over a caller-assembled registry. Built-ins are NOT added
    /// implicitly; use [`processors::register_builtins`] when composing.
    #[must_use]
    pub fn with_registry(registry: ProcessorRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            gas_budget: None,
        }
    }

    /// Installs a gas budget; exhaustion fatally terminates the scope
    /// that crosses it.
    #[must_use]
    pub fn with_gas_budget(mut self, budget: u64) -> Self {
        self.gas_budget = Some(budget);
        self
    }

    /// Initializes a document: recursive scope initialization from the
    /// root, lifecycle delivery, `initialized` markers.
    ///
    /// # Errors
    ///
    /// [`EngineError::IllegalState`] when the document is already
    /// initialized or carries an ill-formed initialization marker.
    pub fn initialize_document(&self, document: &Value) -> Result<ProcessResult, EngineError> {
        match self.initialization_marker(document)? {
            Some(_) => Err(EngineError::IllegalState {
                reason: "document already initialized".to_string(),
            }),
            None => self.run(document, |execution| execution.initialize_scope("/", true)),
        }
    }

    /// Applies one external event to an initialized document.
    ///
    /// # Errors
    ///
    /// [`EngineError::IllegalState`] when the document has not been
    /// initialized.
    pub fn process_document(
        &self,
        document: &Value,
        event: &Value,
    ) -> Result<ProcessResult, EngineError> {
        if self.initialization_marker(document)?.is_none() {
            return Err(EngineError::IllegalState {
                reason: "document not initialized".to_string(),
            });
        }
        let event = event.clone();
        self.run(document, move |execution| {
            execution.load_scope_bundle("/")?;
            execution.process_external_event("/", &event)
        })
    }

    /// Pure predicate: does the document carry a well-formed
    /// initialization marker at its root?
    #[must_use]
    pub fn is_initialized(&self, document: &Value) -> bool {
        matches!(self.initialization_marker(document), Ok(Some(_)))
    }

    fn run(
        &self,
        document: &Value,
        action: impl FnOnce(&mut Execution) -> Result<(), ProcessorError>,
    ) -> Result<ProcessResult, EngineError> {
        let mut execution = Execution::new(
            document.clone(),
            Arc::clone(&self.registry),
            self.gas_budget,
        );
        match action(&mut execution) {
            Ok(()) | Err(ProcessorError::RunTerminated) => Ok(execution.into_result()),
            Err(ProcessorError::MustUnderstand { reason }) => {
                tracing::warn!(%reason, "run aborted on unsupported contract");
                Ok(ProcessResult {
                    document: document.clone(),
                    triggered_events: Vec::new(),
                    total_gas: execution.into_result().total_gas,
                    capability_failure: Some(reason),
                })
            }
            Err(ProcessorError::Fatal { reason }) => {
                // a fatal escaping to the entry point belongs to the root scope
                match execution.enter_fatal_termination("/", Some(&reason)) {
                    Ok(()) | Err(ProcessorError::RunTerminated) => {}
                    Err(other) => {
                        tracing::error!(error = %other, "root termination bookkeeping failed");
                    }
                }
                Ok(execution.into_result())
            }
            Err(ProcessorError::IllegalState { reason }) => {
                Err(EngineError::IllegalState { reason })
            }
        }
    }

    /// The root initialization marker, validated for shape.
    fn initialization_marker<'a>(
        &self,
        document: &'a Value,
    ) -> Result<Option<&'a Value>, EngineError> {
        let Some(marker) = node_at(document, &format!("/contracts/{}", keys::KEY_INITIALIZED))
        else {
            return Ok(None);
        };
        if type_name_of(marker) != Some(keys::TYPE_INITIALIZED_MARKER) {
            return Err(EngineError::IllegalState {
                reason: format!(
                    "initialization marker must declare type '{}'",
                    keys::TYPE_INITIALIZED_MARKER
                ),
            });
        }
        Ok(Some(marker))
    }
}

impl Default for ProcessorEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initialize_marks_the_root() {
        let engine = ProcessorEngine::new();
        let doc = json!({"x": 1, "contracts": {}});
        let result = engine.initialize_document(&doc).unwrap();
        assert!(engine.is_initialized(&result.document));
        assert!(result.is_success());
        assert!(result.total_gas > 0);
        // exactly one root lifecycle event
        assert_eq!(result.triggered_events.len(), 1);
        assert_eq!(
            result.triggered_events[0]["type"],
            "Document Processing Initiated"
        );
        assert!(result.triggered_events[0]["documentId"].is_string());
    }

    #[test]
    fn double_initialization_is_illegal_state() {
        let engine = ProcessorEngine::new();
        let doc = json!({"contracts": {}});
        let initialized = engine.initialize_document(&doc).unwrap().document;
        let err = engine.initialize_document(&initialized).unwrap_err();
        assert!(matches!(err, EngineError::IllegalState { .. }));
    }

    #[test]
    fn processing_requires_initialization() {
        let engine = ProcessorEngine::new();
        let err = engine
            .process_document(&json!({"contracts": {}}), &json!({"type": "Ping"}))
            .unwrap_err();
        assert!(matches!(err, EngineError::IllegalState { .. }));
    }

    #[test]
    fn malformed_marker_is_illegal_state() {
        let engine = ProcessorEngine::new();
        let doc = json!({"contracts": {"initialized": {"type": "Wrong Marker"}}});
        assert!(engine.initialize_document(&doc).is_err());
        assert!(!engine.is_initialized(&doc));
    }

    #[test]
    fn is_initialized_is_pure() {
        let engine = ProcessorEngine::new();
        let doc = json!({"contracts": {}});
        assert!(!engine.is_initialized(&doc));
        assert!(!engine.is_initialized(&doc));
    }
}
