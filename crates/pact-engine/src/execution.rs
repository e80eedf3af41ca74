//! Run-scoped execution state.
//!
//! One [`Execution`] is created per engine call and discarded after the
//! result is produced. It owns the cloned document, the gas meter, the
//! per-scope runtime state (triggered queues, bridgeable emissions), the
//! bundle cache, and the termination bookkeeping. All engine components
//! are implemented as method families on this type (see the sibling
//! modules), which keeps the whole call single-threaded over one
//! exclusive document.

use crate::patch;
use crate::result::ProcessResult;
use pact_contract::{keys, ContractBundle, ProcessorError, ProcessorRegistry};
use pact_event::TerminationCause;
use pact_gas::GasMeter;
use pact_node::{node_at, pointer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

/// Per-scope runtime state living only for the duration of one call.
#[derive(Debug, Default)]
pub(crate) struct ScopeState {
    /// FIFO queue of internally emitted events, drained at finalization.
    pub triggered: VecDeque<Value>,
    /// Emissions awaiting bridging into the parent scope.
    pub bridgeable: Vec<Value>,
}

/// State of one `initialize_document` / `process_document` call.
pub(crate) struct Execution {
    pub document: Value,
    pub meter: GasMeter,
    pub registry: Arc<ProcessorRegistry>,
    /// Bundle snapshots per scope, refreshed on every scope (re-)entry.
    pub bundles: BTreeMap<String, ContractBundle>,
    pub scope_states: BTreeMap<String, ScopeState>,
    /// Terminations requested but not yet persisted as markers.
    pub pending_terminations: BTreeMap<String, TerminationCause>,
    /// Scopes whose root was removed or replaced wholesale this run.
    pub cut_off: BTreeSet<String>,
    /// Events emitted at the root scope, in order.
    pub root_emissions: Vec<Value>,
}

impl Execution {
    pub fn new(document: Value, registry: Arc<ProcessorRegistry>, gas_budget: Option<u64>) -> Self {
        Self {
            document,
            meter: gas_budget.map_or_else(GasMeter::new, GasMeter::with_budget),
            registry,
            bundles: BTreeMap::new(),
            scope_states: BTreeMap::new(),
            pending_terminations: BTreeMap::new(),
            cut_off: BTreeSet::new(),
            root_emissions: Vec::new(),
        }
    }

    pub fn scope_state_mut(&mut self, scope: &str) -> &mut ScopeState {
        self.scope_states
            .entry(pointer::normalize(scope))
            .or_default()
    }

    /// Whether a persisted termination marker exists for `scope`.
    pub fn is_scope_terminated(&self, scope: &str) -> bool {
        let marker_path = pointer::resolve(scope, "/contracts");
        node_at(&self.document, &marker_path)
            .and_then(|contracts| contracts.get(keys::KEY_TERMINATED))
            .is_some()
    }

    /// The single inactivity predicate: cut off, pending termination, or
    /// persisted termination — on the scope or any of its ancestors, so a
    /// terminated scope's descendants stop dispatching too.
    pub fn is_scope_inactive(&self, scope: &str) -> bool {
        let normalized = pointer::normalize(scope);
        let mut chain = vec![normalized.clone()];
        chain.extend(pointer::ancestors(&normalized));
        chain.iter().any(|s| {
            self.cut_off.contains(s)
                || self.pending_terminations.contains_key(s)
                || self.is_scope_terminated(s)
        })
    }

    /// Marks an embedded scope cut off after its root was removed or
    /// replaced wholesale.
    pub fn mark_cut_off(&mut self, scope: &str) {
        let normalized = pointer::normalize(scope);
        if self.cut_off.insert(normalized.clone()) {
            tracing::debug!(scope = %normalized, "embedded scope cut off");
        }
    }

    /// Records an emission for bridging into the parent; root-scope
    /// emissions are also part of the run result.
    pub fn record_bridgeable(&mut self, scope: &str, event: Value) {
        let normalized = pointer::normalize(scope);
        if normalized == "/" {
            self.root_emissions.push(event.clone());
        }
        self.scope_state_mut(&normalized).bridgeable.push(event);
    }

    /// Emits an event from inside a scope: charged, queued on the scope's
    /// triggered queue, and recorded for bridging.
    pub fn emit_from(&mut self, scope: &str, event: Value) {
        self.meter.charge_emit_event(&event);
        let normalized = pointer::normalize(scope);
        self.scope_state_mut(&normalized)
            .triggered
            .push_back(event.clone());
        self.record_bridgeable(&normalized, event);
    }

    /// Engine-internal write bypassing the patch envelope.
    pub fn direct_write(&mut self, ptr: &str, value: Option<Value>) -> Result<(), ProcessorError> {
        patch::direct_write(&mut self.document, ptr, value)
            .map_err(|e| ProcessorError::fatal(format!("bookkeeping write failed: {e}")))
    }

    /// Converts remaining budget checks into the fatal tier.
    pub fn check_gas(&self, during: &str) -> Result<(), ProcessorError> {
        if self.meter.is_exhausted() {
            return Err(ProcessorError::fatal(format!(
                "gas budget exhausted during {during} (total {})",
                self.meter.total()
            )));
        }
        Ok(())
    }

    pub fn into_result(self) -> ProcessResult {
        ProcessResult {
            document: self.document,
            triggered_events: self.root_emissions,
            total_gas: self.meter.total(),
            capability_failure: None,
        }
    }
}
