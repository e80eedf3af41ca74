//! Per-invocation handler execution context.
//!
//! Implements the SPI's [`HandlerContext`] over the live [`Execution`].
//! Effects are suppressed once the scope goes inactive (unless the
//! context was created for terminated-work delivery), which is how a
//! mid-channel termination halts the rest of a handler's side effects
//! without unwinding it.

use crate::execution::Execution;
use pact_contract::{HandlerContext, ProcessorError};
use pact_event::Patch;
use pact_gas::GasMeter;
use pact_node::{node_at, pointer, resolve_at};
use serde_json::Value;

pub(crate) struct ExecutionContext<'a> {
    exec: &'a mut Execution,
    scope_path: String,
    event: Value,
    allow_terminated_work: bool,
    allow_reserved_mutation: bool,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        exec: &'a mut Execution,
        scope_path: &str,
        event: Value,
        allow_terminated_work: bool,
        allow_reserved_mutation: bool,
    ) -> Self {
        Self {
            exec,
            scope_path: pointer::normalize(scope_path),
            event,
            allow_terminated_work,
            allow_reserved_mutation,
        }
    }

    fn skip_terminated_work(&self) -> bool {
        !self.allow_terminated_work && self.exec.is_scope_inactive(&self.scope_path)
    }
}

impl HandlerContext for ExecutionContext<'_> {
    fn scope_path(&self) -> &str {
        &self.scope_path
    }

    fn event(&self) -> &Value {
        &self.event
    }

    fn gas(&mut self) -> &mut GasMeter {
        &mut self.exec.meter
    }

    fn apply_patch(&mut self, patch: Patch) -> Result<(), ProcessorError> {
        if self.skip_terminated_work() {
            return Ok(());
        }
        let scope = self.scope_path.clone();
        self.exec
            .handle_patch(&scope, &patch, self.allow_reserved_mutation)
    }

    fn emit_event(&mut self, event: Value) -> Result<(), ProcessorError> {
        if self.skip_terminated_work() {
            return Ok(());
        }
        let scope = self.scope_path.clone();
        self.exec.emit_from(&scope, event);
        Ok(())
    }

    fn resolve_pointer(&self, relative: &str) -> String {
        pointer::resolve(&self.scope_path, relative)
    }

    fn document_at(&self, absolute: &str) -> Option<Value> {
        node_at(&self.exec.document, absolute).cloned()
    }

    fn document_resolve(&self, absolute: &str) -> Option<Value> {
        resolve_at(&self.exec.document, absolute)
    }

    fn document_contains(&self, absolute: &str) -> bool {
        node_at(&self.exec.document, absolute).is_some()
    }

    fn terminate_gracefully(&mut self, reason: Option<String>) -> Result<(), ProcessorError> {
        let scope = self.scope_path.clone();
        self.exec
            .enter_graceful_termination(&scope, reason.as_deref())
    }

    fn terminate_fatally(&mut self, reason: Option<String>) -> Result<(), ProcessorError> {
        let scope = self.scope_path.clone();
        self.exec.enter_fatal_termination(&scope, reason.as_deref())
    }
}
