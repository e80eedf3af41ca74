//! Termination service: ACTIVE → GRACEFUL | FATAL, exactly once.
//!
//! Termination is monotone. It persists a `terminated` marker under the
//! scope's contracts (bypassing boundary checks — the marker is engine
//! bookkeeping), emits a termination event recorded for parent bridging,
//! and from then on the inactivity predicate suppresses all dispatch in
//! the scope and its descendants. Already-applied patches stand.
//!
//! Terminating the root scope ends the run: the sentinel
//! [`ProcessorError::RunTerminated`] unwinds every recursive call and the
//! partial result is returned as success.

use crate::execution::Execution;
use pact_contract::keys;
use pact_contract::ProcessorError;
use pact_event::{termination_event, TerminationCause};
use pact_node::pointer;
use serde_json::json;

impl Execution {
    /// Requests graceful termination of `scope`. No-op when the scope is
    /// already pending or terminated.
    pub(crate) fn enter_graceful_termination(
        &mut self,
        scope: &str,
        reason: Option<&str>,
    ) -> Result<(), ProcessorError> {
        self.terminate(scope, TerminationCause::Graceful, reason)
    }

    /// Requests fatal termination of `scope`. No-op when the scope is
    /// already pending or terminated.
    pub(crate) fn enter_fatal_termination(
        &mut self,
        scope: &str,
        reason: Option<&str>,
    ) -> Result<(), ProcessorError> {
        self.terminate(scope, TerminationCause::Fatal, reason)
    }

    fn terminate(
        &mut self,
        scope: &str,
        cause: TerminationCause,
        reason: Option<&str>,
    ) -> Result<(), ProcessorError> {
        let normalized = pointer::normalize(scope);
        if self.pending_terminations.contains_key(&normalized)
            || self.is_scope_terminated(&normalized)
        {
            return Ok(());
        }
        self.pending_terminations.insert(normalized.clone(), cause);
        tracing::warn!(
            scope = %normalized,
            cause = cause.as_str(),
            reason = reason.unwrap_or(""),
            "scope terminating"
        );

        if cause == TerminationCause::Fatal {
            self.meter.charge_fatal_termination_overhead();
        }
        self.meter.charge_termination_marker();

        let mut marker = json!({
            "type": keys::TYPE_TERMINATED_MARKER,
            "cause": cause.as_str(),
        });
        if let Some(reason) = reason {
            marker["reason"] = json!(reason);
        }
        let marker_ptr = pointer::resolve(
            &normalized,
            &format!("/contracts/{}", keys::KEY_TERMINATED),
        );
        self.direct_write(&marker_ptr, Some(marker))?;

        let event = termination_event(cause, reason);
        self.record_bridgeable(&normalized, event);

        // persisted marker is now authoritative
        self.pending_terminations.remove(&normalized);

        if normalized == "/" {
            return Err(ProcessorError::RunTerminated);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors;
    use pact_contract::ProcessorRegistry;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn execution(document: Value) -> Execution {
        let mut registry = ProcessorRegistry::new();
        processors::register_builtins(&mut registry);
        Execution::new(document, Arc::new(registry), None)
    }

    #[test]
    fn termination_persists_marker_and_emits() {
        let mut exec = execution(json!({"child": {"contracts": {}}}));
        exec.enter_fatal_termination("/child", Some("boundary violation"))
            .unwrap();

        let marker = &exec.document["child"]["contracts"]["terminated"];
        assert_eq!(marker["cause"], "fatal");
        assert_eq!(marker["reason"], "boundary violation");
        assert!(exec.is_scope_inactive("/child"));

        let state = exec.scope_state_mut("/child");
        assert_eq!(state.bridgeable.len(), 1);
        assert_eq!(state.bridgeable[0]["cause"], "fatal");
    }

    #[test]
    fn termination_is_monotone() {
        let mut exec = execution(json!({"child": {"contracts": {}}}));
        exec.enter_graceful_termination("/child", None).unwrap();
        let before = exec.document.clone();
        // second request of either cause is a no-op
        exec.enter_fatal_termination("/child", Some("late")).unwrap();
        assert_eq!(exec.document, before);
        assert_eq!(
            exec.document["child"]["contracts"]["terminated"]["cause"],
            "graceful"
        );
    }

    #[test]
    fn root_termination_raises_run_sentinel() {
        let mut exec = execution(json!({"contracts": {}}));
        let err = exec
            .enter_graceful_termination("/", Some("done"))
            .unwrap_err();
        assert!(matches!(err, ProcessorError::RunTerminated));
        // root termination event counts as a root emission
        assert_eq!(exec.root_emissions.len(), 1);
        assert_eq!(exec.root_emissions[0]["cause"], "graceful");
    }

    #[test]
    fn descendants_of_terminated_scope_are_inactive() {
        let mut exec = execution(json!({"a": {"contracts": {}, "b": {"contracts": {}}}}));
        exec.enter_fatal_termination("/a", None).unwrap();
        assert!(exec.is_scope_inactive("/a/b"));
    }
}
