//! Scope executor: initialization and external-event lifecycle per scope.
//!
//! Scopes are processed depth-first: every embedded child is fully
//! handled before the parent's own channels run. Bundles are reloaded on
//! each (re-)entry — and after each child during event processing —
//! because earlier work in the same run may have mutated the `contracts`
//! node, including the embedded-path list itself.

use crate::execution::Execution;
use crate::loader;
use crate::patch;
use pact_contract::{
    keys, ChannelBinding, ContractBundle, DocumentUpdateChannel, EmbeddedNodeChannel,
    LifecycleChannel, ProcessorError, TriggeredChannel,
};
use pact_event::{document_update_event, lifecycle_event, Patch, PatchOp};
use pact_node::{content_id, deep_contains, node_at, pointer};
use serde_json::{json, Value};
use std::collections::BTreeSet;

impl Execution {
    /// Loads (and caches) the bundle for one scope.
    pub(crate) fn load_scope_bundle(&mut self, scope: &str) -> Result<ContractBundle, ProcessorError> {
        let normalized = pointer::normalize(scope);
        let bundle = loader::load_bundle(
            &self.registry,
            node_at(&self.document, &normalized),
            &normalized,
        )?;
        self.bundles.insert(normalized, bundle.clone());
        Ok(bundle)
    }

    /// Whether the scope carries a persisted `initialized` marker.
    pub(crate) fn scope_is_initialized(&self, scope: &str) -> bool {
        let ptr = pointer::resolve(scope, &format!("/contracts/{}", keys::KEY_INITIALIZED));
        node_at(&self.document, &ptr).is_some()
    }

    /// Initializes a scope: embedded children first, then lifecycle
    /// delivery and the `initialized` marker. Idempotent on re-entry.
    pub(crate) fn initialize_scope(
        &mut self,
        scope: &str,
        charge_entry: bool,
    ) -> Result<(), ProcessorError> {
        let scope = pointer::normalize(scope);
        if charge_entry {
            self.meter.charge_scope_entry(pointer::depth(&scope));
            self.check_gas("scope entry")?;
        }

        let mut processed: BTreeSet<String> = BTreeSet::new();
        let mut bundle = self.load_scope_bundle(&scope)?;
        loop {
            let next = bundle
                .embedded_paths()
                .iter()
                .map(|rel| pointer::resolve(&scope, rel))
                .find(|abs| !processed.contains(abs));
            let Some(child) = next else { break };
            processed.insert(child.clone());
            if !self.is_scope_inactive(&child) {
                if let Err(err) = self.initialize_scope(&child, true) {
                    match err {
                        ProcessorError::Fatal { reason } => {
                            self.enter_fatal_termination(&child, Some(&reason))?;
                        }
                        other => return Err(other),
                    }
                }
            }
            // a child's work may have amended this scope's declarations
            bundle = self.load_scope_bundle(&scope)?;
        }

        if self.scope_is_initialized(&scope) {
            return Ok(());
        }
        let checkpoint_ptr =
            pointer::resolve(&scope, &format!("/contracts/{}", keys::KEY_CHECKPOINT));
        if node_at(&self.document, &checkpoint_ptr).is_some() {
            return Err(ProcessorError::illegal_state(format!(
                "checkpoint present before initialization at {scope}"
            )));
        }

        self.meter.charge_initialization();
        self.check_gas("initialization")?;

        let scope_node = node_at(&self.document, &scope).cloned().unwrap_or(Value::Null);
        let document_id = content_id(&scope_node);
        let event = lifecycle_event(&document_id);
        self.deliver_lifecycle(&scope, &bundle, &event, true)?;

        if self.is_scope_inactive(&scope) {
            return Ok(());
        }
        let marker = json!({
            "type": keys::TYPE_INITIALIZED_MARKER,
            "documentId": document_id,
        });
        let marker_path =
            pointer::resolve(&scope, &format!("/contracts/{}", keys::KEY_INITIALIZED));
        self.handle_patch(&scope, &Patch::add(marker_path, marker), true)
    }

    /// Processes one external event against a scope subtree.
    pub(crate) fn process_external_event(
        &mut self,
        scope: &str,
        event: &Value,
    ) -> Result<(), ProcessorError> {
        let scope = pointer::normalize(scope);
        self.meter.charge_scope_entry(pointer::depth(&scope));
        self.check_gas("scope entry")?;

        // children first, with a bundle refresh after each one
        let mut processed: BTreeSet<String> = BTreeSet::new();
        let mut bundle = self.load_scope_bundle(&scope)?;
        loop {
            let next = bundle
                .embedded_paths()
                .iter()
                .map(|rel| pointer::resolve(&scope, rel))
                .find(|abs| !processed.contains(abs));
            let Some(child) = next else { break };
            processed.insert(child.clone());
            if !self.is_scope_inactive(&child) {
                let mut outcome = Ok(());
                if !self.scope_is_initialized(&child) {
                    outcome = self.initialize_scope(&child, false);
                }
                if outcome.is_ok() {
                    outcome = self.process_external_event(&child, event);
                }
                match outcome {
                    Ok(()) => {}
                    Err(ProcessorError::Fatal { reason }) => {
                        self.enter_fatal_termination(&child, Some(&reason))?;
                    }
                    Err(other) => return Err(other),
                }
            }
            bundle = self.load_scope_bundle(&scope)?;
        }

        if self.is_scope_inactive(&scope) {
            return Ok(());
        }

        let channels: Vec<ChannelBinding> = bundle.channels().cloned().collect();
        for channel in &channels {
            self.run_external_channel(&scope, &mut bundle, channel, event)?;
        }

        self.finalize_scope(&scope)
    }

    /// Delivers a lifecycle event: recorded for bridging always, run
    /// through matching lifecycle channels, optionally finalized.
    pub(crate) fn deliver_lifecycle(
        &mut self,
        scope: &str,
        bundle: &ContractBundle,
        event: &Value,
        finalize_after: bool,
    ) -> Result<(), ProcessorError> {
        self.meter.charge_lifecycle_delivery();
        self.record_bridgeable(scope, event.clone());

        let lifecycle_channels: Vec<ChannelBinding> = bundle
            .channels()
            .filter(|c| c.type_name == keys::TYPE_LIFECYCLE_CHANNEL)
            .cloned()
            .collect();
        for channel in &lifecycle_channels {
            if self.is_scope_inactive(scope) {
                break;
            }
            let Ok(contract) =
                serde_json::from_value::<LifecycleChannel>(channel.contract.clone())
            else {
                continue;
            };
            if let Some(pattern) = &contract.event {
                if !deep_contains(event, pattern) {
                    continue;
                }
            }
            self.run_handlers(scope, bundle, &channel.key, event, false)?;
        }

        if finalize_after {
            self.finalize_scope(scope)?;
        }
        Ok(())
    }

    /// Finalization: bridge embedded-child emissions, then drain the
    /// triggered queue FIFO until empty or the scope goes inactive.
    pub(crate) fn finalize_scope(&mut self, scope: &str) -> Result<(), ProcessorError> {
        if self.is_scope_inactive(scope) {
            return Ok(());
        }
        let Some(bundle) = self.bundles.get(&pointer::normalize(scope)).cloned() else {
            return Ok(());
        };

        let watchers: Vec<ChannelBinding> = bundle
            .channels()
            .filter(|c| c.type_name == keys::TYPE_EMBEDDED_NODE_CHANNEL)
            .cloned()
            .collect();
        for child_rel in bundle.embedded_paths() {
            let child_abs = pointer::resolve(scope, child_rel);
            let emissions = std::mem::take(&mut self.scope_state_mut(&child_abs).bridgeable);
            for emission in emissions {
                for channel in &watchers {
                    if self.is_scope_inactive(scope) {
                        return Ok(());
                    }
                    let Ok(contract) =
                        serde_json::from_value::<EmbeddedNodeChannel>(channel.contract.clone())
                    else {
                        continue;
                    };
                    if pointer::resolve(scope, &contract.path) != child_abs {
                        continue;
                    }
                    if let Some(pattern) = &contract.event {
                        if !deep_contains(&emission, pattern) {
                            continue;
                        }
                    }
                    self.meter.charge_bridge();
                    self.run_handlers(scope, &bundle, &channel.key, &emission, false)?;
                }
            }
        }

        let triggered_channels: Vec<ChannelBinding> = bundle
            .channels()
            .filter(|c| c.type_name == keys::TYPE_TRIGGERED_CHANNEL)
            .cloned()
            .collect();
        loop {
            if self.is_scope_inactive(scope) {
                break;
            }
            let Some(event) = self.scope_state_mut(scope).triggered.pop_front() else {
                break;
            };
            self.meter.charge_drain_event();
            for channel in &triggered_channels {
                if self.is_scope_inactive(scope) {
                    break;
                }
                let Ok(contract) =
                    serde_json::from_value::<TriggeredChannel>(channel.contract.clone())
                else {
                    continue;
                };
                if let Some(pattern) = &contract.event {
                    if !deep_contains(&event, pattern) {
                        continue;
                    }
                }
                self.run_handlers(scope, &bundle, &channel.key, &event, false)?;
            }
        }
        Ok(())
    }

    /// Applies a contract-submitted patch with boundary enforcement and
    /// cascade routing.
    ///
    /// A boundary violation fatally terminates the *submitting* scope and
    /// swallows the patch — sibling work continues. Application failures
    /// surface as the fatal tier for the handler-error path to convert.
    pub(crate) fn handle_patch(
        &mut self,
        scope: &str,
        submitted: &Patch,
        allow_reserved_mutation: bool,
    ) -> Result<(), ProcessorError> {
        let scope = pointer::normalize(scope);
        self.meter.charge_boundary_check();
        let target = pointer::normalize(&submitted.path);

        if let Some(reason) =
            self.patch_boundary_violation(&scope, &target, allow_reserved_mutation)
        {
            tracing::warn!(scope = %scope, target = %target, %reason, "patch boundary violation");
            self.enter_fatal_termination(&scope, Some(&reason))?;
            return Ok(());
        }

        match submitted.op {
            PatchOp::Add | PatchOp::Replace => self
                .meter
                .charge_patch_add_or_replace(submitted.val.as_ref()),
            PatchOp::Remove => self.meter.charge_patch_remove(),
        }

        let outcome = patch::apply(
            &mut self.document,
            &Patch {
                op: submitted.op,
                path: target.clone(),
                val: submitted.val.clone(),
            },
        )
        .map_err(|e| {
            ProcessorError::fatal(format!(
                "patch {} at {target} failed: {e}",
                submitted.op.as_str()
            ))
        })?;

        // an embedded child replaced or removed wholesale is cut off
        let embedded_children: Vec<String> = self
            .bundles
            .get(&scope)
            .map(|b| {
                b.embedded_paths()
                    .iter()
                    .map(|rel| pointer::resolve(&scope, rel))
                    .collect()
            })
            .unwrap_or_default();
        for child in embedded_children {
            if pointer::is_inside(&child, &outcome.path) {
                self.mark_cut_off(&child);
            }
        }

        // cascade document-update delivery, target upward to root
        let routed: Vec<String> = outcome
            .cascade_scopes
            .iter()
            .filter(|s| self.bundles.contains_key(*s))
            .cloned()
            .collect();
        self.meter.charge_cascade_routing(routed.len());
        for cascade_scope in &routed {
            if self.is_scope_inactive(cascade_scope) {
                continue;
            }
            let Some(cascade_bundle) = self.bundles.get(cascade_scope).cloned() else {
                continue;
            };
            let update_channels: Vec<ChannelBinding> = cascade_bundle
                .channels()
                .filter(|c| c.type_name == keys::TYPE_DOCUMENT_UPDATE_CHANNEL)
                .cloned()
                .collect();
            for channel in &update_channels {
                let Ok(contract) =
                    serde_json::from_value::<DocumentUpdateChannel>(channel.contract.clone())
                else {
                    continue;
                };
                if !watch_matches(cascade_scope, &contract.path, &outcome.path) {
                    continue;
                }
                let relative = pointer::relativize(cascade_scope, &outcome.path);
                let update = document_update_event(
                    outcome.op,
                    &relative,
                    outcome.before.as_ref(),
                    outcome.after.as_ref(),
                );
                self.run_handlers(cascade_scope, &cascade_bundle, &channel.key, &update, false)?;
            }
        }
        Ok(())
    }

    fn patch_boundary_violation(
        &self,
        scope: &str,
        target: &str,
        allow_reserved_mutation: bool,
    ) -> Option<String> {
        if !pointer::is_inside(target, scope) {
            return Some(format!("patch target {target} escapes scope {scope}"));
        }
        if target == scope {
            return Some(format!("patch target {target} is the scope root"));
        }
        if let Some(bundle) = self.bundles.get(scope) {
            for child_rel in bundle.embedded_paths() {
                let child_abs = pointer::resolve(scope, child_rel);
                if pointer::is_inside(target, &child_abs) && target != child_abs {
                    return Some(format!(
                        "patch target {target} enters embedded scope {child_abs}"
                    ));
                }
            }
        }
        if !allow_reserved_mutation {
            for key in keys::RESERVED_CONTRACT_KEYS {
                let reserved = pointer::resolve(scope, &format!("/contracts/{key}"));
                if pointer::is_inside(target, &reserved) {
                    return Some(format!("patch target {target} writes reserved key '{key}'"));
                }
            }
        }
        None
    }
}

fn watch_matches(scope: &str, watch_relative: &str, changed: &str) -> bool {
    if watch_relative.is_empty() {
        return false;
    }
    let watch = pointer::resolve(scope, watch_relative);
    pointer::is_inside(changed, &watch)
}
