//! Checkpoint management: per-channel last-event records.
//!
//! Checkpoints live in the document under the scope's reserved
//! `contracts/checkpoint` marker and therefore persist across calls. A
//! record stores the last accepted event (cloned in full) and its
//! signature; the runner uses them for duplicate rejection and the
//! channel's recency veto. Writes go through the direct-write primitive —
//! they are engine bookkeeping, not contract-visible patches.

use crate::execution::Execution;
use pact_contract::{keys, ContractBundle, ProcessorError};
use pact_node::pointer;
use serde_json::{json, Value};

/// Snapshot of one channel's checkpoint state.
#[derive(Debug, Clone)]
pub(crate) struct CheckpointRecord {
    /// Contract key of the checkpoint marker holding this record.
    pub marker_key: String,
    pub channel_key: String,
    /// Clone of the last accepted raw event, if any.
    pub last_event: Option<Value>,
    pub last_signature: Option<String>,
}

impl CheckpointRecord {
    /// Whether `signature` duplicates the stored one.
    pub fn matches(&self, signature: &str) -> bool {
        self.last_signature.as_deref() == Some(signature)
    }
}

impl Execution {
    /// Guarantees a checkpoint marker exists in both the document and the
    /// bundle snapshot before any checkpointed delivery.
    pub(crate) fn ensure_checkpoint_marker(
        &mut self,
        scope: &str,
        bundle: &mut ContractBundle,
    ) -> Result<(), ProcessorError> {
        if bundle.marker_of_type(keys::TYPE_CHECKPOINT_MARKER).is_some() {
            return Ok(());
        }
        let marker = json!({
            "type": keys::TYPE_CHECKPOINT_MARKER,
            "lastEvents": {},
            "lastSignatures": {},
        });
        let ptr = pointer::resolve(scope, &format!("/contracts/{}", keys::KEY_CHECKPOINT));
        self.direct_write(&ptr, Some(marker.clone()))?;
        bundle.upsert_marker(keys::KEY_CHECKPOINT, keys::TYPE_CHECKPOINT_MARKER, marker);
        Ok(())
    }

    /// Looks up the checkpoint record for one channel key.
    pub(crate) fn find_checkpoint(
        &self,
        bundle: &ContractBundle,
        channel_key: &str,
    ) -> Option<CheckpointRecord> {
        let marker = bundle.marker_of_type(keys::TYPE_CHECKPOINT_MARKER)?;
        let last_event = marker
            .contract
            .get("lastEvents")
            .and_then(|events| events.get(channel_key))
            .cloned();
        let last_signature = marker
            .contract
            .get("lastSignatures")
            .and_then(|sigs| sigs.get(channel_key))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| last_event.as_ref().map(pact_node::content_id));
        Some(CheckpointRecord {
            marker_key: marker.key.clone(),
            channel_key: channel_key.to_string(),
            last_event,
            last_signature,
        })
    }

    /// Persists a newly accepted event into the checkpoint: document
    /// first, then the bundle snapshot so later channels in the same pass
    /// observe it.
    pub(crate) fn persist_checkpoint(
        &mut self,
        scope: &str,
        bundle: &mut ContractBundle,
        record: &CheckpointRecord,
        signature: Option<&str>,
        event: &Value,
    ) -> Result<(), ProcessorError> {
        self.meter.charge_checkpoint_update();
        let base = format!("/contracts/{}", record.marker_key);
        let event_ptr = pointer::resolve(
            scope,
            &format!("{base}/lastEvents/{}", record.channel_key),
        );
        self.direct_write(&event_ptr, Some(event.clone()))?;
        let signature_ptr = pointer::resolve(
            scope,
            &format!("{base}/lastSignatures/{}", record.channel_key),
        );
        self.direct_write(&signature_ptr, signature.map(|s| Value::String(s.to_string())))?;

        if let Some(marker) = bundle.marker_of_type(keys::TYPE_CHECKPOINT_MARKER) {
            let mut contract = marker.contract.clone();
            let key = marker.key.clone();
            if let Some(events) = contract
                .get_mut("lastEvents")
                .and_then(Value::as_object_mut)
            {
                events.insert(record.channel_key.clone(), event.clone());
            }
            if let Some(sigs) = contract
                .get_mut("lastSignatures")
                .and_then(Value::as_object_mut)
            {
                match signature {
                    Some(s) => {
                        sigs.insert(record.channel_key.clone(), Value::String(s.to_string()));
                    }
                    None => {
                        sigs.shift_remove(&record.channel_key);
                    }
                }
            }
            bundle.upsert_marker(&key, keys::TYPE_CHECKPOINT_MARKER, contract);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors;
    use pact_contract::ProcessorRegistry;
    use serde_json::json;
    use std::sync::Arc;

    fn execution(document: Value) -> Execution {
        let mut registry = ProcessorRegistry::new();
        processors::register_builtins(&mut registry);
        Execution::new(document, Arc::new(registry), None)
    }

    #[test]
    fn ensure_creates_marker_once() {
        let mut exec = execution(json!({"contracts": {}}));
        let mut bundle = ContractBundle::builder().build();
        exec.ensure_checkpoint_marker("/", &mut bundle).unwrap();
        assert_eq!(
            exec.document["contracts"]["checkpoint"]["type"],
            keys::TYPE_CHECKPOINT_MARKER
        );
        assert!(bundle.marker_of_type(keys::TYPE_CHECKPOINT_MARKER).is_some());

        let before = exec.document.clone();
        exec.ensure_checkpoint_marker("/", &mut bundle).unwrap();
        assert_eq!(exec.document, before);
    }

    #[test]
    fn persist_then_find_round_trip() {
        let mut exec = execution(json!({"contracts": {}}));
        let mut bundle = ContractBundle::builder().build();
        exec.ensure_checkpoint_marker("/", &mut bundle).unwrap();

        let record = exec.find_checkpoint(&bundle, "ch").unwrap();
        assert!(record.last_event.is_none());

        let event = json!({"type": "Timeline Entry", "n": 1});
        exec.persist_checkpoint("/", &mut bundle, &record, Some("sig-1"), &event)
            .unwrap();

        let found = exec.find_checkpoint(&bundle, "ch").unwrap();
        assert_eq!(found.last_event, Some(event.clone()));
        assert!(found.matches("sig-1"));
        assert!(!found.matches("sig-2"));

        // persisted in the document too
        assert_eq!(
            exec.document["contracts"]["checkpoint"]["lastEvents"]["ch"],
            event
        );
        assert_eq!(
            exec.document["contracts"]["checkpoint"]["lastSignatures"]["ch"],
            "sig-1"
        );
    }

    #[test]
    fn signature_falls_back_to_event_content_id() {
        let mut exec = execution(json!({"contracts": {}}));
        let mut bundle = ContractBundle::builder().build();
        exec.ensure_checkpoint_marker("/", &mut bundle).unwrap();
        let record = exec.find_checkpoint(&bundle, "ch").unwrap();
        let event = json!({"n": 2});
        exec.persist_checkpoint("/", &mut bundle, &record, None, &event)
            .unwrap();

        let found = exec.find_checkpoint(&bundle, "ch").unwrap();
        assert_eq!(
            found.last_signature,
            Some(pact_node::content_id(&event))
        );
    }
}
