//! Registrant SPI integration: custom processors, supertype-chain
//! dispatch, and the termination surface exposed through the handler
//! context.

use pact_engine::{
    processors, ChannelContext, ChannelMatch, ChannelProcessor, ContractError, HandlerContext,
    HandlerProcessor, ParsedHandler, Patch, ProcessorEngine, ProcessorError, ProcessorRegistry,
    TypeResolver,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Channel matching any event whose `kind` equals the contract's.
struct KindChannel;

impl ChannelProcessor for KindChannel {
    fn type_names(&self) -> &[&'static str] {
        &["Kind Channel"]
    }

    fn validate(&self, key: &str, contract: &Value) -> Result<(), ContractError> {
        if contract.get("kind").and_then(Value::as_str).is_none() {
            return Err(ContractError::Invalid {
                key: key.to_string(),
                reason: "kind is required".to_string(),
            });
        }
        Ok(())
    }

    fn evaluate(
        &self,
        contract: &Value,
        ctx: &ChannelContext<'_>,
    ) -> Result<ChannelMatch, ProcessorError> {
        let wanted = contract.get("kind").and_then(Value::as_str);
        if ctx.event.get("kind").and_then(Value::as_str) == wanted {
            // channelize: strip everything but the payload
            let payload = ctx.event.get("payload").cloned().unwrap_or(Value::Null);
            Ok(ChannelMatch::matched(json!({"payload": payload})))
        } else {
            Ok(ChannelMatch::no_match())
        }
    }
}

/// Handler recording the channelized event, then optionally terminating
/// its scope gracefully.
struct RecordingHandler;

impl HandlerProcessor for RecordingHandler {
    fn type_names(&self) -> &[&'static str] {
        &["Recording Handler"]
    }

    fn parse(&self, key: &str, contract: &Value) -> Result<ParsedHandler, ContractError> {
        let channel_key = contract
            .get("channel")
            .and_then(Value::as_str)
            .ok_or_else(|| ContractError::MissingChannel {
                key: key.to_string(),
            })?;
        Ok(ParsedHandler {
            channel_key: channel_key.to_string(),
            order: 0,
        })
    }

    fn execute(
        &self,
        contract: &Value,
        ctx: &mut dyn HandlerContext,
    ) -> Result<(), ProcessorError> {
        let payload = ctx.event().get("payload").cloned().unwrap_or(Value::Null);
        ctx.apply_patch(Patch::add(ctx.resolve_pointer("/received"), payload))?;
        if contract.get("finish").and_then(Value::as_bool) == Some(true) {
            ctx.terminate_gracefully(Some("handled final event".to_string()))?;
        }
        Ok(())
    }
}

struct DerivedKinds;

impl TypeResolver for DerivedKinds {
    fn super_type(&self, type_name: &str) -> Option<String> {
        match type_name {
            "Special Kind Channel" => Some("Kind Channel".to_string()),
            _ => None,
        }
    }
}

fn engine() -> ProcessorEngine {
    let mut registry = ProcessorRegistry::new();
    processors::register_builtins(&mut registry);
    registry.register_channel(Arc::new(KindChannel));
    registry.register_handler(Arc::new(RecordingHandler));
    registry.set_type_resolver(Box::new(DerivedKinds));
    ProcessorEngine::with_registry(registry)
}

#[test]
fn custom_channel_channelizes_before_delivery() {
    let engine = engine();
    let doc = json!({
        "contracts": {
            "pings": { "type": "Kind Channel", "kind": "ping" },
            "record": { "type": "Recording Handler", "channel": "pings" },
        }
    });
    let doc = engine.initialize_document(&doc).unwrap().document;

    let event = json!({"kind": "ping", "payload": {"n": 7}, "noise": true});
    let result = engine.process_document(&doc, &event).unwrap();
    // the handler saw the channelized event, not the raw one
    assert_eq!(result.document["received"], json!({"n": 7}));
}

#[test]
fn derived_types_dispatch_through_the_supertype_chain() {
    let engine = engine();
    let doc = json!({
        "contracts": {
            "pings": { "type": "Special Kind Channel", "kind": "ping" },
            "record": { "type": "Recording Handler", "channel": "pings" },
        }
    });
    let doc = engine.initialize_document(&doc).unwrap().document;
    let result = engine
        .process_document(&doc, &json!({"kind": "ping", "payload": 1}))
        .unwrap();
    assert_eq!(result.document["received"], json!(1));
}

#[test]
fn graceful_termination_from_a_handler_halts_and_records() {
    let engine = engine();
    let doc = json!({
        "contracts": {
            "pings": { "type": "Kind Channel", "kind": "ping" },
            "record": { "type": "Recording Handler", "channel": "pings", "finish": true },
        }
    });
    let doc = engine.initialize_document(&doc).unwrap().document;
    let result = engine
        .process_document(&doc, &json!({"kind": "ping", "payload": "last"}))
        .unwrap();

    let terminated = &result.document["contracts"]["terminated"];
    assert_eq!(terminated["cause"], json!("graceful"));
    assert_eq!(terminated["reason"], json!("handled final event"));
    // the work before termination stands
    assert_eq!(result.document["received"], json!("last"));
    // the termination event is visible at the root
    assert!(result
        .triggered_events
        .iter()
        .any(|e| e["type"] == "Document Processing Terminated"));

    // a terminated document ignores further events
    let after = engine
        .process_document(&result.document, &json!({"kind": "ping", "payload": "late"}))
        .unwrap();
    assert_eq!(after.document["received"], json!("last"));
}

#[test]
fn invalid_custom_contract_is_fatal_at_load() {
    let engine = engine();
    let doc = json!({
        "contracts": {
            "pings": { "type": "Kind Channel" }, // missing kind
        }
    });
    let result = engine.initialize_document(&doc).unwrap();
    assert_eq!(
        result.document["contracts"]["terminated"]["cause"],
        json!("fatal")
    );
}
