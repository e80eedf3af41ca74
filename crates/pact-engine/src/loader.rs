//! Contract loader: classifies a scope's `contracts` node into a bundle.
//!
//! Classification order per entry: Process Embedded marker → built-in
//! marker → built-in (engine-managed) channel → registry channel (direct,
//! then supertype chain) → registry handler → registry marker. An entry
//! no layer recognizes is a must-understand failure that aborts the whole
//! run non-fatally. Entries without a `type` discriminator are inert data
//! and are skipped.

use pact_contract::{
    keys, CheckpointMarker, CompositeTimelineChannel, ContractBundle, ContractError,
    DocumentUpdateChannel, EmbeddedNodeChannel, InitializedMarker, LifecycleChannel,
    ProcessEmbedded, ProcessorError, ProcessorRegistry, TerminatedMarker, TriggeredChannel,
};
use pact_node::type_name_of;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Loads the contract bundle for one scope.
///
/// `scope_node` is the node at the scope path (`None` when the scope's
/// subtree no longer exists, yielding an empty bundle).
pub(crate) fn load_bundle(
    registry: &ProcessorRegistry,
    scope_node: Option<&Value>,
    scope_path: &str,
) -> Result<ContractBundle, ProcessorError> {
    let mut builder = ContractBundle::builder();
    let Some(contracts) = scope_node.and_then(|node| node.get("contracts")) else {
        return Ok(builder.build());
    };
    let Value::Object(entries) = contracts else {
        return Err(ProcessorError::fatal(format!(
            "contracts node at {scope_path} must be an object"
        )));
    };

    // key → type name, for handler/composite reference checks
    let index: BTreeMap<&str, &str> = entries
        .iter()
        .filter_map(|(key, node)| type_name_of(node).map(|t| (key.as_str(), t)))
        .collect();

    for (key, node) in entries {
        let Some(type_name) = type_name_of(node) else {
            continue;
        };

        if type_name == keys::TYPE_PROCESS_EMBEDDED {
            let marker: ProcessEmbedded = parse_contract(key, node)?;
            builder.set_embedded(key, marker).map_err(fatal)?;
            continue;
        }

        if keys::BUILTIN_MARKER_TYPES.contains(&type_name) {
            validate_builtin_marker(key, type_name, node)?;
            builder.add_marker(key, type_name, node.clone()).map_err(fatal)?;
            continue;
        }

        if keys::is_engine_managed_channel(type_name) {
            validate_managed_channel(key, type_name, node)?;
            builder.add_channel(key, type_name, node.clone());
            continue;
        }

        if let Some(processor) = registry.resolve_channel(type_name) {
            processor.validate(key, node).map_err(fatal)?;
            if type_name == keys::TYPE_COMPOSITE_TIMELINE_CHANNEL {
                validate_composite(key, node, &index, registry, entries).map_err(fatal)?;
            }
            builder.add_channel(key, type_name, node.clone());
            continue;
        }

        if let Some(processor) = registry.resolve_handler(type_name) {
            let parsed = processor.parse(key, node).map_err(fatal)?;
            let channel_key = parsed.channel_key;
            match index.get(channel_key.as_str()) {
                None => {
                    return Err(fatal(ContractError::UnknownChannel {
                        handler_key: key.clone(),
                        channel_key,
                    }))
                }
                Some(channel_type) if !is_channel_type(channel_type, registry) => {
                    return Err(fatal(ContractError::NotAChannel {
                        key: channel_key,
                    }))
                }
                Some(_) => {}
            }
            builder.add_handler(key, type_name, node.clone(), channel_key, parsed.order);
            continue;
        }

        if let Some(processor) = registry.resolve_marker(type_name) {
            processor.validate(key, node).map_err(fatal)?;
            builder.add_marker(key, type_name, node.clone()).map_err(fatal)?;
            continue;
        }

        return Err(ProcessorError::must_understand(format!(
            "unsupported contract type '{type_name}' at key '{key}'"
        )));
    }

    Ok(builder.build())
}

fn fatal(err: ContractError) -> ProcessorError {
    err.into()
}

fn parse_contract<T: serde::de::DeserializeOwned>(
    key: &str,
    node: &Value,
) -> Result<T, ProcessorError> {
    serde_json::from_value(node.clone()).map_err(|e| {
        fatal(ContractError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        })
    })
}

fn validate_builtin_marker(key: &str, type_name: &str, node: &Value) -> Result<(), ProcessorError> {
    match type_name {
        keys::TYPE_INITIALIZED_MARKER => parse_contract::<InitializedMarker>(key, node).map(|_| ()),
        keys::TYPE_TERMINATED_MARKER => parse_contract::<TerminatedMarker>(key, node).map(|_| ()),
        keys::TYPE_CHECKPOINT_MARKER => parse_contract::<CheckpointMarker>(key, node).map(|_| ()),
        other => Err(ProcessorError::illegal_state(format!(
            "'{other}' is not a built-in marker type"
        ))),
    }
}

fn validate_managed_channel(key: &str, type_name: &str, node: &Value) -> Result<(), ProcessorError> {
    match type_name {
        keys::TYPE_LIFECYCLE_CHANNEL => parse_contract::<LifecycleChannel>(key, node).map(|_| ()),
        keys::TYPE_TRIGGERED_CHANNEL => parse_contract::<TriggeredChannel>(key, node).map(|_| ()),
        keys::TYPE_DOCUMENT_UPDATE_CHANNEL => {
            parse_contract::<DocumentUpdateChannel>(key, node).map(|_| ())
        }
        keys::TYPE_EMBEDDED_NODE_CHANNEL => {
            parse_contract::<EmbeddedNodeChannel>(key, node).map(|_| ())
        }
        other => Err(ProcessorError::illegal_state(format!(
            "'{other}' is not an engine-managed channel type"
        ))),
    }
}

fn is_channel_type(type_name: &str, registry: &ProcessorRegistry) -> bool {
    keys::is_engine_managed_channel(type_name) || registry.resolve_channel(type_name).is_some()
}

/// Validates a composite channel's references: every child key must name
/// a declared channel, and composite-to-composite references must be
/// acyclic.
fn validate_composite(
    key: &str,
    node: &Value,
    index: &BTreeMap<&str, &str>,
    registry: &ProcessorRegistry,
    entries: &serde_json::Map<String, Value>,
) -> Result<(), ContractError> {
    let contract: CompositeTimelineChannel =
        serde_json::from_value(node.clone()).map_err(|e| ContractError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

    for child in &contract.channels {
        match index.get(child.as_str()) {
            None => {
                return Err(ContractError::UnknownChannel {
                    handler_key: key.to_string(),
                    channel_key: child.clone(),
                })
            }
            Some(child_type) if !is_channel_type(child_type, registry) => {
                return Err(ContractError::NotAChannel { key: child.clone() })
            }
            Some(_) => {}
        }
    }

    // cycle walk over composite references
    fn walk<'a>(
        current: &'a str,
        entries: &'a serde_json::Map<String, Value>,
        index: &BTreeMap<&str, &str>,
        in_stack: &mut HashSet<&'a str>,
        origin: &str,
    ) -> Result<(), ContractError> {
        if !in_stack.insert(current) {
            return Err(ContractError::CompositeCycle {
                key: origin.to_string(),
            });
        }
        if index.get(current) == Some(&keys::TYPE_COMPOSITE_TIMELINE_CHANNEL) {
            if let Some(child_node) = entries.get(current) {
                if let Ok(child) =
                    serde_json::from_value::<CompositeTimelineChannel>(child_node.clone())
                {
                    for next in &child.channels {
                        if let Some((next_key, _)) = entries.get_key_value(next) {
                            walk(next_key, entries, index, in_stack, origin)?;
                        }
                    }
                }
            }
        }
        in_stack.remove(current);
        Ok(())
    }
    let mut in_stack: HashSet<&str> = HashSet::new();
    walk(key, entries, index, &mut in_stack, key)
}
