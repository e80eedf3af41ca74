//! Workflow step executors.
//!
//! Steps run against the [`HandlerContext`] capability surface only, so
//! boundary enforcement and gas metering apply to script-originated work
//! exactly as to declarative work. Template expressions and `Lua Code`
//! bodies evaluate in the sandbox with fuel capped by the remaining
//! script allowance; spent fuel converts to host gas afterwards.

use pact_contract::{HandlerContext, ProcessorError};
use pact_event::{Patch, PatchOp};
use pact_gas::gas_to_script_fuel;
use pact_lua::{template, Bindings, DocumentRead, DocumentReader, LuaEvaluator};
use pact_node::{canonical_json, node_at, pointer, resolve_at};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// `Trigger Event`: template-expand the declared event and emit it.
pub(super) fn execute_trigger_event(
    evaluator: &LuaEvaluator,
    step: &Value,
    ctx: &mut dyn HandlerContext,
    results: &Map<String, Value>,
) -> Result<Option<Value>, ProcessorError> {
    ctx.gas().charge_trigger_event_base();
    let Some(event_node) = step.get("event") else {
        return Err(ProcessorError::fatal(
            "Trigger Event step must declare an event payload",
        ));
    };
    // expansion stops at embedded documents carried inside the payload
    let expanded = expand_with_expressions(evaluator, event_node, ctx, results, &|_, node| {
        !is_embedded_document(node)
    })?;
    ctx.emit_event(expanded)?;
    Ok(None)
}

#[derive(Debug, Deserialize)]
struct Change {
    op: Option<String>,
    path: Option<String>,
    val: Option<Value>,
}

/// `Update Document`: template-expand the changeset and apply each change
/// as a boundary-checked, scope-relative patch.
pub(super) fn execute_update_document(
    evaluator: &LuaEvaluator,
    step: &Value,
    ctx: &mut dyn HandlerContext,
    results: &Map<String, Value>,
) -> Result<Option<Value>, ProcessorError> {
    let changeset_node = step.get("changeset").cloned().unwrap_or(Value::Array(vec![]));
    let expanded = expand_with_expressions(evaluator, &changeset_node, ctx, results, &|_, _| true)?;
    let changes: Vec<Change> = serde_json::from_value(expanded)
        .map_err(|e| ProcessorError::fatal(format!("Update Document step payload is invalid: {e}")))?;

    ctx.gas().charge_update_document_base(changes.len());
    for change in changes {
        let op = match &change.op {
            None => PatchOp::Replace,
            Some(text) => PatchOp::parse(text).ok_or_else(|| {
                ProcessorError::fatal(format!("unsupported Update Document operation \"{text}\""))
            })?,
        };
        let path = change
            .path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ProcessorError::fatal("Update Document changeset requires a path"))?;
        let absolute = ctx.resolve_pointer(path);
        let patch = Patch {
            op,
            path: absolute,
            val: match op {
                PatchOp::Remove => None,
                _ => Some(change.val.unwrap_or(Value::Null)),
            },
        };
        ctx.apply_patch(patch)?;
    }
    Ok(None)
}

/// `Lua Code`: evaluate untrusted script in the sandbox; a returned
/// `events` list is emitted, the returned value becomes the step result.
pub(super) fn execute_lua_code(
    evaluator: &LuaEvaluator,
    step: &Value,
    ctx: &mut dyn HandlerContext,
    results: &Map<String, Value>,
) -> Result<Option<Value>, ProcessorError> {
    let Some(code) = step.get("code").and_then(Value::as_str) else {
        return Err(ProcessorError::fatal(
            "Lua Code step must include code to execute",
        ));
    };
    ctx.gas().charge_script_code_base(code);

    let event = ctx.event().clone();
    let steps_value = Value::Object(results.clone());
    let reader = document_reader(ctx);
    let fuel_limit = gas_to_script_fuel(ctx.gas().script_step_allowance());
    let bindings = Bindings {
        event: &event,
        steps: &steps_value,
        document: reader,
    };

    let outcome = evaluator
        .evaluate(code, &bindings, fuel_limit)
        .map_err(|e| ProcessorError::fatal(e.to_string()))?;

    ctx.gas().charge_script_fuel(outcome.fuel_used);
    charge_reads(ctx, &outcome.document_reads);
    if ctx.gas().is_exhausted() {
        return Err(ProcessorError::fatal(format!(
            "gas budget exhausted during Lua Code step [code: {}]",
            code_excerpt(code)
        )));
    }

    if let Some(events) = outcome.value.get("events").and_then(Value::as_array) {
        for emission in events {
            ctx.emit_event(emission.clone())?;
        }
    }

    Ok(if outcome.value.is_null() {
        None
    } else {
        Some(outcome.value)
    })
}

/// Expands `${...}` placeholders in a step payload subtree, charging
/// template, expression, fuel, and snapshot gas.
fn expand_with_expressions(
    evaluator: &LuaEvaluator,
    node: &Value,
    ctx: &mut dyn HandlerContext,
    results: &Map<String, Value>,
    descend: &template::DescendPredicate<'_>,
) -> Result<Value, ProcessorError> {
    let text = canonical_json(node);
    let placeholder_count = template::placeholders(&text).len();
    if placeholder_count == 0 {
        return Ok(node.clone());
    }
    ctx.gas().charge_template(placeholder_count, &text);

    let event = ctx.event().clone();
    let steps_value = Value::Object(results.clone());
    let reader = document_reader(ctx);
    let fuel_limit = gas_to_script_fuel(ctx.gas().script_step_allowance());

    let mut evaluated_sources: Vec<String> = Vec::new();
    let mut fuel_spent: u64 = 0;
    let mut reads: Vec<DocumentRead> = Vec::new();
    let expanded = {
        let mut eval = |body: &str| {
            evaluated_sources.push(body.to_string());
            let bindings = Bindings {
                event: &event,
                steps: &steps_value,
                document: Arc::clone(&reader),
            };
            let outcome = evaluator.evaluate_expression(body, &bindings, fuel_limit)?;
            fuel_spent += outcome.fuel_used;
            reads.extend(outcome.document_reads);
            Ok(outcome.value)
        };
        template::expand_tree(node, &mut eval, descend)
    };

    for source in &evaluated_sources {
        ctx.gas().charge_expression(source);
    }
    ctx.gas().charge_script_fuel(fuel_spent);
    charge_reads(ctx, &reads);

    expanded.map_err(|e| ProcessorError::fatal(e.to_string()))
}

/// Snapshot-backed document reader for sandbox bindings.
///
/// The snapshot is taken at step start; pointers without a leading slash
/// resolve against the executing scope, canonical reads resolve computed
/// trailing segments.
fn document_reader(ctx: &mut dyn HandlerContext) -> DocumentReader {
    let snapshot = ctx.document_at("/").unwrap_or(Value::Null);
    let scope = ctx.scope_path().to_string();
    Arc::new(move |ptr, canonical| {
        let absolute = if ptr.starts_with('/') {
            pointer::normalize(ptr)
        } else {
            pointer::resolve(&scope, &format!("/{ptr}"))
        };
        if canonical {
            resolve_at(&snapshot, &absolute)
        } else {
            node_at(&snapshot, &absolute).cloned()
        }
    })
}

fn charge_reads(ctx: &mut dyn HandlerContext, reads: &[DocumentRead]) {
    for read in reads {
        ctx.gas().charge_document_snapshot(read.bytes);
    }
}

fn is_embedded_document(node: &Value) -> bool {
    node.get("contracts").is_some()
}

fn code_excerpt(code: &str) -> &str {
    let mut end = code.len().min(80);
    while !code.is_char_boundary(end) {
        end -= 1;
    }
    &code[..end]
}
