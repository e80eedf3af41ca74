//! The sandboxed evaluator.
//!
//! Every invocation builds a fresh VM: ambient authority stripped, memory
//! capped, an instruction-count hook enforcing fuel and an absolute
//! deadline. The VM and all guest state are dropped unconditionally when
//! the invocation returns, success or error.

use crate::error::ScriptError;
use mlua::{HookTriggers, Lua, LuaSerdeExt, Value as LuaValue, VmState};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Guest heap cap per invocation.
pub const SCRIPT_MEMORY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

/// Absolute wall-clock bound per invocation, backing the fuel counter.
pub const SCRIPT_WALL_CLOCK_LIMIT: Duration = Duration::from_secs(2);

/// Instructions between fuel-hook firings. Fuel accounting resolves to
/// this granularity.
const HOOK_INTERVAL: u32 = 100;

/// Globals removed before user code runs.
const STRIPPED_GLOBALS: [&str; 8] = [
    "io",
    "os",
    "require",
    "package",
    "dofile",
    "loadfile",
    "load",
    "print",
];

/// Read-only document accessor supplied by the embedding engine.
///
/// Arguments are the pointer and whether computed trailing segments
/// (`/documentId`) should be resolved.
pub type DocumentReader = Arc<dyn Fn(&str, bool) -> Option<Value> + Send + Sync>;

/// One `document()` call observed during evaluation, reported back so the
/// engine can charge snapshot gas.
#[derive(Debug, Clone)]
pub struct DocumentRead {
    pub pointer: String,
    /// Canonical size of the returned snapshot; `None` for misses.
    pub bytes: Option<usize>,
}

/// Host bindings exposed to a script.
pub struct Bindings<'a> {
    pub event: &'a Value,
    pub steps: &'a Value,
    pub document: DocumentReader,
}

/// Result of a successful evaluation.
#[derive(Debug, Clone)]
pub struct EvalOutcome {
    /// The script's returned value, converted to a document node.
    pub value: Value,
    /// VM instructions spent, to fuel-accounting granularity.
    pub fuel_used: u64,
    /// Document reads performed via the `document` binding.
    pub document_reads: Vec<DocumentRead>,
}

/// Fuel-metered, deadline-bounded Lua evaluator.
///
/// The evaluator itself is stateless and cheap; VM construction happens
/// per call so nothing leaks between invocations.
#[derive(Debug, Clone)]
pub struct LuaEvaluator {
    memory_limit: usize,
    wall_clock_limit: Duration,
}

impl LuaEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory_limit: SCRIPT_MEMORY_LIMIT_BYTES,
            wall_clock_limit: SCRIPT_WALL_CLOCK_LIMIT,
        }
    }

    /// Overrides the wall-clock bound (tests only need tighter ones).
    #[must_use]
    pub fn with_wall_clock_limit(mut self, limit: Duration) -> Self {
        self.wall_clock_limit = limit;
        self
    }

    /// Evaluates a script chunk under `fuel_limit` VM instructions.
    ///
    /// # Errors
    ///
    /// Every failure mode — thrown Lua errors, fuel exhaustion, deadline,
    /// unserializable results — surfaces as [`ScriptError::Evaluation`]
    /// with a code excerpt in the reason.
    pub fn evaluate(
        &self,
        code: &str,
        bindings: &Bindings<'_>,
        fuel_limit: u64,
    ) -> Result<EvalOutcome, ScriptError> {
        let lua = Lua::new();
        lua.set_memory_limit(self.memory_limit)
            .map_err(|e| ScriptError::Setup(e.to_string()))?;

        let reads: Arc<Mutex<Vec<DocumentRead>>> = Arc::new(Mutex::new(Vec::new()));
        self.install_bindings(&lua, bindings, &reads)
            .map_err(|e| ScriptError::Setup(e.to_string()))?;

        let spent = Arc::new(AtomicU64::new(0));
        let fuel_hit = Arc::new(AtomicBool::new(false));
        let deadline_hit = Arc::new(AtomicBool::new(false));
        let deadline = Instant::now() + self.wall_clock_limit;
        {
            let spent = Arc::clone(&spent);
            let fuel_hit = Arc::clone(&fuel_hit);
            let deadline_hit = Arc::clone(&deadline_hit);
            lua.set_hook(
                HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
                move |_, _| {
                    let used = spent.fetch_add(u64::from(HOOK_INTERVAL), Ordering::Relaxed)
                        + u64::from(HOOK_INTERVAL);
                    if used > fuel_limit {
                        fuel_hit.store(true, Ordering::Relaxed);
                        return Err(mlua::Error::RuntimeError("script fuel exhausted".into()));
                    }
                    if Instant::now() >= deadline {
                        deadline_hit.store(true, Ordering::Relaxed);
                        return Err(mlua::Error::RuntimeError(
                            "script deadline exceeded".into(),
                        ));
                    }
                    Ok(VmState::Continue)
                },
            );
        }

        let evaluated: mlua::Result<LuaValue> = lua.load(code).set_name("step").eval();
        let fuel_used = spent.load(Ordering::Relaxed);

        let lua_value = match evaluated {
            Ok(value) => value,
            Err(err) => {
                let detail = if fuel_hit.load(Ordering::Relaxed) {
                    format!("fuel exhausted after {fuel_used} instructions")
                } else if deadline_hit.load(Ordering::Relaxed) {
                    "wall-clock deadline exceeded".to_string()
                } else {
                    err.to_string()
                };
                tracing::debug!(fuel_used, "script evaluation failed: {detail}");
                return Err(ScriptError::evaluation(code, detail));
            }
        };

        let value: Value = lua
            .from_value(lua_value)
            .map_err(|e| ScriptError::evaluation(code, format!("unserializable result: {e}")))?;

        let document_reads = std::mem::take(&mut *reads.lock());
        Ok(EvalOutcome {
            value,
            fuel_used,
            document_reads,
        })
        // `lua` drops here on every path, releasing all guest state.
    }

    /// Evaluates a single expression (template placeholder body).
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::evaluate`].
    pub fn evaluate_expression(
        &self,
        expression: &str,
        bindings: &Bindings<'_>,
        fuel_limit: u64,
    ) -> Result<EvalOutcome, ScriptError> {
        self.evaluate(&format!("return ({expression})"), bindings, fuel_limit)
    }

    fn install_bindings(
        &self,
        lua: &Lua,
        bindings: &Bindings<'_>,
        reads: &Arc<Mutex<Vec<DocumentRead>>>,
    ) -> mlua::Result<()> {
        let globals = lua.globals();
        for name in STRIPPED_GLOBALS {
            globals.set(name, LuaValue::Nil)?;
        }
        // math.random draws on VM-startup entropy; determinism forbids it.
        if let Ok(math) = globals.get::<mlua::Table>("math") {
            math.set("random", LuaValue::Nil)?;
            math.set("randomseed", LuaValue::Nil)?;
        }

        globals.set("event", lua.to_value(bindings.event)?)?;
        globals.set("steps", lua.to_value(bindings.steps)?)?;

        let document = lua.create_table()?;
        let metatable = lua.create_table()?;
        let call_reader = Arc::clone(&bindings.document);
        let call_reads = Arc::clone(reads);
        metatable.set(
            "__call",
            lua.create_function(
                move |lua, (_this, pointer): (mlua::Table, Option<String>)| {
                    read_snapshot(lua, &call_reader, &call_reads, pointer, false)
                },
            )?,
        )?;
        document.set_metatable(Some(metatable));

        let canonical_reader = Arc::clone(&bindings.document);
        let canonical_reads = Arc::clone(reads);
        document.set(
            "canonical",
            lua.create_function(move |lua, pointer: Option<String>| {
                read_snapshot(lua, &canonical_reader, &canonical_reads, pointer, true)
            })?,
        )?;
        globals.set("document", document)?;
        Ok(())
    }
}

impl Default for LuaEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn read_snapshot(
    lua: &Lua,
    reader: &DocumentReader,
    reads: &Mutex<Vec<DocumentRead>>,
    pointer: Option<String>,
    canonical: bool,
) -> mlua::Result<LuaValue> {
    let pointer = pointer.unwrap_or_else(|| "/".to_string());
    let snapshot = reader(&pointer, canonical);
    reads.lock().push(DocumentRead {
        pointer,
        bytes: snapshot.as_ref().map(pact_node::canonical_size),
    });
    match snapshot {
        Some(value) => lua.to_value(&value),
        None => Ok(LuaValue::Nil),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bindings<'a>(event: &'a Value, steps: &'a Value) -> Bindings<'a> {
        Bindings {
            event,
            steps,
            document: Arc::new(|_, _| None),
        }
    }

    fn doc_bindings<'a>(event: &'a Value, steps: &'a Value, doc: Value) -> Bindings<'a> {
        Bindings {
            event,
            steps,
            document: Arc::new(move |ptr, canonical| {
                if canonical {
                    pact_node::resolve_at(&doc, ptr)
                } else {
                    pact_node::node_at(&doc, ptr).cloned()
                }
            }),
        }
    }

    const FUEL: u64 = 10_000_000;

    #[test]
    fn returns_tables_as_nodes() {
        let event = json!({"n": 3});
        let steps = json!({});
        let outcome = LuaEvaluator::new()
            .evaluate("return { sum = event.n + 4 }", &bindings(&event, &steps), FUEL)
            .unwrap();
        assert_eq!(outcome.value, json!({"sum": 7}));
        assert!(outcome.fuel_used <= FUEL);
    }

    #[test]
    fn steps_are_visible() {
        let event = json!({});
        let steps = json!({"First": {"x": 10}});
        let outcome = LuaEvaluator::new()
            .evaluate("return steps.First.x * 2", &bindings(&event, &steps), FUEL)
            .unwrap();
        assert_eq!(outcome.value, json!(20));
    }

    #[test]
    fn document_binding_reads_and_logs() {
        let event = json!({});
        let steps = json!({});
        let b = doc_bindings(&event, &steps, json!({"a": {"x": 5}}));
        let outcome = LuaEvaluator::new()
            .evaluate("return document('/a/x')", &b, FUEL)
            .unwrap();
        assert_eq!(outcome.value, json!(5));
        assert_eq!(outcome.document_reads.len(), 1);
        assert_eq!(outcome.document_reads[0].pointer, "/a/x");
    }

    #[test]
    fn canonical_document_binding_resolves_content_id() {
        let event = json!({});
        let steps = json!({});
        let b = doc_bindings(&event, &steps, json!({"a": {"x": 5}}));
        let outcome = LuaEvaluator::new()
            .evaluate("return document.canonical('/a/documentId')", &b, FUEL)
            .unwrap();
        assert_eq!(
            outcome.value,
            json!(pact_node::content_id(&json!({"x": 5})))
        );
    }

    #[test]
    fn ambient_authority_is_stripped() {
        let event = json!({});
        let steps = json!({});
        let outcome = LuaEvaluator::new()
            .evaluate(
                "return { io = io == nil, os = os == nil, require = require == nil, \
                 load = load == nil, rand = math.random == nil }",
                &bindings(&event, &steps),
                FUEL,
            )
            .unwrap();
        assert_eq!(
            outcome.value,
            json!({"io": true, "os": true, "require": true, "load": true, "rand": true})
        );
    }

    #[test]
    fn infinite_loop_exhausts_fuel() {
        let event = json!({});
        let steps = json!({});
        let err = LuaEvaluator::new()
            .evaluate("while true do end", &bindings(&event, &steps), 50_000)
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("fuel exhausted"));
        assert!(text.contains("while true do end"));
    }

    #[test]
    fn thrown_errors_surface_with_excerpt() {
        let event = json!({});
        let steps = json!({});
        let err = LuaEvaluator::new()
            .evaluate("error('custom failure')", &bindings(&event, &steps), FUEL)
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("custom failure"));
        assert!(text.contains("error('custom failure')"));
    }

    #[test]
    fn fuel_is_deterministic() {
        let event = json!({"n": 7});
        let steps = json!({});
        let run = || {
            LuaEvaluator::new()
                .evaluate(
                    "local acc = 0\nfor i = 1, 1000 do acc = acc + i end\nreturn acc",
                    &bindings(&event, &steps),
                    FUEL,
                )
                .unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first.value, json!(500_500));
        assert_eq!(first.fuel_used, second.fuel_used);
    }

    #[test]
    fn state_does_not_leak_between_invocations() {
        let event = json!({});
        let steps = json!({});
        let evaluator = LuaEvaluator::new();
        evaluator
            .evaluate("leak = 42 return 1", &bindings(&event, &steps), FUEL)
            .unwrap();
        let outcome = evaluator
            .evaluate("return leak == nil", &bindings(&event, &steps), FUEL)
            .unwrap();
        assert_eq!(outcome.value, json!(true));
    }

    #[test]
    fn expression_wrapper_evaluates_bare_expressions() {
        let event = json!({"n": 6});
        let steps = json!({});
        let outcome = LuaEvaluator::new()
            .evaluate_expression("event.n * 7", &bindings(&event, &steps), FUEL)
            .unwrap();
        assert_eq!(outcome.value, json!(42));
    }
}
