//! Sandboxed, fuel-metered Lua evaluation for pact workflow steps.
//!
//! Untrusted contract authors can attach script logic to documents. This
//! crate runs that logic deterministically and within bounded resources:
//!
//! - **Fresh VM per invocation** — no state leaks between steps or runs
//! - **Fuel** — instruction-count hooks abort past a per-step budget
//! - **Deadline** — an absolute wall-clock bound backs the fuel counter
//! - **Memory cap** — the VM allocator refuses past a fixed limit
//! - **No ambient authority** — `io`, `os`, `require`, `package`, file
//!   loading, `print`, and `math.random` are removed before user code runs
//!
//! # Bindings
//!
//! Scripts see exactly three globals:
//!
//! | Global | Content |
//! |--------|---------|
//! | `event` | the event being delivered, as a Lua table |
//! | `steps` | results of earlier workflow steps, keyed by step name |
//! | `document(ptr)` | read-only snapshot of the document at a pointer |
//!
//! `document.canonical(ptr)` additionally resolves computed trailing
//! segments (`/documentId`) to content-derived ids.
//!
//! # Determinism
//!
//! No wall-clock reads, host process information, randomness, or I/O are
//! reachable from a script. The same code with the same bindings produces
//! the same value and consumes the same fuel.
//!
//! # Example
//!
//! ```
//! use pact_lua::{Bindings, LuaEvaluator};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let evaluator = LuaEvaluator::new();
//! let event = json!({"n": 20});
//! let steps = json!({});
//! let bindings = Bindings {
//!     event: &event,
//!     steps: &steps,
//!     document: Arc::new(|_, _| None),
//! };
//! let outcome = evaluator
//!     .evaluate("return { doubled = event.n * 2 }", &bindings, 1_000_000)
//!     .unwrap();
//! assert_eq!(outcome.value, json!({"doubled": 40}));
//! ```

mod error;
mod evaluator;
pub mod template;

pub use error::ScriptError;
pub use evaluator::{
    Bindings, DocumentRead, DocumentReader, EvalOutcome, LuaEvaluator, SCRIPT_MEMORY_LIMIT_BYTES,
    SCRIPT_WALL_CLOCK_LIMIT,
};
