//! Scope execution engine for contract-annotated document trees.
//!
//! The engine takes a document whose scopes declare contracts, applies one
//! lifecycle step to it — initialization or a single external event — and
//! produces a new document, the events emitted at the root, and the total
//! gas consumed.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                       ProcessorEngine                          │
//! │        initialize_document / process_document / is_initialized │
//! └────────────────────────────────────────────────────────────────┘
//!                               │ one Execution per call
//!                               ▼
//! ┌────────────────────────────────────────────────────────────────┐
//! │  Execution (owns cloned document, gas meter, scope states)     │
//! │   ├── contract loader     : scope node → ContractBundle        │
//! │   ├── scope executor      : init / event lifecycle, recursion  │
//! │   ├── channel runner      : match → dedup → recency → handlers │
//! │   ├── checkpoint manager  : per-channel last-event records     │
//! │   ├── patch engine        : ADD/REPLACE/REMOVE with rollback   │
//! │   ├── termination service : ACTIVE → GRACEFUL | FATAL          │
//! │   └── workflow steps      : trigger-event / update-document /  │
//! │                             sandboxed Lua code                 │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events traverse the scope tree depth-first: embedded children are fully
//! processed before their parent's own channels run, child emissions are
//! bridged into the parent's embedded-node channels, and the parent's
//! triggered queue drains last.
//!
//! # Error Tiers
//!
//! | Tier | Example | Effect |
//! |------|---------|--------|
//! | must-understand | unknown contract type | run aborts, document unchanged |
//! | fatal termination | boundary violation, script error, gas exhaustion | offending scope terminates, siblings continue |
//! | illegal state | re-initializing an initialized document | hard `Err` to the caller |
//!
//! # Example
//!
//! ```
//! use pact_engine::ProcessorEngine;
//! use serde_json::json;
//!
//! let engine = ProcessorEngine::new();
//! let doc = json!({
//!     "x": 0,
//!     "contracts": {
//!         "onInit": { "type": "Lifecycle Event Channel" },
//!         "setX": {
//!             "type": "Sequential Workflow",
//!             "channel": "onInit",
//!             "steps": [
//!                 { "type": "Update Document", "changeset": [
//!                     { "op": "REPLACE", "path": "/x", "val": 5 }
//!                 ]}
//!             ]
//!         }
//!     }
//! });
//!
//! let result = engine.initialize_document(&doc).unwrap();
//! assert_eq!(result.document["x"], 5);
//! assert!(engine.is_initialized(&result.document));
//! ```

mod channels;
mod checkpoint;
mod context;
mod engine;
mod error;
mod execution;
mod loader;
mod patch;
pub mod processors;
mod result;
mod scopes;
mod termination;

pub use engine::ProcessorEngine;
pub use error::EngineError;
pub use patch::{PatchError, PatchOutcome};
pub use result::ProcessResult;

// Re-exported so embedders registering processors need only this crate.
pub use pact_contract::{
    keys, ChannelContext, ChannelDelivery, ChannelMatch, ChannelProcessor, ContractBundle,
    ContractError, HandlerContext, HandlerProcessor, MarkerProcessor, ParsedHandler,
    ProcessorError, ProcessorRegistry, TypeResolver,
};
pub use pact_event::{Patch, PatchOp, TerminationCause};
pub use pact_gas::GasMeter;
