//! Registrant SPI: the traits the engine calls into.
//!
//! Third parties extend the engine by registering processors keyed by
//! contract type name. The engine owns *when* processors run; processors
//! own *what* their contract kind means.
//!
//! # Trait Overview
//!
//! ```text
//! ChannelProcessor : does this event match? how is it delivered?
//! HandlerProcessor : validate binding, optionally re-match, execute
//! MarkerProcessor  : validate registrant marker shapes
//! TypeResolver     : supertype chain for derived contract types
//! ```
//!
//! Handlers execute against a [`HandlerContext`] — the engine-provided
//! capability surface (event access, patching, emission, gas, pointer
//! resolution, termination). It is deliberately object-safe so processor
//! implementations stay independent of engine internals.

use crate::bundle::ContractBundle;
use crate::error::{ContractError, ProcessorError};
use pact_event::Patch;
use pact_gas::GasMeter;
use serde_json::Value;

/// Evaluation context handed to channel processors.
pub struct ChannelContext<'a> {
    /// Scope the channel is declared in.
    pub scope_path: &'a str,
    /// Contract key of the channel binding under evaluation.
    pub binding_key: &'a str,
    /// The raw external event.
    pub event: &'a Value,
    /// The scope's current bundle snapshot (markers, sibling channels).
    pub bundle: &'a ContractBundle,
}

/// One sub-delivery of a composite channel match.
#[derive(Debug, Clone)]
pub struct ChannelDelivery {
    /// Checkpoint namespace for this delivery (`composite::child`).
    pub checkpoint_key: String,
    /// The event handed to handlers.
    pub event: Value,
    /// Explicit duplicate-detection id, when the channel supplies one.
    pub event_id: Option<String>,
    /// Pre-decided recency verdict; `None` defers to `is_newer_event`.
    pub should_process: Option<bool>,
}

/// Outcome of evaluating a channel against an event.
#[derive(Debug, Clone, Default)]
pub struct ChannelMatch {
    pub matches: bool,
    /// Channelized (normalized) event for handlers; `None` delivers the
    /// raw event.
    pub event: Option<Value>,
    /// Explicit duplicate-detection id; `None` falls back to the
    /// canonical structural signature of the raw event.
    pub event_id: Option<String>,
    /// Composite sub-deliveries; empty for plain channels.
    pub deliveries: Vec<ChannelDelivery>,
}

impl ChannelMatch {
    /// The channel did not match; nothing happens.
    #[must_use]
    pub fn no_match() -> Self {
        Self::default()
    }

    /// A plain match delivering `event` to handlers.
    #[must_use]
    pub fn matched(event: Value) -> Self {
        Self {
            matches: true,
            event: Some(event),
            ..Self::default()
        }
    }
}

/// A declarative event matcher bound to a contract type.
pub trait ChannelProcessor: Send + Sync {
    /// Contract type names this processor serves.
    fn type_names(&self) -> &[&'static str];

    /// Validates a contract body at load time.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Invalid`] when the shape does not parse.
    fn validate(&self, key: &str, contract: &Value) -> Result<(), ContractError>;

    /// Evaluates the event: match verdict, channelized event, explicit id,
    /// composite deliveries.
    ///
    /// # Errors
    ///
    /// A [`ProcessorError::Fatal`] terminates the evaluating scope.
    fn evaluate(
        &self,
        contract: &Value,
        ctx: &ChannelContext<'_>,
    ) -> Result<ChannelMatch, ProcessorError>;

    /// Recency veto: is the incoming event newer than the checkpointed
    /// one? Consulted only when a previous checkpoint event exists.
    fn is_newer_event(&self, _contract: &Value, _ctx: &ChannelContext<'_>, _last: &Value) -> bool {
        true
    }
}

/// Channel binding resolved by a handler processor at load time.
#[derive(Debug, Clone)]
pub struct ParsedHandler {
    pub channel_key: String,
    pub order: i64,
}

/// Execution capability surface handed to handler processors.
///
/// Every effect a handler can have on the run flows through here, which is
/// what lets the engine enforce boundaries, meter gas, and suppress work
/// in inactive scopes.
pub trait HandlerContext {
    /// Scope the handler is executing in.
    fn scope_path(&self) -> &str;

    /// The (channelized) event being delivered.
    fn event(&self) -> &Value;

    /// The run's gas meter.
    fn gas(&mut self) -> &mut GasMeter;

    /// Applies a boundary-checked patch. A violation fatally terminates
    /// the executing scope and swallows the patch; it is not an `Err`.
    fn apply_patch(&mut self, patch: Patch) -> Result<(), ProcessorError>;

    /// Emits an event: enqueued on the scope's triggered queue, recorded
    /// for parent bridging, and counted as a root emission at `/`.
    fn emit_event(&mut self, event: Value) -> Result<(), ProcessorError>;

    /// Resolves a scope-relative pointer to an absolute one.
    fn resolve_pointer(&self, relative: &str) -> String;

    /// Snapshot of the node at an absolute pointer (plain lookup).
    fn document_at(&self, absolute: &str) -> Option<Value>;

    /// Snapshot resolving computed trailing segments (`/documentId`).
    fn document_resolve(&self, absolute: &str) -> Option<Value>;

    /// Whether a node exists at an absolute pointer.
    fn document_contains(&self, absolute: &str) -> bool;

    /// Requests graceful termination of the executing scope.
    fn terminate_gracefully(&mut self, reason: Option<String>) -> Result<(), ProcessorError>;

    /// Requests fatal termination of the executing scope.
    fn terminate_fatally(&mut self, reason: Option<String>) -> Result<(), ProcessorError>;
}

/// Logic bound to a channel, executed per delivered event.
pub trait HandlerProcessor: Send + Sync {
    /// Contract type names this processor serves.
    fn type_names(&self) -> &[&'static str];

    /// Validates the contract and resolves its channel binding and order.
    ///
    /// # Errors
    ///
    /// [`ContractError::Invalid`] for shape failures,
    /// [`ContractError::MissingChannel`] when no binding can be resolved.
    fn parse(&self, key: &str, contract: &Value) -> Result<ParsedHandler, ContractError>;

    /// Per-event predicate beyond the channel match. Defaults to true.
    ///
    /// # Errors
    ///
    /// A [`ProcessorError::Fatal`] terminates the executing scope.
    fn matches(
        &self,
        _contract: &Value,
        _ctx: &mut dyn HandlerContext,
    ) -> Result<bool, ProcessorError> {
        Ok(true)
    }

    /// Executes the handler.
    ///
    /// # Errors
    ///
    /// A [`ProcessorError::Fatal`] terminates the executing scope;
    /// `MustUnderstand` and `RunTerminated` propagate to the run.
    fn execute(&self, contract: &Value, ctx: &mut dyn HandlerContext)
        -> Result<(), ProcessorError>;
}

/// Registrant-supplied marker kinds (validated, otherwise inert).
pub trait MarkerProcessor: Send + Sync {
    /// Contract type names this processor serves.
    fn type_names(&self) -> &[&'static str];

    /// Validates a marker body at load time.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Invalid`] when the shape does not parse.
    fn validate(&self, key: &str, contract: &Value) -> Result<(), ContractError>;
}

/// Supertype resolution for derived contract types.
///
/// When a type name has no registered processor, the registry walks
/// `super_type` upward (cycle-guarded) until a processor is found or the
/// chain ends.
pub trait TypeResolver: Send + Sync {
    fn super_type(&self, type_name: &str) -> Option<String>;
}
