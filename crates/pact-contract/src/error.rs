//! Contract and processing errors.
//!
//! [`ContractError`] covers load-time failures: a contract whose shape does
//! not validate, duplicate singular markers, broken handler/channel wiring.
//! [`ProcessorError`] is the run-time control-flow enum; its variants map
//! one-to-one onto the engine's error tiers (see the crate docs).

use pact_node::ErrorCode;
use thiserror::Error;

/// Load-time contract failure. Always fatal to the declaring scope.
#[derive(Debug, Clone, Error)]
pub enum ContractError {
    /// Contract body failed schema validation.
    #[error("invalid contract '{key}': {reason}")]
    Invalid { key: String, reason: String },

    /// A singular marker type was declared more than once in a scope.
    #[error("duplicate {type_name} marker at key '{key}'")]
    DuplicateMarker { key: String, type_name: String },

    /// A handler names a channel key that does not exist in its scope.
    #[error("handler '{handler_key}' references unknown channel '{channel_key}'")]
    UnknownChannel {
        handler_key: String,
        channel_key: String,
    },

    /// A handler or composite references a contract that is not a channel.
    #[error("contract '{key}' is not a channel")]
    NotAChannel { key: String },

    /// A handler declares no channel binding at all.
    #[error("handler '{key}' must declare a channel")]
    MissingChannel { key: String },

    /// Composite channels reference each other cyclically.
    #[error("composite channel '{key}' participates in a reference cycle")]
    CompositeCycle { key: String },
}

impl ErrorCode for ContractError {
    fn code(&self) -> &'static str {
        match self {
            Self::Invalid { .. } => "CONTRACT_INVALID",
            Self::DuplicateMarker { .. } => "CONTRACT_DUPLICATE_MARKER",
            Self::UnknownChannel { .. } => "CONTRACT_UNKNOWN_CHANNEL",
            Self::NotAChannel { .. } => "CONTRACT_NOT_A_CHANNEL",
            Self::MissingChannel { .. } => "CONTRACT_MISSING_CHANNEL",
            Self::CompositeCycle { .. } => "CONTRACT_COMPOSITE_CYCLE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Tagged control-flow result threaded through every engine call.
///
/// Replaces the exception-based unwinding of comparable runtimes with an
/// explicit enum so "abort the run", "terminate this scope and continue
/// siblings", and "hard failure" stay distinguishable at every call site.
#[derive(Debug, Clone, Error)]
pub enum ProcessorError {
    /// Unrecognized contract type: abort the run non-fatally, return the
    /// original document with a capability-failure reason.
    #[error("unsupported contract type: {reason}")]
    MustUnderstand { reason: String },

    /// The root scope terminated; unwind and return the partial result.
    #[error("run terminated")]
    RunTerminated,

    /// Scope-level failure. Caught at scope boundaries and converted into
    /// a fatal termination of the offending scope.
    #[error("fatal: {reason}")]
    Fatal { reason: String },

    /// Caller or contract-author programming error detected before any
    /// sensible result exists; surfaces as a hard error.
    #[error("illegal state: {reason}")]
    IllegalState { reason: String },
}

impl ProcessorError {
    #[must_use]
    pub fn must_understand(reason: impl Into<String>) -> Self {
        Self::MustUnderstand {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn illegal_state(reason: impl Into<String>) -> Self {
        Self::IllegalState {
            reason: reason.into(),
        }
    }
}

impl ErrorCode for ProcessorError {
    fn code(&self) -> &'static str {
        match self {
            Self::MustUnderstand { .. } => "PROCESSOR_MUST_UNDERSTAND",
            Self::RunTerminated => "PROCESSOR_RUN_TERMINATED",
            Self::Fatal { .. } => "PROCESSOR_FATAL",
            Self::IllegalState { .. } => "PROCESSOR_ILLEGAL_STATE",
        }
    }

    fn is_recoverable(&self) -> bool {
        // Retrying the same call cannot change any of these outcomes.
        false
    }
}

impl From<ContractError> for ProcessorError {
    fn from(err: ContractError) -> Self {
        Self::Fatal {
            reason: err.to_string(),
        }
    }
}
