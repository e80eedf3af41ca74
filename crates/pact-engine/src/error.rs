//! Public engine errors.
//!
//! Only the illegal-state tier surfaces as a hard error: fatal scope
//! terminations and must-understand failures are absorbed into the
//! [`crate::ProcessResult`] per the error-tier design.

use pact_node::ErrorCode;
use thiserror::Error;

/// Hard failure of an engine call.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Caller or contract-author programming error; no sensible document
    /// state exists to return.
    #[error("illegal state: {reason}")]
    IllegalState { reason: String },
}

impl ErrorCode for EngineError {
    fn code(&self) -> &'static str {
        match self {
            Self::IllegalState { .. } => "ENGINE_ILLEGAL_STATE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
