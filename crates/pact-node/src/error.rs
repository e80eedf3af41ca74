//! Node layer errors and the unified error interface.
//!
//! [`ErrorCode`] is implemented by every public error enum in the pact
//! workspace so embedders can handle failures uniformly:
//!
//! - **Machine-readable codes**: `UPPER_SNAKE_CASE`, stable once defined
//! - **Recoverability info**: whether retrying the operation can succeed
//!
//! # Example
//!
//! ```
//! use pact_node::{ErrorCode, NodeError};
//!
//! let err = NodeError::InvalidPointer("a/b".into());
//! assert_eq!(err.code(), "NODE_INVALID_POINTER");
//! assert!(!err.is_recoverable());
//! ```

use thiserror::Error;

/// Unified error code interface for pact errors.
///
/// # Code Format
///
/// - `UPPER_SNAKE_CASE`
/// - Prefixed with the owning layer (`NODE_`, `CONTRACT_`, `SCRIPT_`, `ENGINE_`)
/// - Stable across versions (changing a code is a breaking change)
///
/// # Recoverability
///
/// An error is recoverable when retrying the operation may succeed or the
/// caller can take corrective action; invalid input and contract-author
/// errors are not.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether retrying the operation can succeed.
    fn is_recoverable(&self) -> bool;
}

/// Document tree access error.
#[derive(Debug, Clone, Error)]
pub enum NodeError {
    /// Pointer is not a valid slash-delimited path.
    #[error("invalid pointer: {0}")]
    InvalidPointer(String),

    /// Pointer addresses a position that does not exist.
    #[error("no node at pointer: {0}")]
    Missing(String),
}

impl ErrorCode for NodeError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidPointer(_) => "NODE_INVALID_POINTER",
            Self::Missing(_) => "NODE_MISSING",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_upper_snake_case() {
        for err in [
            NodeError::InvalidPointer("x".into()),
            NodeError::Missing("/x".into()),
        ] {
            let code = err.code();
            assert!(code.starts_with("NODE_"));
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit()));
        }
    }
}
