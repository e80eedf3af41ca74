//! Script evaluation errors.

use pact_node::ErrorCode;
use thiserror::Error;

/// Maximum length of the code excerpt embedded in error reasons.
const EXCERPT_LEN: usize = 120;

/// Script evaluation failure.
///
/// Thrown Lua errors, fuel exhaustion, deadline hits, and unserializable
/// results all surface as one `Evaluation` kind: callers treat every
/// script failure identically (fatal termination of the executing scope),
/// and the reason text carries the offending code excerpt.
#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    /// The script failed to run to a usable value.
    #[error("script evaluation failed: {detail} [code: {excerpt}]")]
    Evaluation { excerpt: String, detail: String },

    /// The sandbox itself could not be constructed.
    #[error("sandbox setup failed: {0}")]
    Setup(String),
}

impl ScriptError {
    /// Builds an evaluation error carrying a bounded excerpt of `code`.
    #[must_use]
    pub fn evaluation(code: &str, detail: impl Into<String>) -> Self {
        Self::Evaluation {
            excerpt: excerpt(code),
            detail: detail.into(),
        }
    }
}

impl ErrorCode for ScriptError {
    fn code(&self) -> &'static str {
        match self {
            Self::Evaluation { .. } => "SCRIPT_EVALUATION_FAILED",
            Self::Setup(_) => "SCRIPT_SETUP_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

fn excerpt(code: &str) -> String {
    let trimmed = code.trim();
    if trimmed.len() <= EXCERPT_LEN {
        return trimmed.to_string();
    }
    let mut cut = EXCERPT_LEN;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &trimmed[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_is_bounded() {
        let long = "x = 1 ".repeat(100);
        let err = ScriptError::evaluation(&long, "boom");
        let text = err.to_string();
        assert!(text.contains("boom"));
        assert!(text.len() < long.len());
    }

    #[test]
    fn short_code_kept_whole() {
        let err = ScriptError::evaluation("return 1", "boom");
        assert!(err.to_string().contains("return 1"));
    }
}
