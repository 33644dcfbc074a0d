//! Error types for the epistemic extension.
//!
//! All errors are strongly typed using thiserror.
//! Grounding errors are invariant violations (a caller handed the core
//! something it cannot propositionalize) and abort the current pipeline
//! call. Reasoner errors are transport failures talking to the external
//! model checker. Semantic inconsistencies are not errors: the reasoner
//! reports them as a `false` success flag.

use thiserror::Error;

use crate::store::StoreError;

/// Invariant violations raised while rewriting or propositionalizing.
#[derive(Debug, Error)]
pub enum GroundingError {
    #[error("Term must be ground: {term}")]
    NonGround {
        term: String,
    },

    #[error("Unsupported formula for {context}: {formula}")]
    UnsupportedFormula {
        context: &'static str,
        formula: String,
    },

    #[error("Variable {name} is used as a formula but is not bound to one")]
    UnboundFormulaVariable {
        name: String,
    },

    #[error("Invalid epistemic literal '{literal}': {reason}")]
    InvalidEpistemicLiteral {
        literal: String,
        reason: String,
    },

    #[error("Unknown internal action: {name}")]
    UnknownAction {
        name: String,
    },

    #[error("Invalid argument for internal action {name}: {reason}")]
    InvalidActionArgument {
        name: String,
        reason: String,
    },

    #[error("Belief base error: {0}")]
    Store(#[from] StoreError),
}

impl GroundingError {
    /// Creates a non-ground error from anything displayable.
    pub fn non_ground(term: impl std::fmt::Display) -> Self {
        Self::NonGround {
            term: term.to_string(),
        }
    }

    /// Creates an unsupported-formula error.
    pub fn unsupported(context: &'static str, formula: impl std::fmt::Display) -> Self {
        Self::UnsupportedFormula {
            context,
            formula: formula.to_string(),
        }
    }
}

/// Transport errors for the reasoner request/response boundary.
#[derive(Debug, Error)]
pub enum ReasonerError {
    #[error("Failed to connect to the reasoner: {message}")]
    ConnectionFailed {
        message: String,
    },

    #[error("Reasoner request timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Failed to serialize request: {message}")]
    SerializationFailed {
        message: String,
    },

    #[error("Failed to deserialize response: {message}")]
    DeserializationFailed {
        message: String,
    },

    #[error("Reasoner error (status {code}): {message}")]
    ServerError {
        code: u16,
        message: String,
    },

    #[error("Reasoner response is missing field '{field}'")]
    MissingField {
        field: &'static str,
    },
}

impl ReasonerError {
    /// Returns true if the same request could succeed when retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => true,
            Self::ServerError { code, .. } => *code >= 500,
            _ => false,
        }
    }
}

/// Errors raised while parsing agent-language source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at byte {position}: {message}")]
pub struct ParseError {
    /// Byte offset into the source where the error was detected.
    pub position: usize,
    /// Human-readable description.
    pub message: String,
}

impl ParseError {
    /// Creates a parse error at the given byte offset.
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

/// Top-level error type for the extension.
#[derive(Debug, Error)]
pub enum EpistemicError {
    #[error("Grounding error: {0}")]
    Grounding(#[from] GroundingError),

    #[error("Reasoner error: {0}")]
    Reasoner(#[from] ReasonerError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl EpistemicError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a grounding invariant violation.
    #[must_use]
    pub const fn is_grounding(&self) -> bool {
        matches!(self, Self::Grounding(_))
    }

    /// Returns true if this is a reasoner transport error.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Reasoner(_) => true,
            Self::Store(StoreError::Reasoner(_)) => true,
            Self::Grounding(GroundingError::Store(StoreError::Reasoner(_))) => true,
            _ => false,
        }
    }

    /// Returns true if retrying the same call could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Reasoner(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result type alias for extension operations.
pub type EpistemicResult<T> = Result<T, EpistemicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grounding_error_non_ground() {
        let err = GroundingError::non_ground("loc(X)");
        let msg = format!("{err}");
        assert!(msg.contains("loc(X)"));
        assert!(msg.contains("ground"));
    }

    #[test]
    fn test_grounding_error_unsupported() {
        let err = GroundingError::unsupported("propositionalize", "X > 3");
        let msg = format!("{err}");
        assert!(msg.contains("propositionalize"));
        assert!(msg.contains("X > 3"));
    }

    #[test]
    fn test_parse_error_position() {
        let err = ParseError::new(7, "expected ')'");
        assert_eq!(format!("{err}"), "parse error at byte 7: expected ')'");
    }

    #[test]
    fn test_reasoner_error_timeout() {
        let err = ReasonerError::Timeout { duration_ms: 5000 };
        assert!(format!("{err}").contains("5000ms"));
    }

    #[test]
    fn test_epistemic_error_from_grounding() {
        let err: EpistemicError = GroundingError::non_ground("p(X)").into();
        assert!(err.is_grounding());
        assert!(!err.is_transport());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_epistemic_error_retryable() {
        let err: EpistemicError = ReasonerError::ConnectionFailed {
            message: "refused".to_string(),
        }
        .into();
        assert!(err.is_transport());
        assert!(err.is_retryable());

        let err: EpistemicError = ReasonerError::ServerError {
            code: 503,
            message: "busy".to_string(),
        }
        .into();
        assert!(err.is_retryable());

        let err: EpistemicError = ReasonerError::ServerError {
            code: 400,
            message: "bad formula".to_string(),
        }
        .into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transport_error_through_store() {
        let err: EpistemicError = GroundingError::Store(StoreError::Reasoner(
            ReasonerError::Timeout { duration_ms: 10 },
        ))
        .into();
        assert!(err.is_transport());
    }

    #[test]
    fn test_epistemic_error_internal() {
        let err = EpistemicError::internal("unexpected state");
        let msg = format!("{err}");
        assert!(msg.contains("unexpected state"));
        assert!(!err.is_retryable());
    }
}
