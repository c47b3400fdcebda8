//! Errors surfaced by compilation and result reconstruction.

use thiserror::Error;

/// Every failure is raised before any query text is returned; no partial
/// output accompanies an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranspileError {
    #[error("Invalid predicate error: (predicate: {0}) is not a valid biolink model predicate.")]
    InvalidPredicate(String),

    #[error("Invalid qualifier in query: {0}")]
    InvalidQualifier(String),

    #[error("Invalid value for qualifier {qualifier} in query: {value}")]
    InvalidQualifierValue { qualifier: String, value: String },

    /// Unsupported operator arity, property type, constraint operator or feature.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The query is well-formed but provably cannot match anything.
    #[error("No possible results: {0}")]
    NoPossibleResults(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A raw result row does not have the shape the compiled query returns.
    #[error("Malformed result row: {0}")]
    MalformedResult(String),
}

impl TranspileError {
    /// `NoPossibleResults` means "zero results", not a system failure.
    pub fn is_no_results(&self) -> bool {
        matches!(self, TranspileError::NoPossibleResults(_))
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        TranspileError::Unsupported(msg.into())
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        TranspileError::MalformedResult(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TranspileError>;
