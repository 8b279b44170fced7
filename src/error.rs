//! Typed errors for the vecstore core.
//!
//! Every variant carries a human-readable message and maps to a stable
//! machine code via [`Error::code`], which the HTTP layer exposes verbatim
//! so clients can branch without parsing messages.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A referenced library, document, chunk, or snapshot does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Name collision for a library or snapshot.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// An embedding or query vector disagrees with the established dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A zero-norm vector was used under the cosine metric.
    #[error("invalid vector: {0}")]
    InvalidVector(String),

    /// The requested (algorithm, metric) pairing is not supported.
    #[error("unsupported metric: {algorithm} index does not support {metric}")]
    UnsupportedMetric {
        algorithm: &'static str,
        metric: &'static str,
    },

    /// A request parameter failed validation (k = 0, empty name, bad filter).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A snapshot file failed to parse or violates repository invariants.
    #[error("snapshot corrupt: {0}")]
    SnapshotCorrupt(String),

    /// Embedding credential missing or the upstream failed non-retryably.
    #[error("embeddings unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Invariant violation. Should not occur; logged with full context.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::AlreadyExists(_) => "already_exists",
            Error::DimensionMismatch { .. } => "dimension_mismatch",
            Error::InvalidVector(_) => "invalid_vector",
            Error::UnsupportedMetric { .. } => "unsupported_metric",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::SnapshotCorrupt(_) => "snapshot_corrupt",
            Error::EmbeddingUnavailable(_) => "embedding_unavailable",
            Error::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(format!("io error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::NotFound("x".into()).code(), "not_found");
        assert_eq!(Error::AlreadyExists("x".into()).code(), "already_exists");
        assert_eq!(
            Error::DimensionMismatch {
                expected: 3,
                got: 4
            }
            .code(),
            "dimension_mismatch"
        );
        assert_eq!(
            Error::UnsupportedMetric {
                algorithm: "kdtree",
                metric: "cosine"
            }
            .code(),
            "unsupported_metric"
        );
    }

    #[test]
    fn messages_carry_context() {
        let err = Error::DimensionMismatch {
            expected: 128,
            got: 64,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 128, got 64");
    }
}
