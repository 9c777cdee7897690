use thiserror::Error;
use tracing::error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Unified error taxonomy for the client core and the server pipeline.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A commit batch failed structural validation before any store access.
    #[error("malformed batch: {0}")]
    Shape(String),
    /// An entity the operation targeted does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    /// Unexpected backing-store failure; the whole unit of work is rolled back.
    #[error("backing store error: {0}")]
    InternalStore(String),
    /// Mutation or revert attempted against a committed, discarded, or
    /// in-flight transaction.
    #[error("transaction {0} is closed")]
    TransactionClosed(u64),
    /// A temporary id expected in the returned identity map was absent.
    #[error("no identity mapping for temporary id {0}")]
    ReconciliationGap(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl GraphError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        GraphError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<rusqlite::Error> for GraphError {
    fn from(err: rusqlite::Error) -> Self {
        error!(error = %err, "sqlite failure");
        GraphError::InternalStore(err.to_string())
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::InternalStore(format!("property serialization: {err}"))
    }
}
