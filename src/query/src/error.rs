//! Error types for query normalization, evaluation and execution

use dirgate_core::{CoreError, EntityKind};
use thiserror::Error;

/// Query engine errors
#[derive(Debug, Error)]
pub enum QueryError {
    /// Backend or entity lookup failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// SQL driver failure, wrapped and propagated without retry
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid argument, including result-cardinality violations
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A tree that normalization should have ruled out reached an evaluator
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// The evaluator cannot serve this entity kind
    #[error("Unsupported entity kind: {0}")]
    UnsupportedEntityKind(EntityKind),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl QueryError {
    pub fn database<S: Into<String>>(msg: S) -> Self {
        QueryError::Database(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        QueryError::InvalidArgument(msg.into())
    }

    pub fn contract_violation<S: Into<String>>(msg: S) -> Self {
        QueryError::ContractViolation(msg.into())
    }

    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        QueryError::Configuration(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QueryError::Core(e) if e.is_not_found())
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        QueryError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for QueryError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        QueryError::Database(format!("Migration failed: {}", err))
    }
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;
