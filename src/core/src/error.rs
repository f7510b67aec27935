//! Unified error types for directory backends
//!
//! Backends (fixture files, REST connectors, the relational cache) report
//! their failures through `CoreError`; the query layer wraps it.

use crate::types::{EntityId, EntityKind};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for directory backends
#[derive(Debug, Error)]
pub enum CoreError {
    /// A lookup by id found nothing
    #[error("{kind} not found: {id}")]
    EntityNotFound { kind: EntityKind, id: EntityId },

    /// Backend connector failure (network, remote API)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Database driver failure
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization/Deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid input/state
    #[error("Invalid: {0}")]
    Invalid(String),

    /// I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Create an entity-not-found error
    pub fn entity_not_found(kind: EntityKind, id: &EntityId) -> Self {
        CoreError::EntityNotFound {
            kind,
            id: id.clone(),
        }
    }

    /// Create a backend error
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        CoreError::Backend(msg.into())
    }

    /// Create a database error
    pub fn database<S: Into<String>>(msg: S) -> Self {
        CoreError::Database(msg.into())
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        CoreError::Serialization(msg.into())
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        CoreError::Configuration(msg.into())
    }

    /// Create an invalid error
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        CoreError::Invalid(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::EntityNotFound { .. })
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}
