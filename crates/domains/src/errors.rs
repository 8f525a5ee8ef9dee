//! # DomainError
//!
//! Centralized error type for the storage and identity ports.
//! Adapters map backend-specific failures onto these variants.

use thiserror::Error;

/// The primary error type for all port operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Resource not found (e.g., User, Message)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., unknown role name)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Resource already exists (e.g., duplicate uname)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Serialization failure or deadlock; the whole transaction may be retried
    #[error("transaction conflict: {0}")]
    TransactionConflict(String),

    /// Infrastructure failure (e.g., DB down, captcha service unreachable)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::TransactionConflict(_))
    }
}

/// A specialized Result type for port operations.
pub type Result<T> = std::result::Result<T, DomainError>;
