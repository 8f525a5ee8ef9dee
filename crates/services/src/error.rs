use chrono::{DateTime, Utc};
use domains::DomainError;
use thiserror::Error;

use crate::cancan::{ContractViolation, Denied};
use crate::ratelimit::RateLimitError;

/// Errors surfaced by the use-case layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The resource does not exist, or the actor may not know it exists.
    #[error("not found")]
    NotFound,

    /// User input was rejected; the message is meant for the user.
    #[error("{0}")]
    Validation(String),

    #[error("ratelimited until {expires_at}")]
    RateLimited { expires_at: DateTime<Utc> },

    #[error(transparent)]
    Contract(#[from] ContractViolation),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<Denied> for ServiceError {
    fn from(_: Denied) -> Self {
        ServiceError::NotFound
    }
}

impl From<RateLimitError> for ServiceError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Limited { expires_at } => ServiceError::RateLimited { expires_at },
            RateLimitError::Contended { .. } => ServiceError::Domain(DomainError::Internal(err.to_string())),
            RateLimitError::Storage(err) => ServiceError::Domain(err),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
