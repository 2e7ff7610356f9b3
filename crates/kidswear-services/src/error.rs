use kidswear_core::{CoreError, Shortfall};
use thiserror::Error;

use crate::store::StoreError;

/// Failure taxonomy surfaced to callers of the services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A referenced product, inventory variant or order does not exist.
    #[error("{0} not found")]
    NotFound(String),
    /// Malformed input or an illegal state change; nothing was written.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A reservation asked for more than is available. Carries every short
    /// line so the caller can offer to reduce quantities.
    #[error("insufficient stock: {}", describe_shortfalls(.0))]
    CapacityConflict(Vec<Shortfall>),
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    /// Category configuration that contradicts itself.
    #[error("invalid category configuration: {}", .0.join("; "))]
    ConfigurationInvalid(Vec<String>),
    #[error("internal error: {0}")]
    Internal(String),
}

fn describe_shortfalls(shortfalls: &[Shortfall]) -> String {
    shortfalls
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServiceError::NotFound("record".to_string()),
            StoreError::MissingVariant(key) => {
                ServiceError::NotFound(format!("inventory variant {key}"))
            }
            StoreError::VariantExists(key) => {
                ServiceError::Validation(format!("inventory variant {key} is already provisioned"))
            }
            StoreError::InsufficientStock(shortfalls) => ServiceError::CapacityConflict(shortfalls),
            StoreError::StaleOrder { id, .. } => {
                ServiceError::Validation(format!("order {id} was changed concurrently, retry"))
            }
            StoreError::Rejected(e) => e.into(),
            StoreError::Unavailable(msg) | StoreError::Conflict(msg) => {
                ServiceError::Unavailable(msg)
            }
            StoreError::Backend(msg) => ServiceError::Internal(msg),
        }
    }
}
