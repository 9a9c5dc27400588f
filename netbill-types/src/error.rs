//! Error types for the billing payment core.

use crate::domain::PaymentStatus;

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Gateway-level errors (external provider failures).
///
/// Signature validity is NOT an error here - `parse_callback` reports it
/// as data and the orchestration service owns the consequence.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("Unknown transaction reference: {0}")]
    UnknownTransaction(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Callback signature verification failed")]
    SignatureInvalid,

    #[error("Payment provider unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(DomainError::InvalidTransition { from, to }) => {
                AppError::InvalidTransition { from, to }
            }
            RepoError::Domain(DomainError::ValidationError(msg)) => AppError::BadRequest(msg),
            RepoError::Domain(e) => AppError::BadRequest(e.to_string()),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::BadRequest(e),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidTransition { from, to } => AppError::InvalidTransition { from, to },
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::UnknownTransaction(r) => {
                AppError::NotFound(format!("Unknown transaction reference: {}", r))
            }
            other => AppError::GatewayUnavailable(other.to_string()),
        }
    }
}
