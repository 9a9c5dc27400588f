//! # NetBill Types
//!
//! Domain types and port traits for the billing payment core.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Money, Payment, WebhookEndpoint, WebhookAttempt)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    AttemptStatus, Currency, Money, Payment, PaymentId, PaymentOrder, PaymentStatus,
    WebhookAttempt, WebhookAttemptId, WebhookEndpoint, WebhookEndpointId,
};
pub use dto::*;
pub use error::{AppError, DomainError, GatewayError, RepoError};
pub use ports::{
    GatewayCallback, InitiatedPayment, PaymentGateway, PaymentRepository, ProviderStatus,
    TransitionOutcome, TransitionStamps, VerifiedTransaction, WebhookStore,
};
