//! Domain models for the billing payment core.

pub mod money;
pub mod order;
pub mod payment;
pub mod webhook;

pub use money::{Currency, Money};
pub use order::PaymentOrder;
pub use payment::{Payment, PaymentId, PaymentStatus};
pub use webhook::{
    AttemptStatus, WebhookAttempt, WebhookAttemptId, WebhookEndpoint, WebhookEndpointId,
};
