//! # NetBill Hex
//!
//! Application layer and adapters for the billing payment core.
//!
//! ## Architecture
//!
//! - `service/` - Payment orchestration (initiate / verify / record_callback)
//! - `events/` - Statically-built event bus
//! - `outbound/` - Webhook fan-out, redaction, and the delivery worker
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! The service is generic over `R: PaymentRepository`; the gateway adapter
//! is injected as a trait object chosen at construction time.

pub mod events;
pub mod inbound;
pub mod outbound;
pub mod service;

#[cfg(test)]
pub(crate) mod service_tests;

pub use events::{EventBus, EventBusBuilder, EventHandler};
pub use service::PaymentFlowService;
