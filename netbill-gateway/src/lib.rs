//! # NetBill Gateway
//!
//! Concrete adapters for the `PaymentGateway` port:
//!
//! - [`SwiftPayGateway`] - HTTP client against the SwiftPay provider API
//! - [`FakeGateway`] - deterministic in-memory provider for development
//!   and tests
//!
//! Which adapter a process uses is decided once, at construction time, by
//! the binary - never by runtime type inspection.

mod fake;
mod signature;
mod swiftpay;

pub use fake::FakeGateway;
pub use signature::{SIGNATURE_HEADER, sign_callback_body};
pub use swiftpay::SwiftPayGateway;
