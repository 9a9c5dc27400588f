//! Payment provider gateway port.
//!
//! A narrow three-operation contract so providers are interchangeable and
//! testable. Concrete adapters (HTTP client, fake) live in `netbill-gateway`
//! and are selected at construction time by the binary.

use std::collections::HashMap;

use crate::domain::{Currency, PaymentOrder};
use crate::error::GatewayError;

/// Provider-side view of a transaction's state.
///
/// Adapters translate their wire protocol into this neutral enum; mapping
/// it onto the payment state machine is the orchestration service's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Cancelled,
    Refunded,
}

/// Result of starting a checkout with the provider.
#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    /// External transaction reference, unique per payment
    pub reference: String,
    /// Checkout page the customer is redirected to, if the provider has one
    pub redirect_url: Option<String>,
    /// Opaque provider response retained for audit
    pub raw: serde_json::Value,
}

/// Result of a synchronous reconciliation lookup.
#[derive(Debug, Clone)]
pub struct VerifiedTransaction {
    pub status: ProviderStatus,
    pub reference: String,
    pub amount: i64,
    pub currency: Currency,
    pub raw: serde_json::Value,
}

/// Parsed asynchronous provider callback.
///
/// `signature_valid` is data, not an error: the adapter reports what it
/// saw and the orchestration service decides the consequence.
#[derive(Debug, Clone)]
pub struct GatewayCallback {
    pub reference: String,
    pub status: ProviderStatus,
    pub amount: i64,
    pub raw: serde_json::Value,
    pub signature_valid: bool,
}

/// Port trait for payment providers.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Stable provider name, recorded on each payment.
    fn name(&self) -> &str;

    /// Starts a checkout for the order with the provider.
    async fn initiate_payment(&self, order: &PaymentOrder)
    -> Result<InitiatedPayment, GatewayError>;

    /// Looks up the provider-side state of a transaction.
    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<VerifiedTransaction, GatewayError>;

    /// Parses a provider callback body plus headers, checking its signature.
    async fn parse_callback(
        &self,
        body: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<GatewayCallback, GatewayError>;
}
