//! Data Transfer Objects (DTOs) for requests and responses.

use serde::{Deserialize, Serialize};

use crate::domain::{Currency, PaymentId, PaymentStatus, WebhookEndpointId};

// ─────────────────────────────────────────────────────────────────────────────
// Payment DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to start a payment for an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatePaymentRequest {
    /// Order being settled
    pub order_id: String,
    /// Amount in smallest currency unit
    pub amount: i64,
    pub currency: Currency,
    /// Customer contact passed to the provider checkout
    pub customer_ref: String,
    /// Optional provider name; must match the configured gateway
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Response after initiating a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatePaymentResponse {
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
    pub transaction_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

/// Acknowledgement returned to the provider after a callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackAck {
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
}

// ─────────────────────────────────────────────────────────────────────────────
// Webhook DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to register a webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterWebhookRequest {
    /// The URL to receive webhook notifications
    pub url: String,
    /// Event types to subscribe to. If empty, subscribes to all events.
    #[serde(default)]
    pub events: Vec<String>,
}

/// Response after registering a webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    /// Unique webhook endpoint identifier
    pub id: WebhookEndpointId,
    pub url: String,
    /// Secret key for verifying webhook signatures (HMAC-SHA256).
    /// Returned once, at registration.
    pub secret: String,
    pub events: Vec<String>,
    pub is_active: bool,
}
