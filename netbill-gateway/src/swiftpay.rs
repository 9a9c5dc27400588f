//! SwiftPay HTTP adapter.
//!
//! Talks to the SwiftPay provider API:
//! - `POST /v1/checkout` to start a payment
//! - `GET /v1/transactions/{reference}` to reconcile
//!
//! Callbacks are signed with HMAC-SHA256 over the raw body; the signature
//! arrives in the `X-SwiftPay-Signature` header.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use netbill_types::{
    GatewayCallback, GatewayError, InitiatedPayment, PaymentGateway, PaymentOrder, ProviderStatus,
    VerifiedTransaction,
};

use crate::signature::{SIGNATURE_HEADER, header_value, verify_callback_signature};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Gateway adapter for the SwiftPay provider.
pub struct SwiftPayGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    callback_secret: String,
}

impl SwiftPayGateway {
    /// Creates a SwiftPay adapter with a bounded-timeout HTTP client.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        callback_secret: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            callback_secret: callback_secret.into(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire format
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CheckoutResponse {
    reference: String,
    #[serde(default)]
    checkout_url: Option<String>,
}

#[derive(Deserialize)]
struct TransactionResponse {
    reference: String,
    status: String,
    amount: i64,
    currency: String,
}

#[derive(Deserialize)]
struct CallbackBody {
    reference: String,
    status: String,
    amount: i64,
}

fn map_provider_status(wire: &str) -> Result<ProviderStatus, GatewayError> {
    match wire.to_ascii_lowercase().as_str() {
        "pending" => Ok(ProviderStatus::Pending),
        "processing" | "inprogress" => Ok(ProviderStatus::Processing),
        "success" | "completed" => Ok(ProviderStatus::Success),
        "failed" | "failure" => Ok(ProviderStatus::Failed),
        "cancelled" | "canceled" => Ok(ProviderStatus::Cancelled),
        "refunded" => Ok(ProviderStatus::Refunded),
        other => Err(GatewayError::InvalidResponse(format!(
            "unknown provider status: {}",
            other
        ))),
    }
}

#[async_trait::async_trait]
impl PaymentGateway for SwiftPayGateway {
    fn name(&self) -> &str {
        "swiftpay"
    }

    async fn initiate_payment(
        &self,
        order: &PaymentOrder,
    ) -> Result<InitiatedPayment, GatewayError> {
        let url = format!("{}/v1/checkout", self.base_url);
        debug!(order_id = %order.order_id, "initiating SwiftPay checkout");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "order_id": order.order_id,
                "amount": order.amount.amount(),
                "currency": order.amount.currency(),
                "customer": order.customer_ref,
                "description": order.description,
            }))
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::Unavailable(format!(
                "checkout returned HTTP {}",
                response.status()
            )));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let parsed: CheckoutResponse = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(InitiatedPayment {
            reference: parsed.reference,
            redirect_url: parsed.checkout_url,
            raw,
        })
    }

    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<VerifiedTransaction, GatewayError> {
        let url = format!("{}/v1/transactions/{}", self.base_url, reference);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::UnknownTransaction(reference.to_string()));
        }
        if !response.status().is_success() {
            return Err(GatewayError::Unavailable(format!(
                "transaction lookup returned HTTP {}",
                response.status()
            )));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let parsed: TransactionResponse = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(VerifiedTransaction {
            status: map_provider_status(&parsed.status)?,
            reference: parsed.reference,
            amount: parsed.amount,
            currency: parsed
                .currency
                .parse()
                .map_err(|_| GatewayError::InvalidResponse(format!(
                    "unknown currency: {}",
                    parsed.currency
                )))?,
            raw,
        })
    }

    async fn parse_callback(
        &self,
        body: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<GatewayCallback, GatewayError> {
        let signature_valid = match header_value(headers, SIGNATURE_HEADER) {
            Some(signature) => verify_callback_signature(body, signature, &self.callback_secret),
            None => {
                warn!("SwiftPay callback arrived without a signature header");
                false
            }
        };

        let raw: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let parsed: CallbackBody = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(GatewayCallback {
            reference: parsed.reference,
            status: map_provider_status(&parsed.status)?,
            amount: parsed.amount,
            raw,
            signature_valid,
        })
    }
}
