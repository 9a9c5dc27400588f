//! Deterministic in-memory gateway for development and tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use netbill_types::{
    Currency, GatewayCallback, GatewayError, InitiatedPayment, PaymentGateway, PaymentOrder,
    ProviderStatus, VerifiedTransaction,
};

use crate::signature::{SIGNATURE_HEADER, header_value, verify_callback_signature};

struct FakeTransaction {
    amount: i64,
    currency: Currency,
    status: ProviderStatus,
}

/// In-memory stand-in for a payment provider.
///
/// Hands out sequential `SP{n:06}` references and lets tests script the
/// provider-side status per reference. Callbacks use the same signature
/// scheme as the real adapter.
pub struct FakeGateway {
    counter: AtomicU64,
    transactions: Mutex<HashMap<String, FakeTransaction>>,
    callback_secret: String,
    fail_initiate: AtomicBool,
}

impl FakeGateway {
    pub fn new(callback_secret: impl Into<String>) -> Self {
        Self {
            counter: AtomicU64::new(0),
            transactions: Mutex::new(HashMap::new()),
            callback_secret: callback_secret.into(),
            fail_initiate: AtomicBool::new(false),
        }
    }

    /// Makes the next `initiate_payment` calls fail as if the provider
    /// were unreachable.
    pub fn fail_initiations(&self, fail: bool) {
        self.fail_initiate.store(fail, Ordering::Relaxed);
    }

    /// Scripts the provider-side status reported by `verify_transaction`.
    pub fn set_status(&self, reference: &str, status: ProviderStatus) {
        if let Some(tx) = self.transactions.lock().unwrap().get_mut(reference) {
            tx.status = status;
        }
    }

    /// Signs a callback body the way the provider would.
    pub fn sign(&self, body: &[u8]) -> String {
        crate::signature::sign_callback_body(body, &self.callback_secret)
    }
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new("fake-callback-secret")
    }
}

#[async_trait::async_trait]
impl PaymentGateway for FakeGateway {
    fn name(&self) -> &str {
        "fake"
    }

    async fn initiate_payment(
        &self,
        order: &PaymentOrder,
    ) -> Result<InitiatedPayment, GatewayError> {
        if self.fail_initiate.load(Ordering::Relaxed) {
            return Err(GatewayError::Unavailable("provider offline".into()));
        }

        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let reference = format!("SP{:06}", n);

        self.transactions.lock().unwrap().insert(
            reference.clone(),
            FakeTransaction {
                amount: order.amount.amount(),
                currency: order.amount.currency(),
                status: ProviderStatus::Pending,
            },
        );

        let raw = serde_json::json!({
            "reference": reference,
            "order_id": order.order_id,
            "status": "pending",
        });

        Ok(InitiatedPayment {
            redirect_url: Some(format!("https://pay.fake.test/checkout/{}", reference)),
            reference,
            raw,
        })
    }

    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<VerifiedTransaction, GatewayError> {
        let transactions = self.transactions.lock().unwrap();
        let tx = transactions
            .get(reference)
            .ok_or_else(|| GatewayError::UnknownTransaction(reference.to_string()))?;

        Ok(VerifiedTransaction {
            status: tx.status,
            reference: reference.to_string(),
            amount: tx.amount,
            currency: tx.currency,
            raw: serde_json::json!({ "reference": reference }),
        })
    }

    async fn parse_callback(
        &self,
        body: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<GatewayCallback, GatewayError> {
        let signature_valid = header_value(headers, SIGNATURE_HEADER)
            .map(|sig| verify_callback_signature(body, sig, &self.callback_secret))
            .unwrap_or(false);

        let raw: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let reference = raw
            .get("reference")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::InvalidResponse("missing reference".into()))?
            .to_string();
        let status = match raw.get("status").and_then(|v| v.as_str()) {
            Some("pending") => ProviderStatus::Pending,
            Some("processing") => ProviderStatus::Processing,
            Some("success") => ProviderStatus::Success,
            Some("failed") => ProviderStatus::Failed,
            Some("cancelled") => ProviderStatus::Cancelled,
            Some("refunded") => ProviderStatus::Refunded,
            other => {
                return Err(GatewayError::InvalidResponse(format!(
                    "unknown status: {:?}",
                    other
                )));
            }
        };
        let amount = raw.get("amount").and_then(|v| v.as_i64()).unwrap_or(0);

        Ok(GatewayCallback {
            reference,
            status,
            amount,
            raw,
            signature_valid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netbill_types::Money;

    fn order(amount: i64) -> PaymentOrder {
        PaymentOrder::new(
            "ORD-1",
            Money::new(amount, Currency::TZS).unwrap(),
            "255700000001",
        )
    }

    #[tokio::test]
    async fn test_sequential_references() {
        let gw = FakeGateway::default();
        let first = gw.initiate_payment(&order(1500)).await.unwrap();
        let second = gw.initiate_payment(&order(2000)).await.unwrap();

        assert_eq!(first.reference, "SP000001");
        assert_eq!(second.reference, "SP000002");
        assert!(first.redirect_url.unwrap().contains("SP000001"));
    }

    #[tokio::test]
    async fn test_scripted_verify() {
        let gw = FakeGateway::default();
        let init = gw.initiate_payment(&order(1500)).await.unwrap();

        gw.set_status(&init.reference, ProviderStatus::Success);
        let verified = gw.verify_transaction(&init.reference).await.unwrap();

        assert_eq!(verified.status, ProviderStatus::Success);
        assert_eq!(verified.amount, 1500);
    }

    #[tokio::test]
    async fn test_unknown_reference() {
        let gw = FakeGateway::default();
        assert!(matches!(
            gw.verify_transaction("SP999999").await,
            Err(GatewayError::UnknownTransaction(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_initiation() {
        let gw = FakeGateway::default();
        gw.fail_initiations(true);
        assert!(matches!(
            gw.initiate_payment(&order(1500)).await,
            Err(GatewayError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_callback_signature_round_trip() {
        let gw = FakeGateway::default();
        let body = br#"{"reference":"SP000001","status":"success","amount":1500}"#;
        let mut headers = HashMap::new();
        headers.insert(SIGNATURE_HEADER.to_string(), gw.sign(body));

        let callback = gw.parse_callback(body, &headers).await.unwrap();
        assert!(callback.signature_valid);
        assert_eq!(callback.status, ProviderStatus::Success);
    }
}
