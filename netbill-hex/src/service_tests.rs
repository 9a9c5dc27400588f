//! PaymentFlowService unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use netbill_gateway::{FakeGateway, SIGNATURE_HEADER};
    use netbill_types::{
        AppError, Currency, InitiatePaymentRequest, Payment, PaymentId, PaymentRepository,
        PaymentStatus, ProviderStatus, RepoError, TransitionOutcome, TransitionStamps,
    };

    use crate::events::{EventBus, EventHandler, PAYMENT_SUCCEEDED};
    use crate::PaymentFlowService;

    /// Simple in-memory repository for testing the service layer.
    pub struct MockRepo {
        payments: Mutex<HashMap<PaymentId, Payment>>,
    }

    impl MockRepo {
        pub fn new() -> Self {
            Self {
                payments: Mutex::new(HashMap::new()),
            }
        }
    }

    fn apply_stamps(payment: &mut Payment, stamps: TransitionStamps) {
        if stamps.paid_at.is_some() {
            payment.paid_at = stamps.paid_at;
        }
        if stamps.confirmed_at.is_some() {
            payment.confirmed_at = stamps.confirmed_at;
        }
        if stamps.refunded_at.is_some() {
            payment.refunded_at = stamps.refunded_at;
        }
        if stamps.verified_at.is_some() {
            payment.verified_at = stamps.verified_at;
        }
        if stamps.raw_response.is_some() {
            payment.raw_response = stamps.raw_response;
        }
    }

    #[async_trait]
    impl PaymentRepository for MockRepo {
        async fn create_payment(&self, payment: &Payment) -> Result<(), RepoError> {
            self.payments
                .lock()
                .unwrap()
                .insert(payment.id, payment.clone());
            Ok(())
        }

        async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepoError> {
            Ok(self.payments.lock().unwrap().get(&id).cloned())
        }

        async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>, RepoError> {
            Ok(self
                .payments
                .lock()
                .unwrap()
                .values()
                .find(|p| p.transaction_ref.as_deref() == Some(reference))
                .cloned())
        }

        async fn mark_initiated(
            &self,
            id: PaymentId,
            reference: &str,
            redirect_url: Option<&str>,
            raw: &serde_json::Value,
        ) -> Result<Payment, RepoError> {
            let mut payments = self.payments.lock().unwrap();
            if payments
                .values()
                .any(|p| p.id != id && p.transaction_ref.as_deref() == Some(reference))
            {
                return Err(RepoError::Conflict(format!(
                    "reference {reference} already exists"
                )));
            }
            let payment = payments.get_mut(&id).ok_or(RepoError::NotFound)?;
            if payment.status != PaymentStatus::Pending {
                return Err(RepoError::Conflict("payment no longer PENDING".into()));
            }
            payment.transaction_ref = Some(reference.to_string());
            payment.redirect_url = redirect_url.map(str::to_string);
            payment.raw_response = Some(raw.clone());
            payment.status = PaymentStatus::Initiated;
            Ok(payment.clone())
        }

        async fn transition(
            &self,
            id: PaymentId,
            from: PaymentStatus,
            to: PaymentStatus,
            stamps: TransitionStamps,
        ) -> Result<TransitionOutcome, RepoError> {
            let mut payments = self.payments.lock().unwrap();
            let payment = payments.get_mut(&id).ok_or(RepoError::NotFound)?;
            if payment.status != from {
                return Ok(TransitionOutcome::Superseded(payment.clone()));
            }
            payment.status = to;
            apply_stamps(payment, stamps);
            Ok(TransitionOutcome::Applied(payment.clone()))
        }

        async fn record_verification(
            &self,
            id: PaymentId,
            verified_at: DateTime<Utc>,
        ) -> Result<(), RepoError> {
            let mut payments = self.payments.lock().unwrap();
            let payment = payments.get_mut(&id).ok_or(RepoError::NotFound)?;
            payment.verified_at = Some(verified_at);
            Ok(())
        }

        async fn list_payments_for_order(
            &self,
            order_id: &str,
        ) -> Result<Vec<Payment>, RepoError> {
            Ok(self
                .payments
                .lock()
                .unwrap()
                .values()
                .filter(|p| p.order_id == order_id)
                .cloned()
                .collect())
        }
    }

    /// Records every event it sees.
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: &str, _payload: &serde_json::Value) {
            self.seen.lock().unwrap().push(event.to_string());
        }
    }

    struct Harness {
        service: PaymentFlowService<MockRepo>,
        gateway: Arc<FakeGateway>,
        recorder: Arc<Recorder>,
    }

    fn harness() -> Harness {
        let repo = Arc::new(MockRepo::new());
        let gateway = Arc::new(FakeGateway::default());
        let recorder = Recorder::new();
        let events = Arc::new(
            EventBus::builder()
                .on(PAYMENT_SUCCEEDED, recorder.clone())
                .build(),
        );
        let service = PaymentFlowService::new(repo, gateway.clone(), events);
        Harness {
            service,
            gateway,
            recorder,
        }
    }

    fn initiate_request(amount: i64) -> InitiatePaymentRequest {
        InitiatePaymentRequest {
            order_id: "ORD-1".into(),
            amount,
            currency: Currency::TZS,
            customer_ref: "255700000001".into(),
            provider: None,
            description: None,
        }
    }

    fn success_callback(reference: &str, amount: i64) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "reference": reference,
            "status": "success",
            "amount": amount,
        }))
        .unwrap()
    }

    fn signed_headers(gateway: &FakeGateway, body: &[u8]) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(SIGNATURE_HEADER.to_string(), gateway.sign(body));
        headers
    }

    // ─────────────────────────────────────────────────────────────────────────
    // initiate
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_initiate_success() {
        let h = harness();

        let payment = h.service.initiate(initiate_request(1500)).await.unwrap();

        assert_eq!(payment.status, PaymentStatus::Initiated);
        assert_eq!(payment.transaction_ref.as_deref(), Some("SP000001"));
        assert!(payment.redirect_url.is_some());

        let stored = h.service.get_payment(payment.id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Initiated);
    }

    #[tokio::test]
    async fn test_initiate_unknown_provider_rejected() {
        let h = harness();

        let mut req = initiate_request(1500);
        req.provider = Some("other-provider".into());

        let result = h.service.initiate(req).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_initiate_negative_amount_rejected() {
        let h = harness();

        let result = h.service.initiate(initiate_request(-100)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_initiate_gateway_failure_marks_payment_failed() {
        let h = harness();
        h.gateway.fail_initiations(true);

        let result = h.service.initiate(initiate_request(1500)).await;
        assert!(matches!(result, Err(AppError::GatewayUnavailable(_))));

        let payments = h.service.list_payments_for_order("ORD-1").await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, PaymentStatus::Failed);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // record_callback
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_callback_success_emits_event_once() {
        let h = harness();
        let payment = h.service.initiate(initiate_request(1500)).await.unwrap();
        let reference = payment.transaction_ref.unwrap();

        let body = success_callback(&reference, 1500);
        let headers = signed_headers(&h.gateway, &body);

        let updated = h.service.record_callback(&body, &headers).await.unwrap();

        assert_eq!(updated.status, PaymentStatus::Success);
        assert!(updated.paid_at.is_some());
        assert!(updated.confirmed_at.is_some());
        assert_eq!(h.recorder.count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_callback_is_noop() {
        let h = harness();
        let payment = h.service.initiate(initiate_request(1500)).await.unwrap();
        let reference = payment.transaction_ref.unwrap();

        let body = success_callback(&reference, 1500);
        let headers = signed_headers(&h.gateway, &body);

        h.service.record_callback(&body, &headers).await.unwrap();
        let replay = h.service.record_callback(&body, &headers).await.unwrap();

        assert_eq!(replay.status, PaymentStatus::Success);
        // Still exactly one success event.
        assert_eq!(h.recorder.count(), 1);
    }

    #[tokio::test]
    async fn test_callback_invalid_signature_rejected() {
        let h = harness();
        let payment = h.service.initiate(initiate_request(1500)).await.unwrap();
        let reference = payment.transaction_ref.clone().unwrap();

        let body = success_callback(&reference, 1500);
        let mut headers = HashMap::new();
        headers.insert(SIGNATURE_HEADER.to_string(), "sha256=deadbeef".to_string());

        let result = h.service.record_callback(&body, &headers).await;
        assert!(matches!(result, Err(AppError::SignatureInvalid)));

        let stored = h.service.get_payment(payment.id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Initiated);
        assert_eq!(h.recorder.count(), 0);
    }

    #[tokio::test]
    async fn test_callback_missing_signature_rejected() {
        let h = harness();
        let payment = h.service.initiate(initiate_request(1500)).await.unwrap();
        let reference = payment.transaction_ref.unwrap();

        let body = success_callback(&reference, 1500);
        let result = h.service.record_callback(&body, &HashMap::new()).await;

        assert!(matches!(result, Err(AppError::SignatureInvalid)));
    }

    #[tokio::test]
    async fn test_callback_unknown_reference_rejected() {
        let h = harness();

        let body = success_callback("SP999999", 1500);
        let headers = signed_headers(&h.gateway, &body);

        let result = h.service.record_callback(&body, &headers).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_callback_amount_mismatch_rejected() {
        let h = harness();
        let payment = h.service.initiate(initiate_request(1500)).await.unwrap();
        let reference = payment.transaction_ref.unwrap();

        let body = success_callback(&reference, 9999);
        let headers = signed_headers(&h.gateway, &body);

        let result = h.service.record_callback(&body, &headers).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(h.recorder.count(), 0);
    }

    #[tokio::test]
    async fn test_callback_illegal_transition_rejected() {
        let h = harness();
        let payment = h.service.initiate(initiate_request(1500)).await.unwrap();
        let reference = payment.transaction_ref.unwrap();

        let body = success_callback(&reference, 1500);
        let headers = signed_headers(&h.gateway, &body);
        h.service.record_callback(&body, &headers).await.unwrap();

        // SUCCESS -> CANCELLED is not a legal edge.
        let body = serde_json::to_vec(&serde_json::json!({
            "reference": reference,
            "status": "cancelled",
            "amount": 1500,
        }))
        .unwrap();
        let headers = signed_headers(&h.gateway, &body);

        let result = h.service.record_callback(&body, &headers).await;
        assert!(matches!(
            result,
            Err(AppError::InvalidTransition {
                from: PaymentStatus::Success,
                to: PaymentStatus::Cancelled,
            })
        ));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // verify
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_verify_applies_provider_status() {
        let h = harness();
        let payment = h.service.initiate(initiate_request(1500)).await.unwrap();
        let reference = payment.transaction_ref.clone().unwrap();

        h.gateway.set_status(&reference, ProviderStatus::Success);
        let verified = h.service.verify(payment.id).await.unwrap();

        assert_eq!(verified.status, PaymentStatus::Success);
        assert!(verified.paid_at.is_some());
        assert!(verified.verified_at.is_some());
        assert_eq!(h.recorder.count(), 1);
    }

    #[tokio::test]
    async fn test_verify_unchanged_status_records_timestamp_only() {
        let h = harness();
        let payment = h.service.initiate(initiate_request(1500)).await.unwrap();
        let reference = payment.transaction_ref.clone().unwrap();

        h.gateway.set_status(&reference, ProviderStatus::Processing);
        let first = h.service.verify(payment.id).await.unwrap();
        assert_eq!(first.status, PaymentStatus::Processing);

        let second = h.service.verify(payment.id).await.unwrap();
        assert_eq!(second.status, PaymentStatus::Processing);
        assert!(second.verified_at.is_some());
        assert_eq!(h.recorder.count(), 0);
    }

    #[tokio::test]
    async fn test_verify_provider_still_pending_is_unchanged() {
        let h = harness();
        let payment = h.service.initiate(initiate_request(1500)).await.unwrap();

        // FakeGateway reports pending until scripted otherwise.
        let verified = h.service.verify(payment.id).await.unwrap();

        assert_eq!(verified.status, PaymentStatus::Initiated);
        assert!(verified.verified_at.is_some());
        assert_eq!(h.recorder.count(), 0);
    }

    #[tokio::test]
    async fn test_verify_without_reference_rejected() {
        let h = harness();
        h.gateway.fail_initiations(true);
        let _ = h.service.initiate(initiate_request(1500)).await;

        let payments = h.service.list_payments_for_order("ORD-1").await.unwrap();
        let result = h.service.verify(payments[0].id).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_verify_unknown_payment() {
        let h = harness();
        let result = h.service.verify(PaymentId::new()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
