//! Payment orchestration service.
//!
//! Sequences gateway calls with payment state transitions. Every status
//! write goes through the repository's compare-and-set, so duplicated
//! provider callbacks converge to one state change and the success event
//! is emitted exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use netbill_types::{
    AppError, GatewayError, InitiatePaymentRequest, Money, Payment, PaymentGateway, PaymentId,
    PaymentOrder, PaymentRepository, PaymentStatus, ProviderStatus, TransitionOutcome,
    TransitionStamps,
};

use crate::events::{EventBus, PAYMENT_SUCCEEDED};

/// Maps the provider's view of a transaction onto the payment state machine.
fn map_provider_status(status: ProviderStatus) -> PaymentStatus {
    match status {
        ProviderStatus::Pending => PaymentStatus::Pending,
        ProviderStatus::Processing => PaymentStatus::Processing,
        ProviderStatus::Success => PaymentStatus::Success,
        ProviderStatus::Failed => PaymentStatus::Failed,
        ProviderStatus::Cancelled => PaymentStatus::Cancelled,
        ProviderStatus::Refunded => PaymentStatus::Refunded,
    }
}

/// Timestamp stamps accompanying a transition into `target`.
fn stamps_for(
    target: PaymentStatus,
    now: DateTime<Utc>,
    raw: Option<serde_json::Value>,
    verified_at: Option<DateTime<Utc>>,
) -> TransitionStamps {
    let mut stamps = TransitionStamps {
        raw_response: raw,
        verified_at,
        ..Default::default()
    };
    match target {
        PaymentStatus::Success => {
            stamps.paid_at = Some(now);
            stamps.confirmed_at = Some(now);
        }
        PaymentStatus::Refunded => stamps.refunded_at = Some(now),
        _ => {}
    }
    stamps
}

/// Application service for the payment flow.
///
/// Generic over `R: PaymentRepository`; the gateway adapter is injected as
/// a trait object so the binary chooses the concrete provider once, at
/// construction time.
pub struct PaymentFlowService<R: PaymentRepository> {
    repo: Arc<R>,
    gateway: Arc<dyn PaymentGateway>,
    events: Arc<EventBus>,
}

impl<R: PaymentRepository> PaymentFlowService<R> {
    pub fn new(repo: Arc<R>, gateway: Arc<dyn PaymentGateway>, events: Arc<EventBus>) -> Self {
        Self {
            repo,
            gateway,
            events,
        }
    }

    /// Name of the injected provider adapter.
    pub fn provider_name(&self) -> &str {
        self.gateway.name()
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &Arc<R> {
        &self.repo
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Starts a payment for an order: one PENDING row, one gateway call,
    /// then PENDING -> INITIATED with the provider reference stored.
    /// A gateway failure leaves the row FAILED and surfaces as
    /// `GatewayUnavailable`.
    #[instrument(skip(self, req), fields(order_id = %req.order_id))]
    pub async fn initiate(&self, req: InitiatePaymentRequest) -> Result<Payment, AppError> {
        if let Some(provider) = &req.provider {
            if provider != self.gateway.name() {
                return Err(AppError::BadRequest(format!(
                    "Unknown provider: {provider}"
                )));
            }
        }

        let amount = Money::new(req.amount, req.currency)?;
        let payment = Payment::new(&req.order_id, amount, self.gateway.name());
        self.repo.create_payment(&payment).await?;

        let mut order = PaymentOrder::new(&req.order_id, amount, &req.customer_ref);
        order.description = req.description;

        match self.gateway.initiate_payment(&order).await {
            Ok(initiated) => {
                let payment = self
                    .repo
                    .mark_initiated(
                        payment.id,
                        &initiated.reference,
                        initiated.redirect_url.as_deref(),
                        &initiated.raw,
                    )
                    .await?;
                info!(payment_id = %payment.id, reference = %initiated.reference, "payment initiated");
                Ok(payment)
            }
            Err(e) => {
                let stamps = TransitionStamps {
                    raw_response: Some(serde_json::json!({ "error": e.to_string() })),
                    ..Default::default()
                };
                if let Err(repo_err) = self
                    .repo
                    .transition(
                        payment.id,
                        PaymentStatus::Pending,
                        PaymentStatus::Failed,
                        stamps,
                    )
                    .await
                {
                    error!(payment_id = %payment.id, "failed to record gateway failure: {repo_err}");
                }
                Err(AppError::GatewayUnavailable(e.to_string()))
            }
        }
    }

    pub async fn get_payment(&self, id: PaymentId) -> Result<Payment, AppError> {
        self.repo
            .get_payment(id)
            .await
            .map_err(Into::into)
            .and_then(|opt| opt.ok_or_else(|| AppError::NotFound(format!("Payment {id}"))))
    }

    pub async fn list_payments_for_order(&self, order_id: &str) -> Result<Vec<Payment>, AppError> {
        self.repo
            .list_payments_for_order(order_id)
            .await
            .map_err(Into::into)
    }

    /// Synchronous reconciliation: asks the provider for the current state
    /// and applies it. Used for polling when no callback has arrived.
    #[instrument(skip(self), fields(payment_id = %id))]
    pub async fn verify(&self, id: PaymentId) -> Result<Payment, AppError> {
        let payment = self.get_payment(id).await?;
        let reference = payment.transaction_ref.clone().ok_or_else(|| {
            AppError::BadRequest("Payment has no transaction reference yet".into())
        })?;

        let verified = self.gateway.verify_transaction(&reference).await?;
        let target = map_provider_status(verified.status);
        let now = Utc::now();

        // Provider-side "pending" covers both our PENDING and INITIATED:
        // the checkout exists but nobody has paid yet. Nothing to apply.
        let unchanged = payment.status == target
            || (target == PaymentStatus::Pending && payment.status == PaymentStatus::Initiated);
        if unchanged {
            self.repo.record_verification(id, now).await?;
            return self.get_payment(id).await;
        }

        payment.ensure_transition(target)?;

        let stamps = stamps_for(target, now, Some(verified.raw), Some(now));
        match self
            .repo
            .transition(id, payment.status, target, stamps)
            .await?
        {
            TransitionOutcome::Applied(payment) => {
                info!(payment_id = %id, status = %payment.status, "verification applied status");
                if payment.status == PaymentStatus::Success {
                    self.publish_success(&payment).await;
                }
                Ok(payment)
            }
            TransitionOutcome::Superseded(payment) => Ok(payment),
        }
    }

    /// Asynchronous entry point for provider callbacks. Safe under
    /// at-least-once delivery: a repeated callback is a no-op and the
    /// success event fires only for the call whose compare-and-set first
    /// reaches SUCCESS.
    #[instrument(skip_all)]
    pub async fn record_callback(
        &self,
        body: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<Payment, AppError> {
        let callback = self
            .gateway
            .parse_callback(body, headers)
            .await
            .map_err(|e| match e {
                GatewayError::InvalidResponse(msg) => AppError::BadRequest(msg),
                other => AppError::GatewayUnavailable(other.to_string()),
            })?;

        if !callback.signature_valid {
            warn!(reference = %callback.reference, "rejected provider callback: invalid signature");
            return Err(AppError::SignatureInvalid);
        }

        let payment = self
            .repo
            .find_by_reference(&callback.reference)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No payment for reference {}", callback.reference))
            })?;

        if callback.amount != 0 && !payment.amount.matches(callback.amount, payment.amount.currency())
        {
            warn!(
                reference = %callback.reference,
                claimed = callback.amount,
                expected = payment.amount.amount(),
                "rejected provider callback: amount mismatch"
            );
            return Err(AppError::BadRequest("Callback amount mismatch".into()));
        }

        let target = map_provider_status(callback.status);

        // Idempotent no-op: the callback restates what we already know.
        if payment.status == target {
            return Ok(payment);
        }

        payment.ensure_transition(target)?;

        let now = Utc::now();
        let stamps = stamps_for(target, now, Some(callback.raw), None);
        match self
            .repo
            .transition(payment.id, payment.status, target, stamps)
            .await?
        {
            TransitionOutcome::Applied(payment) => {
                info!(payment_id = %payment.id, status = %payment.status, "callback applied status");
                if payment.status == PaymentStatus::Success {
                    self.publish_success(&payment).await;
                }
                Ok(payment)
            }
            // A concurrent duplicate won the compare-and-set; it also owns
            // the event emission.
            TransitionOutcome::Superseded(payment) => Ok(payment),
        }
    }

    async fn publish_success(&self, payment: &Payment) {
        let payload = serde_json::json!({
            "payment_id": payment.id,
            "order_id": payment.order_id,
            "transaction_ref": payment.transaction_ref,
            "amount": payment.amount.amount(),
            "currency": payment.amount.currency(),
            "provider": payment.provider,
            "paid_at": payment.paid_at,
        });
        self.events.publish(PAYMENT_SUCCEEDED, &payload).await;
    }
}
