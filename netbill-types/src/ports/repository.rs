//! Persistence port traits.
//!
//! Primary ports of the hexagonal architecture; the SQLite adapter in
//! `netbill-repo` implements both. All status writes MUST go through
//! `transition`, which implementations perform as an atomic
//! compare-and-set so concurrent duplicate callbacks converge to a
//! single state change.

use chrono::{DateTime, Utc};

use crate::domain::{
    AttemptStatus, Payment, PaymentId, WebhookAttempt, WebhookAttemptId, WebhookEndpoint,
    WebhookEndpointId,
};
use crate::error::RepoError;

/// Timestamp/audit fields written together with a status change.
#[derive(Debug, Clone, Default)]
pub struct TransitionStamps {
    pub paid_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub raw_response: Option<serde_json::Value>,
}

/// Result of a compare-and-set status transition.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// This call won the transition; the row now carries the new status.
    Applied(Payment),
    /// The expected current status no longer matched - a concurrent writer
    /// got there first. Carries the row as it stands now.
    Superseded(Payment),
}

/// Durable storage for payments.
#[async_trait::async_trait]
pub trait PaymentRepository: Send + Sync + 'static {
    /// Persists a freshly created PENDING payment.
    async fn create_payment(&self, payment: &Payment) -> Result<(), RepoError>;

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepoError>;

    /// Looks a payment up by its external transaction reference.
    async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>, RepoError>;

    /// Stores the provider reference + redirect URL and moves
    /// PENDING -> INITIATED in one write. Fails with `Conflict` when the
    /// reference is already taken by another payment.
    async fn mark_initiated(
        &self,
        id: PaymentId,
        reference: &str,
        redirect_url: Option<&str>,
        raw: &serde_json::Value,
    ) -> Result<Payment, RepoError>;

    /// Atomic compare-and-set: writes `to` (plus stamps) only where the
    /// current status still equals `from`. Legality of the edge is the
    /// caller's responsibility - this guards concurrency, not the table.
    async fn transition(
        &self,
        id: PaymentId,
        from: crate::domain::PaymentStatus,
        to: crate::domain::PaymentStatus,
        stamps: TransitionStamps,
    ) -> Result<TransitionOutcome, RepoError>;

    /// Records a reconciliation pass that found the status unchanged.
    async fn record_verification(
        &self,
        id: PaymentId,
        verified_at: DateTime<Utc>,
    ) -> Result<(), RepoError>;

    async fn list_payments_for_order(&self, order_id: &str) -> Result<Vec<Payment>, RepoError>;
}

/// Durable storage for webhook endpoints and delivery attempts.
#[async_trait::async_trait]
pub trait WebhookStore: Send + Sync + 'static {
    async fn register_endpoint(
        &self,
        url: &str,
        events: Vec<String>,
        secret: &str,
    ) -> Result<WebhookEndpoint, RepoError>;

    async fn get_endpoint(
        &self,
        id: WebhookEndpointId,
    ) -> Result<Option<WebhookEndpoint>, RepoError>;

    async fn list_endpoints(&self) -> Result<Vec<WebhookEndpoint>, RepoError>;

    /// Active endpoints whose subscription set contains `event` (an empty
    /// set subscribes to everything).
    async fn active_endpoints_for(&self, event: &str) -> Result<Vec<WebhookEndpoint>, RepoError>;

    /// Persists a new PENDING attempt row (attempt 1 or a retry).
    async fn create_attempt(&self, attempt: &WebhookAttempt) -> Result<(), RepoError>;

    async fn get_attempt(&self, id: WebhookAttemptId)
    -> Result<Option<WebhookAttempt>, RepoError>;

    /// Finalizes an attempt with its outcome and response metadata.
    async fn complete_attempt(
        &self,
        id: WebhookAttemptId,
        status: AttemptStatus,
        response_code: Option<i64>,
        error: Option<String>,
    ) -> Result<(), RepoError>;

    /// Resets the endpoint's consecutive failure counter.
    async fn record_endpoint_success(&self, id: WebhookEndpointId) -> Result<(), RepoError>;

    /// Increments the failure counter, deactivating the endpoint once the
    /// count reaches `deactivate_after`. Returns the new count.
    async fn record_endpoint_failure(
        &self,
        id: WebhookEndpointId,
        deactivate_after: i64,
    ) -> Result<i64, RepoError>;

    /// Delivery history for an endpoint, oldest first.
    async fn list_attempts_for_endpoint(
        &self,
        id: WebhookEndpointId,
    ) -> Result<Vec<WebhookAttempt>, RepoError>;
}
