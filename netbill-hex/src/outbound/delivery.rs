//! Webhook delivery worker.
//!
//! Consumes delivery tasks from an in-process queue, posts the signed
//! payload to the endpoint, and schedules retries with exponential
//! backoff. Each retry is a fresh attempt row; the original is finalized
//! with its outcome so history stays queryable.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use netbill_repo::security::sign_webhook;
use netbill_types::{
    AttemptStatus, RepoError, WebhookAttempt, WebhookAttemptId, WebhookEndpointId, WebhookStore,
};

/// Header carrying the HMAC-SHA256 payload signature.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// One unit of work on the delivery queue. Points at a persisted PENDING
/// attempt row; the worker re-reads the row, so a task that outlives its
/// endpoint degrades to a discard instead of a stale delivery.
#[derive(Debug, Clone)]
pub struct DeliveryTask {
    pub attempt_id: WebhookAttemptId,
    pub endpoint_id: WebhookEndpointId,
    pub event: String,
    pub attempt_number: i64,
}

/// Retry and timeout policy for deliveries.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Attempts per logical delivery before giving up
    pub max_attempts: i64,
    /// First retry delay; doubles each subsequent retry
    pub retry_base: Duration,
    /// Consecutive failures after which an endpoint is deactivated
    pub failure_ceiling: i64,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_base: Duration::from_secs(30),
            failure_ceiling: 10,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Delay before retry number `attempt_number + 1`: base * 2^(n-1).
fn backoff_delay(base: Duration, attempt_number: i64) -> Duration {
    let exponent = attempt_number.saturating_sub(1).clamp(0, 16) as u32;
    base * 2u32.pow(exponent)
}

/// Transport seam for posting a signed payload to an endpoint.
///
/// Returns the HTTP status code, or an error string when no response was
/// obtained at all (connect failure, timeout).
#[async_trait::async_trait]
pub trait WebhookTransport: Send + Sync + 'static {
    async fn post(&self, url: &str, body: &str, signature: &str) -> Result<u16, String>;
}

/// Production transport backed by reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl WebhookTransport for HttpTransport {
    async fn post(&self, url: &str, body: &str, signature: &str) -> Result<u16, String> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body.to_owned())
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Ok(response.status().as_u16())
    }
}

/// The worker itself. One instance per process; `run` owns the receiving
/// end of the queue and loops until every sender is dropped.
pub struct DeliveryWorker<S: WebhookStore> {
    store: Arc<S>,
    transport: Arc<dyn WebhookTransport>,
    config: DeliveryConfig,
    /// Used to requeue retries after their backoff sleep. Held weakly so
    /// the worker itself never keeps its own queue open; once all external
    /// senders drop, `run` drains and exits.
    tx: mpsc::WeakUnboundedSender<DeliveryTask>,
}

impl<S: WebhookStore> DeliveryWorker<S> {
    /// Builds a worker together with the sender side of its queue.
    pub fn new(
        store: Arc<S>,
        transport: Arc<dyn WebhookTransport>,
        config: DeliveryConfig,
    ) -> (Self, mpsc::UnboundedSender<DeliveryTask>, mpsc::UnboundedReceiver<DeliveryTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Self {
            store,
            transport,
            config,
            tx: tx.downgrade(),
        };
        (worker, tx, rx)
    }

    /// Drains the queue until all senders are gone. Store errors are
    /// logged and the loop keeps going; one bad task must not stall the
    /// rest of the queue.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<DeliveryTask>) {
        info!(
            max_attempts = self.config.max_attempts,
            failure_ceiling = self.config.failure_ceiling,
            "webhook delivery worker started"
        );
        let worker = Arc::new(self);
        while let Some(task) = rx.recv().await {
            let worker = worker.clone();
            tokio::spawn(async move {
                if let Err(e) = worker.process(&task).await {
                    error!(attempt_id = %task.attempt_id, "delivery task failed: {e}");
                }
            });
        }
        info!("webhook delivery worker stopped");
    }

    /// Handles one task end to end.
    pub async fn process(&self, task: &DeliveryTask) -> Result<(), RepoError> {
        let Some(attempt) = self.store.get_attempt(task.attempt_id).await? else {
            warn!(attempt_id = %task.attempt_id, "delivery task for unknown attempt, dropping");
            return Ok(());
        };

        // Guard: the endpoint may have been deactivated (or the ceiling hit)
        // between scheduling and execution.
        let endpoint = match self.store.get_endpoint(task.endpoint_id).await? {
            Some(ep) if ep.is_active => ep,
            _ => {
                self.store
                    .complete_attempt(
                        task.attempt_id,
                        AttemptStatus::Discarded,
                        None,
                        Some("endpoint inactive".into()),
                    )
                    .await?;
                info!(
                    attempt_id = %task.attempt_id,
                    endpoint_id = %task.endpoint_id,
                    "discarded delivery for inactive endpoint"
                );
                return Ok(());
            }
        };

        let signature = format!("sha256={}", sign_webhook(attempt.payload.as_bytes(), &endpoint.secret));

        match self
            .transport
            .post(&endpoint.url, &attempt.payload, &signature)
            .await
        {
            Ok(code) if (200..300).contains(&code) => {
                self.store
                    .complete_attempt(task.attempt_id, AttemptStatus::Success, Some(code as i64), None)
                    .await?;
                self.store.record_endpoint_success(endpoint.id).await?;
                info!(
                    attempt_id = %task.attempt_id,
                    endpoint_id = %endpoint.id,
                    code,
                    attempt = task.attempt_number,
                    "webhook delivered"
                );
                Ok(())
            }
            Ok(code) => {
                self.handle_failure(task, &attempt, Some(code as i64), None)
                    .await
            }
            Err(e) => self.handle_failure(task, &attempt, None, Some(e)).await,
        }
    }

    async fn handle_failure(
        &self,
        task: &DeliveryTask,
        attempt: &WebhookAttempt,
        response_code: Option<i64>,
        error: Option<String>,
    ) -> Result<(), RepoError> {
        self.store
            .complete_attempt(
                task.attempt_id,
                AttemptStatus::Failed,
                response_code,
                error.clone(),
            )
            .await?;
        let failures = self
            .store
            .record_endpoint_failure(task.endpoint_id, self.config.failure_ceiling)
            .await?;
        warn!(
            attempt_id = %task.attempt_id,
            endpoint_id = %task.endpoint_id,
            attempt = task.attempt_number,
            ?response_code,
            ?error,
            consecutive_failures = failures,
            "webhook delivery failed"
        );

        if task.attempt_number >= self.config.max_attempts {
            warn!(
                endpoint_id = %task.endpoint_id,
                event = %attempt.event,
                "delivery attempts exhausted, giving up"
            );
            return Ok(());
        }

        // Retry: fresh row, same payload bytes, next attempt number.
        let retry = WebhookAttempt::new(
            attempt.endpoint_id,
            attempt.event.clone(),
            attempt.payload.clone(),
            attempt.attempt_number + 1,
        );
        self.store.create_attempt(&retry).await?;

        let delay = backoff_delay(self.config.retry_base, task.attempt_number);
        let next = DeliveryTask {
            attempt_id: retry.id,
            endpoint_id: retry.endpoint_id,
            event: retry.event.clone(),
            attempt_number: retry.attempt_number,
        };
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Requeue only while somebody still holds the queue open.
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(next);
            }
        });
        Ok(())
    }
}
