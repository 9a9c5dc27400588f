//! Webhook fan-out dispatcher.
//!
//! Subscribed to the event bus; turns one domain event into one PENDING
//! attempt row plus one queued delivery task per matching endpoint.
//! Failures are isolated per endpoint: one broken subscriber never blocks
//! delivery to the others.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error};

use netbill_types::{WebhookAttempt, WebhookStore};

use crate::events::EventHandler;
use crate::outbound::delivery::DeliveryTask;
use crate::outbound::redact::redact;

pub struct WebhookDispatcher<S: WebhookStore> {
    store: Arc<S>,
    queue: mpsc::UnboundedSender<DeliveryTask>,
}

impl<S: WebhookStore> WebhookDispatcher<S> {
    pub fn new(store: Arc<S>, queue: mpsc::UnboundedSender<DeliveryTask>) -> Self {
        Self { store, queue }
    }

    /// Builds the envelope sent to subscribers. Serialized exactly once
    /// per endpoint, at attempt creation, so retries sign and send the
    /// same bytes.
    fn envelope(event: &str, payload: &serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "event": event,
            "data": redact(payload),
            "timestamp": Utc::now().to_rfc3339(),
        })
    }
}

#[async_trait::async_trait]
impl<S: WebhookStore> EventHandler for WebhookDispatcher<S> {
    async fn handle(&self, event: &str, payload: &serde_json::Value) {
        let endpoints = match self.store.active_endpoints_for(event).await {
            Ok(endpoints) => endpoints,
            Err(e) => {
                error!(event, "failed to list webhook endpoints: {e}");
                return;
            }
        };
        if endpoints.is_empty() {
            debug!(event, "no active webhook endpoints subscribed");
            return;
        }

        let envelope = Self::envelope(event, payload);
        let body = match serde_json::to_string(&envelope) {
            Ok(body) => body,
            Err(e) => {
                error!(event, "failed to serialize webhook envelope: {e}");
                return;
            }
        };

        for endpoint in endpoints {
            let attempt = WebhookAttempt::new(endpoint.id, event, body.clone(), 1);
            if let Err(e) = self.store.create_attempt(&attempt).await {
                error!(
                    event,
                    endpoint_id = %endpoint.id,
                    "failed to persist webhook attempt: {e}"
                );
                continue;
            }
            let task = DeliveryTask {
                attempt_id: attempt.id,
                endpoint_id: endpoint.id,
                event: event.to_string(),
                attempt_number: 1,
            };
            if self.queue.send(task).is_err() {
                error!(
                    event,
                    endpoint_id = %endpoint.id,
                    "delivery queue closed, attempt row left pending"
                );
            }
        }
    }
}
