//! Order provisioning listener.
//!
//! Consumes `payment.succeeded` and republishes `order.completed` for the
//! order-side subscribers. Real fulfilment lives with an external
//! collaborator; this closes the event chain so webhook subscribers see
//! both events.

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use netbill_hex::events::ORDER_COMPLETED;
use netbill_hex::{EventBus, EventHandler};

pub struct OrderProvisioner {
    /// Set after the bus is built; Weak because the bus owns this handler.
    bus: OnceLock<Weak<EventBus>>,
}

impl OrderProvisioner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            bus: OnceLock::new(),
        })
    }

    /// Wires the listener back to the bus it is registered on.
    pub fn attach(&self, bus: &Arc<EventBus>) {
        let _ = self.bus.set(Arc::downgrade(bus));
    }
}

#[async_trait]
impl EventHandler for OrderProvisioner {
    async fn handle(&self, _event: &str, payload: &serde_json::Value) {
        let Some(order_id) = payload.get("order_id").and_then(|v| v.as_str()) else {
            warn!("payment.succeeded payload missing order_id, skipping order completion");
            return;
        };

        let completed = serde_json::json!({
            "order_id": order_id,
            "payment_id": payload.get("payment_id"),
            "completed_at": Utc::now().to_rfc3339(),
        });

        match self.bus.get().and_then(Weak::upgrade) {
            Some(bus) => {
                debug!(order_id, "publishing order completion");
                bus.publish(ORDER_COMPLETED, &completed).await;
            }
            None => warn!("order provisioner not attached to an event bus"),
        }
    }
}
