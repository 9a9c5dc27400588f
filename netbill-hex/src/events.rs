//! Domain event bus.
//!
//! An explicit, statically-declared table mapping event name to handler
//! list, built once at startup and passed by reference - no listener
//! auto-discovery, no ambient global registries.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

/// Event emitted when a payment first reaches SUCCESS.
pub const PAYMENT_SUCCEEDED: &str = "payment.succeeded";
/// Event emitted by the order collaborator once provisioning finishes.
pub const ORDER_COMPLETED: &str = "order.completed";
/// Event emitted by the incident collaborator on a status change.
pub const INCIDENT_STATUS_CHANGED: &str = "incident.status_changed";

/// A subscriber on the bus. Handlers own their failures - nothing is
/// reported back to the publisher.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: &str, payload: &serde_json::Value);
}

/// Immutable event -> handlers table.
pub struct EventBus {
    handlers: HashMap<String, Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder {
            handlers: HashMap::new(),
        }
    }

    /// Delivers the event to every registered handler, in registration
    /// order. An event nobody listens to is not an error.
    pub async fn publish(&self, event: &str, payload: &serde_json::Value) {
        match self.handlers.get(event) {
            Some(handlers) => {
                for handler in handlers {
                    handler.handle(event, payload).await;
                }
            }
            None => debug!(event, "no handlers registered for event"),
        }
    }
}

/// Builder for the handler table.
pub struct EventBusBuilder {
    handlers: HashMap<String, Vec<Arc<dyn EventHandler>>>,
}

impl EventBusBuilder {
    /// Registers a handler for one event name.
    pub fn on(mut self, event: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.entry(event.into()).or_default().push(handler);
        self
    }

    pub fn build(self) -> EventBus {
        EventBus {
            handlers: self.handlers,
        }
    }
}
