//! Outbound webhook pipeline: dispatch, redaction, delivery.

pub mod delivery;
pub mod dispatcher;
pub mod redact;

pub use delivery::{
    DeliveryConfig, DeliveryTask, DeliveryWorker, HttpTransport, WebhookTransport,
    SIGNATURE_HEADER,
};
pub use dispatcher::WebhookDispatcher;
pub use redact::{redact, REDACTION_MARKER};
