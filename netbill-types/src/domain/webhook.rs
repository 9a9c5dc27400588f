//! Webhook subscriber and delivery-attempt models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Unique identifier for a webhook endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebhookEndpointId(Uuid);

impl WebhookEndpointId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WebhookEndpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WebhookEndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WebhookEndpointId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebhookAttemptId(Uuid);

impl WebhookAttemptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WebhookAttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WebhookAttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WebhookAttemptId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A registered webhook subscriber.
///
/// Read-only to the dispatcher and delivery worker apart from the health
/// counters, which only the delivery worker touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub id: WebhookEndpointId,
    /// Target URL for deliveries
    pub url: String,
    /// Shared secret used to sign outbound payloads
    pub secret: String,
    /// Subscribed event names. Empty means all events.
    pub events: Vec<String>,
    pub is_active: bool,
    /// Consecutive failed deliveries; reset to zero on the next success
    pub failure_count: i64,
    pub created_at: DateTime<Utc>,
}

impl WebhookEndpoint {
    /// Returns true when this endpoint subscribes to the given event.
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.events.is_empty() || self.events.iter().any(|e| e == event)
    }
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    #[default]
    Pending,
    Success,
    Failed,
    /// Terminal, never retried - typically an inactive or deleted endpoint
    Discarded,
}

impl AsRef<str> for AttemptStatus {
    fn as_ref(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Discarded => "DISCARDED",
        }
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl std::str::FromStr for AttemptStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "DISCARDED" => Ok(Self::Discarded),
            other => Err(DomainError::ValidationError(format!(
                "Unknown attempt status: {}",
                other
            ))),
        }
    }
}

/// One delivery try for one event/endpoint pair.
///
/// Retries create a new row with `attempt_number + 1` rather than mutating
/// this one, so the full delivery history stays queryable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAttempt {
    pub id: WebhookAttemptId,
    pub endpoint_id: WebhookEndpointId,
    pub event: String,
    /// The signed envelope, serialized once at creation so every retry
    /// sends identical bytes
    pub payload: String,
    /// 1-based; strictly increasing within one logical delivery
    pub attempt_number: i64,
    pub status: AttemptStatus,
    pub response_code: Option<i64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl WebhookAttempt {
    /// Creates a pending attempt.
    pub fn new(
        endpoint_id: WebhookEndpointId,
        event: impl Into<String>,
        payload: impl Into<String>,
        attempt_number: i64,
    ) -> Self {
        Self {
            id: WebhookAttemptId::new(),
            endpoint_id,
            event: event.into(),
            payload: payload.into(),
            attempt_number,
            status: AttemptStatus::Pending,
            response_code: None,
            error: None,
            created_at: Utc::now(),
            responded_at: None,
        }
    }
}
