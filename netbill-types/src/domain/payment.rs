//! Payment domain model and status transition table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Money;
use crate::error::DomainError;

/// Unique identifier for a Payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Creates a new random PaymentId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a PaymentId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PaymentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Initiated,
    Processing,
    Success,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    /// The authoritative transition table. No other code path may decide
    /// whether a status change is legal.
    pub fn can_transition_to(self, target: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, target),
            (Pending, Initiated)
                | (Pending, Cancelled)
                | (Pending, Failed)
                | (Initiated, Processing)
                | (Initiated, Success)
                | (Initiated, Failed)
                | (Initiated, Cancelled)
                | (Processing, Success)
                | (Processing, Failed)
                | (Success, Refunded)
        )
    }

    /// Returns true when the status has no outgoing edges besides refund.
    pub fn is_terminal(self) -> bool {
        use PaymentStatus::*;
        matches!(self, Success | Failed | Cancelled | Refunded)
    }
}

impl AsRef<str> for PaymentStatus {
    fn as_ref(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Initiated => "INITIATED",
            Self::Processing => "PROCESSING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "INITIATED" => Ok(Self::Initiated),
            "PROCESSING" => Ok(Self::Processing),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            "REFUNDED" => Ok(Self::Refunded),
            other => Err(DomainError::ValidationError(format!(
                "Unknown payment status: {}",
                other
            ))),
        }
    }
}

/// One attempted or completed monetary transaction against a provider.
///
/// Payments are never deleted - terminal states are retained for audit.
/// Only the orchestration service mutates them, through the repository port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    /// The order this payment settles
    pub order_id: String,
    /// Amount and currency, fixed at creation
    pub amount: Money,
    /// Provider that handles this payment
    pub provider: String,
    /// External transaction reference assigned by the provider.
    /// Unique - the idempotency key for callback processing.
    pub transaction_ref: Option<String>,
    /// Where the customer is sent to complete the payment
    pub redirect_url: Option<String>,
    /// Current lifecycle status
    pub status: PaymentStatus,
    /// Opaque provider payload retained for audit
    pub raw_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    /// Last synchronous reconciliation time
    pub verified_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Creates a new PENDING payment for an order.
    pub fn new(order_id: impl Into<String>, amount: Money, provider: impl Into<String>) -> Self {
        Self {
            id: PaymentId::new(),
            order_id: order_id.into(),
            amount,
            provider: provider.into(),
            transaction_ref: None,
            redirect_url: None,
            status: PaymentStatus::Pending,
            raw_response: None,
            created_at: Utc::now(),
            paid_at: None,
            confirmed_at: None,
            refunded_at: None,
            verified_at: None,
        }
    }

    /// Checks that moving to `target` is legal from the current status.
    pub fn ensure_transition(&self, target: PaymentStatus) -> Result<(), DomainError> {
        if self.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                from: self.status,
                to: target,
            })
        }
    }
}
