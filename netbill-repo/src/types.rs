//! Database row structs mapped to domain types.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use netbill_types::{
    AttemptStatus, Currency, Money, Payment, PaymentId, PaymentStatus, RepoError, WebhookAttempt,
    WebhookAttemptId, WebhookEndpoint, WebhookEndpointId,
};

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepoError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepoError::Database(format!("bad timestamp {raw}: {e}")))
}

fn parse_optional_timestamp(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, RepoError> {
    raw.map(parse_timestamp).transpose()
}

/// Payment row from database.
#[derive(FromRow)]
pub struct DbPayment {
    pub id: String,
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub provider: String,
    pub transaction_ref: Option<String>,
    pub redirect_url: Option<String>,
    pub status: String,
    pub raw_response: Option<String>,
    pub created_at: String,
    pub paid_at: Option<String>,
    pub confirmed_at: Option<String>,
    pub refunded_at: Option<String>,
    pub verified_at: Option<String>,
}

impl DbPayment {
    pub fn into_domain(self) -> Result<Payment, RepoError> {
        let id: PaymentId = self
            .id
            .parse()
            .map_err(|e| RepoError::Database(format!("bad payment id: {e}")))?;
        let currency: Currency = self.currency.parse().map_err(RepoError::Domain)?;
        let status: PaymentStatus = self.status.parse().map_err(RepoError::Domain)?;
        let raw_response = self
            .raw_response
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| RepoError::Database(format!("bad raw_response: {e}")))?;

        Ok(Payment {
            id,
            order_id: self.order_id,
            amount: Money::new(self.amount, currency).map_err(RepoError::Domain)?,
            provider: self.provider,
            transaction_ref: self.transaction_ref,
            redirect_url: self.redirect_url,
            status,
            raw_response,
            created_at: parse_timestamp(&self.created_at)?,
            paid_at: parse_optional_timestamp(self.paid_at.as_deref())?,
            confirmed_at: parse_optional_timestamp(self.confirmed_at.as_deref())?,
            refunded_at: parse_optional_timestamp(self.refunded_at.as_deref())?,
            verified_at: parse_optional_timestamp(self.verified_at.as_deref())?,
        })
    }
}

/// Webhook endpoint row from database.
#[derive(FromRow)]
pub struct DbWebhookEndpoint {
    pub id: String,
    pub url: String,
    pub secret: String,
    pub events: String,
    pub is_active: i64,
    pub failure_count: i64,
    pub created_at: String,
}

impl DbWebhookEndpoint {
    pub fn into_domain(self) -> Result<WebhookEndpoint, RepoError> {
        let id: WebhookEndpointId = self
            .id
            .parse()
            .map_err(|e| RepoError::Database(format!("bad endpoint id: {e}")))?;
        let events: Vec<String> = serde_json::from_str(&self.events)
            .map_err(|e| RepoError::Database(format!("bad events list: {e}")))?;

        Ok(WebhookEndpoint {
            id,
            url: self.url,
            secret: self.secret,
            events,
            is_active: self.is_active != 0,
            failure_count: self.failure_count,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Webhook attempt row from database.
#[derive(FromRow)]
pub struct DbWebhookAttempt {
    pub id: String,
    pub endpoint_id: String,
    pub event: String,
    pub payload: String,
    pub attempt_number: i64,
    pub status: String,
    pub response_code: Option<i64>,
    pub error: Option<String>,
    pub created_at: String,
    pub responded_at: Option<String>,
}

impl DbWebhookAttempt {
    pub fn into_domain(self) -> Result<WebhookAttempt, RepoError> {
        let id: WebhookAttemptId = self
            .id
            .parse()
            .map_err(|e| RepoError::Database(format!("bad attempt id: {e}")))?;
        let endpoint_id: WebhookEndpointId = self
            .endpoint_id
            .parse()
            .map_err(|e| RepoError::Database(format!("bad endpoint id: {e}")))?;
        let status: AttemptStatus = self.status.parse().map_err(RepoError::Domain)?;

        Ok(WebhookAttempt {
            id,
            endpoint_id,
            event: self.event,
            payload: self.payload,
            attempt_number: self.attempt_number,
            status,
            response_code: self.response_code,
            error: self.error,
            created_at: parse_timestamp(&self.created_at)?,
            responded_at: parse_optional_timestamp(self.responded_at.as_deref())?,
        })
    }
}
