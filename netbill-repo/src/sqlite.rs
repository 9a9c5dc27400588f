//! SQLite repository adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;

use netbill_types::{
    AttemptStatus, Payment, PaymentId, PaymentRepository, PaymentStatus, RepoError,
    TransitionOutcome, TransitionStamps, WebhookAttempt, WebhookAttemptId, WebhookEndpoint,
    WebhookEndpointId, WebhookStore,
};

use crate::types::{DbPayment, DbWebhookAttempt, DbWebhookEndpoint};

const PAYMENT_COLUMNS: &str = "id, order_id, amount, currency, provider, transaction_ref, \
     redirect_url, status, raw_response, created_at, paid_at, confirmed_at, refunded_at, verified_at";

const ATTEMPT_COLUMNS: &str = "id, endpoint_id, event, payload, attempt_number, status, \
     response_code, error, created_at, responded_at";

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let ddl = include_str!("../migrations/0001_create_payments.sql");
        sqlx::query(ddl).execute(&pool).await?;

        let ddl_webhooks = include_str!("../migrations/0002_create_webhooks.sql");
        sqlx::query(ddl_webhooks).execute(&pool).await?;

        tracing::debug!("SQLite schema ready at {}", database_url);

        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_payment(&self, id: PaymentId) -> Result<Payment, RepoError> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?");
        let row: Option<DbPayment> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.ok_or(RepoError::NotFound)?.into_domain()
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("UNIQUE"))
}

// ─────────────────────────────────────────────────────────────────────────────
// PaymentRepository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PaymentRepository for SqliteRepo {
    async fn create_payment(&self, payment: &Payment) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO payments (id, order_id, amount, currency, provider, status, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(payment.id.to_string())
        .bind(&payment.order_id)
        .bind(payment.amount.amount())
        .bind(payment.amount.currency().to_string())
        .bind(&payment.provider)
        .bind(payment.status.as_ref())
        .bind(payment.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepoError> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?");
        let row: Option<DbPayment> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbPayment::into_domain).transpose()
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>, RepoError> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_ref = ?");
        let row: Option<DbPayment> = sqlx::query_as(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbPayment::into_domain).transpose()
    }

    async fn mark_initiated(
        &self,
        id: PaymentId,
        reference: &str,
        redirect_url: Option<&str>,
        raw: &serde_json::Value,
    ) -> Result<Payment, RepoError> {
        let result = sqlx::query(
            r#"UPDATE payments
               SET transaction_ref = ?, redirect_url = ?, raw_response = ?, status = 'INITIATED'
               WHERE id = ? AND status = 'PENDING'"#,
        )
        .bind(reference)
        .bind(redirect_url)
        .bind(raw.to_string())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepoError::Conflict(format!("transaction_ref already taken: {reference}"))
            } else {
                RepoError::Database(e.to_string())
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(RepoError::Conflict(format!(
                "payment {id} is no longer PENDING"
            )));
        }

        self.fetch_payment(id).await
    }

    async fn transition(
        &self,
        id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
        stamps: TransitionStamps,
    ) -> Result<TransitionOutcome, RepoError> {
        // Single conditional UPDATE: the WHERE clause on the current status
        // is what makes concurrent duplicate callbacks converge to one
        // state change.
        let result = sqlx::query(
            r#"UPDATE payments
               SET status = ?,
                   paid_at = COALESCE(?, paid_at),
                   confirmed_at = COALESCE(?, confirmed_at),
                   refunded_at = COALESCE(?, refunded_at),
                   verified_at = COALESCE(?, verified_at),
                   raw_response = COALESCE(?, raw_response)
               WHERE id = ? AND status = ?"#,
        )
        .bind(to.as_ref())
        .bind(stamps.paid_at.map(|t| t.to_rfc3339()))
        .bind(stamps.confirmed_at.map(|t| t.to_rfc3339()))
        .bind(stamps.refunded_at.map(|t| t.to_rfc3339()))
        .bind(stamps.verified_at.map(|t| t.to_rfc3339()))
        .bind(stamps.raw_response.as_ref().map(|v| v.to_string()))
        .bind(id.to_string())
        .bind(from.as_ref())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let payment = self.fetch_payment(id).await?;

        if result.rows_affected() == 1 {
            Ok(TransitionOutcome::Applied(payment))
        } else {
            Ok(TransitionOutcome::Superseded(payment))
        }
    }

    async fn record_verification(
        &self,
        id: PaymentId,
        verified_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(r#"UPDATE payments SET verified_at = ? WHERE id = ?"#)
            .bind(verified_at.to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn list_payments_for_order(&self, order_id: &str) -> Result<Vec<Payment>, RepoError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = ? ORDER BY created_at DESC"
        );
        let rows: Vec<DbPayment> = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbPayment::into_domain).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WebhookStore implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl WebhookStore for SqliteRepo {
    async fn register_endpoint(
        &self,
        url: &str,
        events: Vec<String>,
        secret: &str,
    ) -> Result<WebhookEndpoint, RepoError> {
        let id = WebhookEndpointId::new();
        let now = Utc::now();
        let events_json = serde_json::to_string(&events)
            .map_err(|e| RepoError::Database(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO webhook_endpoints (id, url, secret, events, is_active, failure_count, created_at)
               VALUES (?, ?, ?, ?, 1, 0, ?)"#,
        )
        .bind(id.to_string())
        .bind(url)
        .bind(secret)
        .bind(&events_json)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(WebhookEndpoint {
            id,
            url: url.to_string(),
            secret: secret.to_string(),
            events,
            is_active: true,
            failure_count: 0,
            created_at: now,
        })
    }

    async fn get_endpoint(
        &self,
        id: WebhookEndpointId,
    ) -> Result<Option<WebhookEndpoint>, RepoError> {
        let row: Option<DbWebhookEndpoint> = sqlx::query_as(
            r#"SELECT id, url, secret, events, is_active, failure_count, created_at
               FROM webhook_endpoints WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbWebhookEndpoint::into_domain).transpose()
    }

    async fn list_endpoints(&self) -> Result<Vec<WebhookEndpoint>, RepoError> {
        let rows: Vec<DbWebhookEndpoint> = sqlx::query_as(
            r#"SELECT id, url, secret, events, is_active, failure_count, created_at
               FROM webhook_endpoints ORDER BY created_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbWebhookEndpoint::into_domain).collect()
    }

    async fn active_endpoints_for(&self, event: &str) -> Result<Vec<WebhookEndpoint>, RepoError> {
        // Subscription sets are small JSON arrays; filter in memory after
        // the active-flag cut.
        let rows: Vec<DbWebhookEndpoint> = sqlx::query_as(
            r#"SELECT id, url, secret, events, is_active, failure_count, created_at
               FROM webhook_endpoints WHERE is_active = 1"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let endpoints: Result<Vec<WebhookEndpoint>, RepoError> =
            rows.into_iter().map(DbWebhookEndpoint::into_domain).collect();

        Ok(endpoints?
            .into_iter()
            .filter(|ep| ep.subscribes_to(event))
            .collect())
    }

    async fn create_attempt(&self, attempt: &WebhookAttempt) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO webhook_attempts
               (id, endpoint_id, event, payload, attempt_number, status, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(attempt.id.to_string())
        .bind(attempt.endpoint_id.to_string())
        .bind(&attempt.event)
        .bind(&attempt.payload)
        .bind(attempt.attempt_number)
        .bind(attempt.status.as_ref())
        .bind(attempt.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn get_attempt(
        &self,
        id: WebhookAttemptId,
    ) -> Result<Option<WebhookAttempt>, RepoError> {
        let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM webhook_attempts WHERE id = ?");
        let row: Option<DbWebhookAttempt> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbWebhookAttempt::into_domain).transpose()
    }

    async fn complete_attempt(
        &self,
        id: WebhookAttemptId,
        status: AttemptStatus,
        response_code: Option<i64>,
        error: Option<String>,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"UPDATE webhook_attempts
               SET status = ?, response_code = ?, error = ?, responded_at = ?
               WHERE id = ?"#,
        )
        .bind(status.as_ref())
        .bind(response_code)
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn record_endpoint_success(&self, id: WebhookEndpointId) -> Result<(), RepoError> {
        sqlx::query(r#"UPDATE webhook_endpoints SET failure_count = 0 WHERE id = ?"#)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn record_endpoint_failure(
        &self,
        id: WebhookEndpointId,
        deactivate_after: i64,
    ) -> Result<i64, RepoError> {
        let id_str = id.to_string();

        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        sqlx::query(
            r#"UPDATE webhook_endpoints SET failure_count = failure_count + 1 WHERE id = ?"#,
        )
        .bind(&id_str)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let count: Option<(i64,)> =
            sqlx::query_as(r#"SELECT failure_count FROM webhook_endpoints WHERE id = ?"#)
                .bind(&id_str)
                .fetch_optional(&mut *db_tx)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

        let count = count.ok_or(RepoError::NotFound)?.0;

        if count >= deactivate_after {
            sqlx::query(r#"UPDATE webhook_endpoints SET is_active = 0 WHERE id = ?"#)
                .bind(&id_str)
                .execute(&mut *db_tx)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;
        }

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(count)
    }

    async fn list_attempts_for_endpoint(
        &self,
        id: WebhookEndpointId,
    ) -> Result<Vec<WebhookAttempt>, RepoError> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM webhook_attempts
             WHERE endpoint_id = ? ORDER BY created_at ASC, attempt_number ASC"
        );
        let rows: Vec<DbWebhookAttempt> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbWebhookAttempt::into_domain).collect()
    }
}
