//! HTTP request handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use netbill_types::{
    AppError, CallbackAck, InitiatePaymentRequest, InitiatePaymentResponse, PaymentId,
    PaymentRepository, RegisterWebhookRequest, WebhookEndpointId, WebhookResponse, WebhookStore,
};

use crate::PaymentFlowService;

/// Application state shared across handlers.
pub struct AppState<R: PaymentRepository + WebhookStore> {
    pub service: PaymentFlowService<R>,
    pub store: Arc<R>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::InvalidTransition { from, to } => (
                StatusCode::CONFLICT,
                format!("Invalid status transition: {} -> {}", from, to),
            ),
            AppError::SignatureInvalid => (
                StatusCode::BAD_REQUEST,
                "Callback signature verification failed".to_string(),
            ),
            AppError::GatewayUnavailable(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Payments
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, req), fields(order_id = %req.order_id))]
pub async fn initiate_payment<R: PaymentRepository + WebhookStore>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<InitiatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state.service.initiate(req).await?;
    let response = InitiatePaymentResponse {
        payment_id: payment.id,
        status: payment.status,
        transaction_ref: payment.transaction_ref.unwrap_or_default(),
        redirect_url: payment.redirect_url,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get a payment by ID.
#[tracing::instrument(skip(state), fields(payment_id = %id))]
pub async fn get_payment<R: PaymentRepository + WebhookStore>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id: PaymentId = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid payment ID".into()))?;

    let payment = state.service.get_payment(payment_id).await?;
    Ok(Json(payment))
}

/// List payments for an order.
#[tracing::instrument(skip(state), fields(order_id = %order_id))]
pub async fn list_order_payments<R: PaymentRepository + WebhookStore>(
    State(state): State<Arc<AppState<R>>>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payments = state.service.list_payments_for_order(&order_id).await?;
    Ok(Json(payments))
}

/// Synchronously reconcile a payment against the provider.
#[tracing::instrument(skip(state), fields(payment_id = %id))]
pub async fn verify_payment<R: PaymentRepository + WebhookStore>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id: PaymentId = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid payment ID".into()))?;

    let payment = state.service.verify(payment_id).await?;
    Ok(Json(payment))
}

/// Provider callback entry point. Body stays raw bytes: the gateway
/// adapter owns parsing and signature verification.
#[tracing::instrument(skip(state, headers, body), fields(provider = %provider))]
pub async fn provider_callback<R: PaymentRepository + WebhookStore>(
    State(state): State<Arc<AppState<R>>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if provider != state.service.provider_name() {
        return Err(AppError::NotFound(format!("Unknown provider: {provider}")).into());
    }

    let headers = header_map(&headers);
    let payment = state.service.record_callback(&body, &headers).await?;
    Ok(Json(CallbackAck {
        payment_id: payment.id,
        status: payment.status,
    }))
}

/// Flattens axum's header map into lowercase name -> value pairs.
/// Non-UTF8 values are skipped.
fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Webhooks
// ─────────────────────────────────────────────────────────────────────────────

/// Register a new webhook endpoint. The generated signing secret is
/// returned once, here, and never again.
#[tracing::instrument(skip(state), fields(url = %req.url))]
pub async fn register_webhook<R: PaymentRepository + WebhookStore>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<RegisterWebhookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.url.is_empty() {
        return Err(AppError::BadRequest("Webhook URL cannot be empty".into()).into());
    }
    if !req.url.starts_with("http://") && !req.url.starts_with("https://") {
        return Err(AppError::BadRequest("Webhook URL must be http(s)".into()).into());
    }

    let secret = netbill_repo::security::generate_endpoint_secret();
    let endpoint = state
        .store
        .register_endpoint(&req.url, req.events, &secret)
        .await
        .map_err(AppError::from)?;

    Ok((
        StatusCode::CREATED,
        Json(WebhookResponse {
            id: endpoint.id,
            url: endpoint.url,
            secret: endpoint.secret,
            events: endpoint.events,
            is_active: endpoint.is_active,
        }),
    ))
}

/// List all registered webhook endpoints. Secrets are not repeated here.
#[tracing::instrument(skip(state))]
pub async fn list_webhooks<R: PaymentRepository + WebhookStore>(
    State(state): State<Arc<AppState<R>>>,
) -> Result<impl IntoResponse, ApiError> {
    let endpoints = state.store.list_endpoints().await.map_err(AppError::from)?;

    let response: Vec<_> = endpoints
        .into_iter()
        .map(|ep| {
            serde_json::json!({
                "id": ep.id,
                "url": ep.url,
                "events": ep.events,
                "is_active": ep.is_active,
                "failure_count": ep.failure_count,
                "created_at": ep.created_at,
            })
        })
        .collect();

    Ok(Json(response))
}

/// Delivery history for one endpoint, oldest first.
#[tracing::instrument(skip(state), fields(endpoint_id = %id))]
pub async fn list_webhook_attempts<R: PaymentRepository + WebhookStore>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let endpoint_id: WebhookEndpointId = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid webhook endpoint ID".into()))?;

    if state
        .store
        .get_endpoint(endpoint_id)
        .await
        .map_err(AppError::from)?
        .is_none()
    {
        return Err(AppError::NotFound(format!("Webhook endpoint {endpoint_id}")).into());
    }

    let attempts = state
        .store
        .list_attempts_for_endpoint(endpoint_id)
        .await
        .map_err(AppError::from)?;
    Ok(Json(attempts))
}
