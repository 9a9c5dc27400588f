//! HTTP server configuration and startup.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use netbill_types::{PaymentRepository, WebhookStore};

use super::handlers::{self, AppState};
use crate::PaymentFlowService;

/// HTTP server for the billing API.
pub struct HttpServer<R: PaymentRepository + WebhookStore> {
    state: Arc<AppState<R>>,
}

impl<R: PaymentRepository + WebhookStore> HttpServer<R> {
    pub fn new(service: PaymentFlowService<R>, store: Arc<R>) -> Self {
        Self {
            state: Arc::new(AppState { service, store }),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/payments", post(handlers::initiate_payment::<R>))
            .route("/api/payments/{id}", get(handlers::get_payment::<R>))
            .route(
                "/api/payments/{id}/verify",
                post(handlers::verify_payment::<R>),
            )
            .route(
                "/api/orders/{order_id}/payments",
                get(handlers::list_order_payments::<R>),
            )
            .route(
                "/api/callbacks/{provider}",
                post(handlers::provider_callback::<R>),
            )
            .route("/api/webhooks", post(handlers::register_webhook::<R>))
            .route("/api/webhooks", get(handlers::list_webhooks::<R>))
            .route(
                "/api/webhooks/{id}/attempts",
                get(handlers::list_webhook_attempts::<R>),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
