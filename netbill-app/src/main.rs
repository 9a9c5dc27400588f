//! # NetBill Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository adapter
//! - Select the gateway adapter
//! - Start the webhook delivery worker
//! - Start the HTTP server

mod config;
mod provisioning;

use std::sync::Arc;

use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use netbill_gateway::{FakeGateway, SwiftPayGateway};
use netbill_hex::{
    EventBus, EventHandler, PaymentFlowService,
    events::{INCIDENT_STATUS_CHANGED, ORDER_COMPLETED, PAYMENT_SUCCEEDED},
    inbound::HttpServer,
    outbound::{DeliveryConfig, DeliveryWorker, HttpTransport, WebhookDispatcher},
};
use netbill_repo::build_repo;
use netbill_types::PaymentGateway;

use config::{Config, GatewayMode};

fn init_tracer() -> (sdktrace::Tracer, sdktrace::SdkTracerProvider) {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .expect("failed to create OTLP span exporter");

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    (provider.tracer("netbill-service"), provider)
}

fn build_gateway(config: &Config) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    Ok(match config.gateway_mode {
        GatewayMode::SwiftPay => Arc::new(SwiftPayGateway::new(
            &config.swiftpay_base_url,
            &config.swiftpay_api_key,
            &config.swiftpay_callback_secret,
        )?),
        GatewayMode::Fake => Arc::new(FakeGateway::default()),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize OpenTelemetry tracing
    let (otel_tracer, otel_provider) = init_tracer();
    let telemetry = tracing_opentelemetry::layer().with_tracer(otel_tracer);

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,netbill_app=debug,netbill_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting netbill server on port {}", config.port);
    tracing::info!("Using database: {}", config.database_url);

    // Build repository (handles connection and migration)
    let repo = Arc::new(build_repo(&config.database_url).await?);

    // Select the gateway adapter once, at startup
    let gateway = build_gateway(&config)?;
    tracing::info!("Payment gateway: {}", gateway.name());

    // Webhook delivery worker + dispatcher
    let delivery_config = DeliveryConfig {
        max_attempts: config.webhook_max_attempts,
        retry_base: config.webhook_retry_base,
        failure_ceiling: config.webhook_failure_ceiling,
        timeout: config.webhook_timeout,
    };
    let transport = Arc::new(HttpTransport::new(config.webhook_timeout)?);
    let (worker, queue, queue_rx) = DeliveryWorker::new(repo.clone(), transport, delivery_config);
    tokio::spawn(worker.run(queue_rx));

    let dispatcher: Arc<dyn EventHandler> = Arc::new(WebhookDispatcher::new(repo.clone(), queue));
    let provisioner = provisioning::OrderProvisioner::new();
    let events = Arc::new(
        EventBus::builder()
            .on(PAYMENT_SUCCEEDED, dispatcher.clone())
            .on(PAYMENT_SUCCEEDED, provisioner.clone())
            .on(ORDER_COMPLETED, dispatcher.clone())
            .on(INCIDENT_STATUS_CHANGED, dispatcher)
            .build(),
    );
    provisioner.attach(&events);

    // Create the payment service
    let service = PaymentFlowService::new(repo.clone(), gateway, events);

    // Create and run the HTTP server
    let server = HttpServer::new(service, repo);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    let _ = otel_provider.shutdown();
    Ok(())
}
