pub mod config;
pub mod consumer;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod ports;
pub mod s3;
pub mod sqs;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::config::Credentials;
use axum::{
    Router,
    http::Method,
    middleware as axum_middleware,
    routing::{get, patch, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::config::Config;
use crate::ports::{AuditStore, MessageQueue, TransactionStore};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Adapters are threaded through here explicitly; there is no global
/// mutable state besides the logger.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TransactionStore>,
    pub audit: Arc<dyn AuditStore>,
    pub queue: Arc<dyn MessageQueue>,
    pub region: String,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::readiness))
        .route("/live", get(handlers::liveness))
        .route(
            "/transactions",
            post(handlers::transactions::create_transaction)
                .get(handlers::transactions::list_transactions),
        )
        .route("/transactions/:id", get(handlers::transactions::get_transaction))
        .route(
            "/transactions/:id/status",
            patch(handlers::transactions::update_transaction_status),
        )
        .route("/stats", get(handlers::transactions::get_stats))
        .with_state(state)
        .layer(axum_middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(cors_layer())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}

/// Shared AWS SDK config for the region-local side channels. The endpoint
/// override and static credentials target LocalStack-compatible deployments.
pub async fn aws_base_config(config: &Config) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()))
        .endpoint_url(config.aws_endpoint.clone())
        .credentials_provider(Credentials::new("test", "test", None, None, "static"))
        .load()
        .await
}
