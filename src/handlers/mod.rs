use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;

use crate::AppState;

pub mod transactions;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqs: Option<&'static str>,
}

/// Composite readiness over all three dependencies, probed in order.
/// Short-circuits on the first failure so the body names the culprit.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut response = HealthResponse {
        status: "healthy",
        region: state.region.clone(),
        database: None,
        s3: None,
        sqs: None,
    };

    if state.store.health().await.is_err() {
        response.status = "unhealthy";
        response.database = Some("unhealthy");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(response));
    }
    response.database = Some("healthy");

    if state.audit.health().await.is_err() {
        response.status = "unhealthy";
        response.s3 = Some("unhealthy");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(response));
    }
    response.s3 = Some("healthy");

    if state.queue.health().await.is_err() {
        response.status = "unhealthy";
        response.sqs = Some("unhealthy");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(response));
    }
    response.sqs = Some("healthy");

    (StatusCode::OK, Json(response))
}

/// SQL-only probe used by orchestrators to gate traffic.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if state.store.health().await.is_err() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready", "reason": "database unavailable" })),
        );
    }

    (StatusCode::OK, Json(json!({ "status": "ready" })))
}

/// The process answering at all is proof of life.
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "alive" })))
}
