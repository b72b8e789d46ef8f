//! QA Agent API Gateway
//!
//! HTTP surface of the question answering service:
//! - `POST /ask` runs the QA pipeline
//! - `GET /health` and `GET /ready` probes
//! - `GET /metrics` Prometheus scrape endpoint

pub mod agent;
pub mod handlers;
pub mod middleware;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

pub use agent::{QaAgent, QaOutcome, QaRequest};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<QaAgent>,
    pub metrics: Option<PrometheusHandle>,
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    Router::new()
        .route("/ask", post(handlers::ask::ask))
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::metrics::metrics))
        .route_layer(axum::middleware::from_fn(middleware::metrics::track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}
