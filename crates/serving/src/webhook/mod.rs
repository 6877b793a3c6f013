//! Admission webhook HTTP surface
//!
//! Exposes the InferenceService defaulting and validation handlers plus the
//! health endpoints the deployment probes.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::{Framework, InferenceServicesConfig};

pub mod admission;

pub use admission::{defaulting_patch, mutate_handler, validate_handler};

/// The API server gives up on admission webhooks after 10s by default
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state for webhook handlers
#[derive(Debug, Clone)]
pub struct WebhookState {
    /// Framework registry, loaded once at startup
    pub config: Arc<InferenceServicesConfig>,
}

impl WebhookState {
    pub fn new(config: InferenceServicesConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

/// Build the webhook router
pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/mutate", post(mutate_handler))
        .route("/validate", post(validate_handler))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    REQUEST_TIMEOUT,
                )),
        )
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "serving-webhook",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn readiness_check(State(state): State<Arc<WebhookState>>) -> Json<Value> {
    let frameworks: Vec<&str> = Framework::ALL.iter().map(|f| f.key()).collect();
    Json(json!({
        "status": "ready",
        "service": "serving-webhook",
        "version": env!("CARGO_PKG_VERSION"),
        "frameworks": frameworks,
        "configValid": state.config.validate().is_ok()
    }))
}
