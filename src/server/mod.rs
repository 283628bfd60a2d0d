//! HTTP server: webhook ingestion, metrics, health.
//!
//! The webhook endpoint validates signatures, classifies the delivery, and
//! publishes relevant events to the queue before returning 202 Accepted. All
//! actual processing happens asynchronously in the queue consumers.
//!
//! # Endpoints
//!
//! - `POST /webhook` - GitHub webhook deliveries
//! - `GET /metrics` - Prometheus exposition
//! - `GET /health` - liveness probe

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use thiserror::Error;
use tracing::{debug, warn};

use crate::events::{classify, ParseError};
use crate::metrics::Metrics;
use crate::queue::{EventSink, QueueError};
use crate::webhooks::verify_signature;

/// Header name for the GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for the GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for the GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Shared application state, passed to handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    webhook_secret: Vec<u8>,
    sink: Arc<dyn EventSink>,
    metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        webhook_secret: impl Into<Vec<u8>>,
        sink: Arc<dyn EventSink>,
        metrics: Arc<Metrics>,
    ) -> AppState {
        AppState {
            inner: Arc::new(AppStateInner {
                webhook_secret: webhook_secret.into(),
                sink,
                metrics,
            }),
        }
    }

    fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] ParseError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            WebhookError::Queue(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .ok_or(WebhookError::MissingHeader(name))
}

/// Webhook handler.
///
/// Signature verification happens before any parsing; unauthenticated
/// requests never reach the JSON decoder. Deliveries that classify to
/// nothing (bot comments, irrelevant actions, plain issues) are accepted
/// and dropped.
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let event_type = get_header(&headers, HEADER_EVENT)?;
    let signature_header = get_header(&headers, HEADER_SIGNATURE)?;
    let delivery_id = get_header(&headers, HEADER_DELIVERY).unwrap_or_default();

    debug!(delivery = %delivery_id, event = %event_type, "received webhook");

    if !verify_signature(&body, &signature_header, app_state.webhook_secret()) {
        warn!(delivery = %delivery_id, "invalid webhook signature");
        return Err(WebhookError::InvalidSignature);
    }

    let Some(event) = classify(&event_type, &body)? else {
        return Ok((StatusCode::ACCEPTED, "Accepted (ignored)"));
    };

    debug!(delivery = %delivery_id, pr = %event.pr_number(), "enqueueing event");
    app_state.inner.sink.publish(event).await?;

    Ok((StatusCode::ACCEPTED, "Accepted"))
}

/// Prometheus exposition handler.
pub async fn metrics_handler(State(app_state): State<AppState>) -> Response {
    match app_state.inner.metrics.export() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => {
            warn!(error = %e, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Liveness probe handler.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Builds the axum router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
