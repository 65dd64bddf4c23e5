//! HTTP API for the siteforms content store.
//!
//! One generic upsert endpoint per content type: the whole record array for
//! a type lives in a single envelope, and every write replaces it.

pub mod handlers;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use siteforms_core::defaults::MAX_UPLOAD_BYTES;
use siteforms_db::{Database, UploadStore};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs, so request ids
/// sort chronologically in logs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub uploads: Arc<UploadStore>,
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// HTTP-facing error type. Everything serializes as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    Internal(siteforms_core::Error),
    NotFound(String),
    BadRequest(String),
}

impl From<siteforms_core::Error> for ApiError {
    fn from(err: siteforms_core::Error) -> Self {
        match &err {
            siteforms_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            siteforms_core::Error::EnvelopeNotFound(id) => {
                ApiError::NotFound(format!("Envelope '{}' not found", id))
            }
            siteforms_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            _ => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Internal(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

// =============================================================================
// ROUTER
// =============================================================================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Builds the application router. Tests drive this directly against a
/// scratch database.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/form/:content_type",
            get(handlers::forms::list_envelopes)
                .post(handlers::forms::create_envelope)
                .put(handlers::forms::replace_envelope)
                .delete(handlers::forms::delete_envelope),
        )
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT]),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .with_state(state)
}
