//! HTTP handlers for the registration endpoint.
//!
//! The transport checks run in this order before the authority sees the
//! request:
//!
//! 1. Method must be `POST` (405 otherwise)
//! 2. `Content-Type` must be exactly `application/json` (400 otherwise)
//!
//! Only then is the body read, capped at [`MAX_BODY_BYTES`], and handed to
//! [`RegistrationAuthority::register_payload`], which decodes and decides
//! under its lock.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use regauth_core::RegistrationError;
use regauth_core::authority::{APPLICATION_JSON, RegistrationAuthority};

/// Largest request body read; anything longer is rejected as an invalid
/// body.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Builds the router: registration at `/`, liveness at `/healthz`.
pub fn router(authority: Arc<RegistrationAuthority>) -> Router {
    Router::new()
        .route("/", any(register))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(authority)
}

/// Handles a registration request.
///
/// Every response, success or error, is a pretty-printed JSON document.
pub async fn register(
    State(authority): State<Arc<RegistrationAuthority>>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response {
    if method != Method::POST {
        tracing::warn!(method = %method, "rejecting registration: method not allowed");
        return RegistrationError::MethodNotAllowed.into_response();
    }

    if !is_json(&headers) {
        tracing::warn!(
            content_type = ?headers.get(CONTENT_TYPE),
            "rejecting registration: invalid content type"
        );
        return RegistrationError::InvalidContentType.into_response();
    }

    let payload = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting registration: body could not be read");
            return RegistrationError::InvalidBody(e.to_string()).into_response();
        },
    };

    match authority.register_payload(&payload) {
        Ok(outcome) => outcome.into_response(),
        Err(err) => err.into_response(),
    }
}

/// Returns true if the `Content-Type` header is exactly `application/json`.
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .is_some_and(|value| value.as_bytes() == APPLICATION_JSON.as_bytes())
}
