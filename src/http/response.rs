//! Client-facing error responses.
//!
//! # Responsibilities
//! - Map every gateway failure to a status code and a fixed message
//! - Render the uniform `{"success":false,"error":"..."}` body
//! - Attach rate-limit metadata to 429 responses
//!
//! # Design Decisions
//! - Messages are fixed strings; causes are logged, never serialized
//! - All verification failures share the 403 body of insufficient permission

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::security::rate_limit::LimitDecision;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Failures the gateway reports to clients.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Not found")]
    NotFound,

    #[error("Authentication required")]
    MissingCredentials,

    #[error("Invalid authorization header")]
    InvalidAuthorizationHeader,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Rate limit exceeded for {path}")]
    RateLimited { path: String, decision: LimitDecision },

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Request timeout")]
    Timeout,

    #[error("Internal server error")]
    Internal,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::MissingCredentials | GatewayError::InvalidAuthorizationHeader => {
                StatusCode::UNAUTHORIZED
            }
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Timeout => StatusCode::REQUEST_TIMEOUT,
            GatewayError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody {
            success: false,
            error: self.to_string(),
        });

        let mut response = (status, body).into_response();

        if let GatewayError::RateLimited { decision, .. } = self {
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
            headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_secs));
            headers.insert(header::RETRY_AFTER, HeaderValue::from(decision.retry_after_secs));
        }

        response
    }
}
