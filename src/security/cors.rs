//! CORS response headers.
//!
//! # Responsibilities
//! - Stamp the fixed CORS header set on every response
//! - Answer preflight (`OPTIONS`) requests without touching any other layer
//!
//! # Design Decisions
//! - Header values are built once at startup; a bad origin fails construction
//! - Existing handler-set CORS headers are overwritten, never merged

use axum::body::Body;
use axum::http::header::{
    InvalidHeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;

use crate::config::schema::CorsConfig;

pub const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Precomputed CORS headers.
#[derive(Debug, Clone)]
pub struct CorsHeaders {
    origin: HeaderValue,
    allow_credentials: bool,
}

impl CorsHeaders {
    pub fn new(config: &CorsConfig) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            origin: HeaderValue::from_str(&config.allowed_origin)?,
            allow_credentials: config.allow_credentials,
        })
    }

    /// Add the CORS header set to `headers`.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.origin.clone());
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
    }

    /// `204 No Content` with the CORS headers, plus credentials if enabled.
    pub fn preflight(&self) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        self.apply(response.headers_mut());
        if self.allow_credentials {
            response.headers_mut().insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cors(origin: &str) -> CorsHeaders {
        CorsHeaders::new(&CorsConfig {
            allowed_origin: origin.to_string(),
            allow_credentials: true,
        })
        .unwrap()
    }

    #[test]
    fn test_apply_overwrites() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("https://evil"));

        cors("https://app.example.com").apply(&mut headers);

        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example.com");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], ALLOWED_METHODS);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], ALLOWED_HEADERS);
        assert_eq!(headers.get_all(ACCESS_CONTROL_ALLOW_ORIGIN).iter().count(), 1);
    }

    #[test]
    fn test_preflight() {
        let response = cors("*").preflight();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn test_preflight_without_credentials() {
        let cors = CorsHeaders::new(&CorsConfig {
            allowed_origin: "*".into(),
            allow_credentials: false,
        })
        .unwrap();
        assert!(cors
            .preflight()
            .headers()
            .get(ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .is_none());
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let result = CorsHeaders::new(&CorsConfig {
            allowed_origin: "bad\norigin".into(),
            allow_credentials: false,
        });
        assert!(result.is_err());
    }
}
