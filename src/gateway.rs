//! Per-request state machine.
//!
//! ```text
//! Start → Preflight → RateLimit → RouteMatch → AuthGate → Dispatch → Respond
//! ```
//!
//! Every state may end the request early with an error response. The whole
//! walk runs under the request deadline; an expired request is answered
//! like any other failure. Whatever
//! the outcome, the response leaves with the CORS headers attached. The
//! gateway holds no mutable state of its own; the route table is frozen
//! before the first request and shared read-only between invocations.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{InvalidHeaderName, InvalidHeaderValue, AUTHORIZATION};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, Method};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures_util::FutureExt;
use thiserror::Error;

use crate::auth::permissions::{check_permission, RequiredPermission};
use crate::auth::verifier::TokenVerifier;
use crate::config::GatewayConfig;
use crate::http::request::{AuthContext, RequestContext, X_REQUEST_ID};
use crate::http::response::GatewayError;
use crate::observability::metrics;
use crate::routing::RouteTable;
use crate::security::cors::CorsHeaders;
use crate::security::rate_limit::{rate_limit_key, RateLimiter};

/// Invalid gateway wiring detected at startup.
#[derive(Debug, Error)]
pub enum GatewayBuildError {
    #[error("invalid CORS origin")]
    InvalidOrigin(#[from] InvalidHeaderValue),

    #[error("invalid client IP header name")]
    InvalidClientIpHeader(#[from] InvalidHeaderName),
}

/// The router with its authentication gate.
///
/// Cheap to clone; clones share the same route table and collaborators.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<Inner>,
}

struct Inner {
    env: Arc<GatewayConfig>,
    routes: RouteTable,
    verifier: TokenVerifier,
    limiter: Option<Arc<dyn RateLimiter>>,
    cors: CorsHeaders,
    client_ip_header: Option<HeaderName>,
    max_body_bytes: usize,
    request_timeout: Duration,
}

/// Route label used in logs and metrics when no route matched.
const UNMATCHED: &str = "none";

/// Route label for requests cut off by the deadline.
const TIMED_OUT: &str = "timeout";

impl Gateway {
    /// Assemble a gateway. `limiter` is `None` when rate limiting is disabled.
    pub fn new(
        env: Arc<GatewayConfig>,
        routes: RouteTable,
        verifier: TokenVerifier,
        limiter: Option<Arc<dyn RateLimiter>>,
    ) -> Result<Self, GatewayBuildError> {
        let cors = CorsHeaders::new(&env.cors)?;
        let client_ip_header = env
            .rate_limit
            .client_ip_header
            .as_deref()
            .map(HeaderName::try_from)
            .transpose()?;
        let max_body_bytes = env.limits.max_body_bytes;
        let request_timeout = Duration::from_secs(env.limits.request_timeout_secs);

        Ok(Self {
            inner: Arc::new(Inner {
                env,
                routes,
                verifier,
                limiter,
                cors,
                client_ip_header,
                max_body_bytes,
                request_timeout,
            }),
        })
    }

    /// An axum router that sends every request through [`Gateway::handle`].
    pub fn into_router(self) -> Router {
        Router::new()
            .fallback(|State(gateway): State<Gateway>, request: Request| async move {
                gateway.handle(request).await
            })
            .with_state(self)
    }

    /// Handle one request to completion. Never fails; every error becomes a response.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let request_id = request_id(request.headers());

        let outcome = tokio::time::timeout(self.inner.request_timeout, self.process(request)).await;
        let (mut response, route) = match outcome {
            Ok(Ok(outcome)) => outcome,
            Ok(Err((error, route))) => (error.into_response(), route),
            Err(_) => {
                tracing::warn!(
                    request_id = %request_id,
                    path = %path,
                    timeout_secs = self.inner.request_timeout.as_secs(),
                    "Request timed out"
                );
                (GatewayError::Timeout.into_response(), TIMED_OUT.to_string())
            }
        };

        self.inner.cors.apply(response.headers_mut());
        metrics::record_request(method.as_str(), response.status().as_u16(), &route, start);
        response
    }

    async fn process(
        &self,
        request: Request<Body>,
    ) -> Result<(Response, String), (GatewayError, String)> {
        let inner = &self.inner;

        if *request.method() == Method::OPTIONS {
            return Ok((inner.cors.preflight(), "preflight".to_string()));
        }

        let (parts, body) = request.into_parts();
        let path = parts.uri.path().to_string();
        let request_id = request_id(&parts.headers);

        self.check_rate_limit(&parts, &path, &request_id)
            .await
            .map_err(|e| (e, UNMATCHED.to_string()))?;

        let Some(matched) = inner.routes.match_route(&parts.method, &path) else {
            tracing::debug!(request_id = %request_id, method = %parts.method, path = %path, "No route matched");
            return Err((GatewayError::NotFound, UNMATCHED.to_string()));
        };
        let route_label = matched.route.path().to_string();

        let auth = match matched.route.permission() {
            Some(required) => Some(
                self.authorize(&parts.headers, required, &request_id, &route_label)
                    .await
                    .map_err(|e| (e, route_label.clone()))?,
            ),
            None => None,
        };

        let body = self
            .buffer_body(body, &request_id)
            .await
            .map_err(|e| (e, route_label.clone()))?;

        let context = RequestContext {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: matched.params,
            auth,
        };

        let handler = matched.route.handler();
        let env = Arc::clone(&inner.env);
        let outcome = AssertUnwindSafe(async move { handler.call(context, env).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(response)) => Ok((response, route_label)),
            Ok(Err(error)) => {
                tracing::error!(request_id = %request_id, route = %route_label, error = %error, "Route handler error");
                Err((GatewayError::Internal, route_label))
            }
            Err(_) => {
                tracing::error!(request_id = %request_id, route = %route_label, "Route handler panicked");
                Err((GatewayError::Internal, route_label))
            }
        }
    }

    /// Consult the limiter. Limiter failures let the request through.
    async fn check_rate_limit(
        &self,
        parts: &Parts,
        path: &str,
        request_id: &str,
    ) -> Result<(), GatewayError> {
        let Some(limiter) = &self.inner.limiter else {
            return Ok(());
        };

        let key = rate_limit_key(&self.client_ip(parts), None, path);
        match limiter.limit(&key).await {
            Ok(decision) if decision.success => Ok(()),
            Ok(decision) => {
                tracing::warn!(request_id = %request_id, key = %key, "Rate limit exceeded");
                metrics::record_rate_limited("exceeded");
                Err(GatewayError::RateLimited {
                    path: path.to_string(),
                    decision,
                })
            }
            Err(error) => {
                tracing::warn!(request_id = %request_id, error = %error, "Rate limiter error, allowing request");
                metrics::record_rate_limited("limiter_error");
                Ok(())
            }
        }
    }

    /// The auth gate: 401 without usable credentials, 403 for anything else
    /// short of a verified token carrying the required permission.
    async fn authorize(
        &self,
        headers: &HeaderMap,
        required: &RequiredPermission,
        request_id: &str,
        route: &str,
    ) -> Result<AuthContext, GatewayError> {
        let header = headers
            .get(AUTHORIZATION)
            .ok_or(GatewayError::MissingCredentials)?;
        let token = header
            .to_str()
            .ok()
            .and_then(bearer_token)
            .ok_or(GatewayError::InvalidAuthorizationHeader)?;

        let claims = match self.inner.verifier.verify(token).await {
            Ok(claims) => claims,
            Err(error) => {
                tracing::warn!(
                    request_id = %request_id,
                    route = %route,
                    reason = error.reason(),
                    error = %error,
                    "Token verification failed"
                );
                metrics::record_auth_failure(error.reason());
                return Err(GatewayError::Forbidden);
            }
        };

        let decision = check_permission(&claims, required);
        if !decision.granted {
            tracing::warn!(
                request_id = %request_id,
                route = %route,
                sub = claims.sub.as_deref().unwrap_or_default(),
                required = ?required,
                "Insufficient permissions"
            );
            metrics::record_auth_failure("insufficient_permission");
            return Err(GatewayError::Forbidden);
        }

        Ok(AuthContext {
            claims,
            permissions: decision.permissions,
            token: token.to_string(),
        })
    }

    async fn buffer_body(&self, body: Body, request_id: &str) -> Result<Bytes, GatewayError> {
        axum::body::to_bytes(body, self.inner.max_body_bytes)
            .await
            .map_err(|error| {
                tracing::debug!(request_id = %request_id, error = %error, "Request body rejected");
                GatewayError::PayloadTooLarge
            })
    }

    /// Trusted client-IP header, then the peer address, then `"unknown"`.
    fn client_ip(&self, parts: &Parts) -> String {
        self.inner
            .client_ip_header
            .as_ref()
            .and_then(|name| parts.headers.get(name))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Extract the token from a `Bearer <token>` header value.
///
/// The scheme is matched case-insensitively; anything else, or an empty
/// token, is malformed.
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() || token.contains(' ') {
        None
    } else {
        Some(token)
    }
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}
