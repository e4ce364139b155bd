//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4)
//! - Carry the per-request context handed to route handlers
//! - Define the handler contract
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The context is owned by exactly one request and dropped with it
//! - Handlers get the environment as a shared, read-only `Arc`

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Uri};
use axum::response::Response;
use futures_util::future::BoxFuture;
use tower::BoxError;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::config::GatewayConfig;
use crate::routing::Params;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates a UUID v4 request ID for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Verified identity attached to requests on protected routes.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The verified token payload.
    pub claims: Claims,
    /// Normalized permissions extracted from the claims.
    pub permissions: Vec<String>,
    /// The raw bearer token as presented.
    pub token: String,
}

/// Everything a handler learns about the request it serves.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Placeholder captures of the matched route.
    pub params: Params,
    /// Present only when the route required a permission and it was granted.
    pub auth: Option<AuthContext>,
}

impl RequestContext {
    /// Value captured for a route placeholder.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn claims(&self) -> Option<&Claims> {
        self.auth.as_ref().map(|a| &a.claims)
    }

    /// The `sub` claim of the verified token.
    pub fn subject(&self) -> Option<&str> {
        self.claims().and_then(|c| c.sub.as_deref())
    }

    /// Normalized permissions; empty for public routes.
    pub fn permissions(&self) -> &[String] {
        self.auth
            .as_ref()
            .map(|a| a.permissions.as_slice())
            .unwrap_or_default()
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.auth.as_ref().map(|a| a.token.as_str())
    }
}

/// Future returned by a [`Handler`].
pub type HandlerFuture = BoxFuture<'static, Result<Response, BoxError>>;

/// A route handler.
///
/// Implemented for any `Fn(RequestContext, Arc<GatewayConfig>) -> impl Future`
/// returning `Result<Response, BoxError>`. An `Err` becomes a 500 response.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: RequestContext, env: Arc<GatewayConfig>) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(RequestContext, Arc<GatewayConfig>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
{
    fn call(&self, request: RequestContext, env: Arc<GatewayConfig>) -> HandlerFuture {
        Box::pin(self(request, env))
    }
}
