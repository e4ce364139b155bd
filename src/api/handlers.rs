//! Handlers of the bundled route table.

use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tower::BoxError;

use crate::config::GatewayConfig;
use crate::http::request::RequestContext;

/// `GET /`
pub async fn hello(_req: RequestContext, _env: Arc<GatewayConfig>) -> Result<Response, BoxError> {
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        "Hello World!",
    )
        .into_response())
}

/// `GET /health`
pub async fn health(_req: RequestContext, _env: Arc<GatewayConfig>) -> Result<Response, BoxError> {
    Ok(Json(json!({ "success": true, "status": "ok" })).into_response())
}

/// `GET /api/ping`: the caller's subject, `null` when absent.
pub async fn ping(req: RequestContext, _env: Arc<GatewayConfig>) -> Result<Response, BoxError> {
    Ok(Json(json!({ "success": true, "user": req.subject() })).into_response())
}

/// `GET /api/get_users`: the caller's subject, empty when absent.
pub async fn get_users(req: RequestContext, _env: Arc<GatewayConfig>) -> Result<Response, BoxError> {
    let user = req.subject().unwrap_or_default();
    Ok(Json(json!({ "success": true, "user": user })).into_response())
}

/// `GET /api/get/<user>`: echoes the path parameter with the caller's identity.
pub async fn get_user(req: RequestContext, _env: Arc<GatewayConfig>) -> Result<Response, BoxError> {
    let user = req.param("user").ok_or("route has no user parameter")?;
    Ok(Json(json!({
        "success": true,
        "user": user,
        "sub": req.subject().unwrap_or_default(),
        "permissions": req.permissions(),
        "token": req.bearer_token().unwrap_or_default(),
    }))
    .into_response())
}
