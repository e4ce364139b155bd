//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use axum::Router;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tower::{BoxError, ServiceExt};

use edge_gate::api;
use edge_gate::auth::jwks::StaticKeySetProvider;
use edge_gate::auth::{RequiredPermission, TokenVerifier};
use edge_gate::config::{GatewayConfig, ProviderConfig};
use edge_gate::http::{build_router, RequestContext};
use edge_gate::routing::RouteTable;
use edge_gate::security::rate_limit::{LimitDecision, RateLimitError, RateLimiter};
use edge_gate::Gateway;

pub const SIGNING_KEY_PEM: &str = include_str!("../fixtures/signing_key.pem");
pub const ROGUE_KEY_PEM: &str = include_str!("../fixtures/rogue_key.pem");
pub const SIGNING_JWK: &str = include_str!("../fixtures/signing_key.jwk.json");
pub const ROGUE_JWK: &str = include_str!("../fixtures/rogue_key.jwk.json");

pub const SIGNING_KID: &str = "test-signing-key";
pub const ROGUE_KID: &str = "rogue-key";
pub const ISSUER: &str = "https://login.example.com/dex/";
pub const AUDIENCE: &str = "edge-api";
pub const JWKS_ENDPOINT: &str = "https://login.example.com/dex/keys";

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn signing_jwk() -> Jwk {
    serde_json::from_str(SIGNING_JWK).unwrap()
}

pub fn rogue_jwk() -> Jwk {
    serde_json::from_str(ROGUE_JWK).unwrap()
}

pub fn jwk_set(keys: Vec<Jwk>) -> JwkSet {
    JwkSet { keys }
}

/// Config pointing at the dex-style test issuer.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.auth.provider = ProviderConfig::Dex {
        jwks_endpoint: JWKS_ENDPOINT.to_string(),
        issuer: ISSUER.to_string(),
        audience: AUDIENCE.to_string(),
    };
    config.cors.allowed_origin = "https://app.example.com".to_string();
    config.rate_limit.client_ip_header = Some("CF-Connecting-IP".to_string());
    config
}

/// Valid claims for `sub` with a `permissions` array.
pub fn claims(sub: &str, permissions: &[&str]) -> Value {
    let now = unix_now();
    json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": sub,
        "iat": now,
        "exp": now + 600,
        "permissions": permissions,
    })
}

/// Sign `claims` with a PEM key under `kid`.
pub fn sign_with(pem: &str, kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

/// Sign `claims` with the trusted test key.
pub fn mint(claims: &Value) -> String {
    sign_with(SIGNING_KEY_PEM, SIGNING_KID, claims)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

pub fn get_with_auth(path: &str, authorization: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header("authorization", authorization)
        .body(Body::empty())
        .unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Limiter that records every key and answers with a fixed outcome.
#[derive(Debug)]
pub struct ScriptedLimiter {
    outcome: Outcome,
    pub keys: Mutex<Vec<String>>,
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Allow,
    Deny,
    Fail,
}

impl ScriptedLimiter {
    fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            keys: Mutex::new(Vec::new()),
        })
    }

    pub fn allow_all() -> Arc<Self> {
        Self::new(Outcome::Allow)
    }

    pub fn deny_all() -> Arc<Self> {
        Self::new(Outcome::Deny)
    }

    pub fn failing() -> Arc<Self> {
        Self::new(Outcome::Fail)
    }

    pub fn calls(&self) -> usize {
        self.keys.lock().unwrap().len()
    }

    pub fn seen_keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

impl RateLimiter for ScriptedLimiter {
    fn limit<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<LimitDecision, RateLimitError>> {
        self.keys.lock().unwrap().push(key.to_string());
        let result = match self.outcome {
            Outcome::Allow => Ok(LimitDecision {
                success: true,
                limit: 10,
                remaining: 9,
                reset_secs: 6,
                retry_after_secs: 0,
            }),
            Outcome::Deny => Ok(LimitDecision {
                success: false,
                limit: 10,
                remaining: 0,
                reset_secs: 60,
                retry_after_secs: 6,
            }),
            Outcome::Fail => Err(RateLimitError::Backend("connection refused".into())),
        };
        async move { result }.boxed()
    }
}

/// A gateway over the bundled routes plus test routes, behind the full
/// middleware stack.
pub struct TestGateway {
    pub router: Router,
    /// Incremented by `/counted` and `/public-counted`.
    pub handler_calls: Arc<AtomicUsize>,
}

impl TestGateway {
    pub fn handler_calls(&self) -> usize {
        self.handler_calls.load(Ordering::SeqCst)
    }
}

pub fn test_gateway(limiter: Option<Arc<dyn RateLimiter>>) -> TestGateway {
    test_gateway_with_config(test_config(), limiter)
}

pub fn test_gateway_with_config(
    config: GatewayConfig,
    limiter: Option<Arc<dyn RateLimiter>>,
) -> TestGateway {
    let handler_calls = Arc::new(AtomicUsize::new(0));
    let routes = test_routes(&config, Arc::clone(&handler_calls));

    let provider = StaticKeySetProvider::new(jwk_set(vec![signing_jwk()]));
    let verifier = TokenVerifier::from_config(Arc::new(provider), &config.auth).unwrap();

    let gateway = Gateway::new(Arc::new(config), routes, verifier, limiter).unwrap();

    TestGateway {
        router: build_router(gateway),
        handler_calls,
    }
}

fn test_routes(config: &GatewayConfig, calls: Arc<AtomicUsize>) -> RouteTable {
    let read = Some(RequiredPermission::one(config.permissions.read.as_str()));
    let write_or_admin = Some(RequiredPermission::any_of([
        config.permissions.admin.as_str(),
        config.permissions.write.as_str(),
    ]));

    let protected_calls = Arc::clone(&calls);
    let public_calls = calls;

    api::register(RouteTable::builder(), config)
        .unwrap()
        .get("/files/<path..>", echo_params, None)
        .unwrap()
        .get("/items/:id", echo_params, None)
        .unwrap()
        .get(
            "/counted",
            move |_req: RequestContext, _env: Arc<GatewayConfig>| {
                let calls = Arc::clone(&protected_calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, BoxError>("counted".into_response())
                }
            },
            read,
        )
        .unwrap()
        .get(
            "/public-counted",
            move |_req: RequestContext, _env: Arc<GatewayConfig>| {
                let calls = Arc::clone(&public_calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, BoxError>("counted".into_response())
                }
            },
            None,
        )
        .unwrap()
        .delete("/admin/items/<id>", echo_params, write_or_admin)
        .unwrap()
        .post("/echo", echo_body, None)
        .unwrap()
        .get("/boom", failing, None)
        .unwrap()
        .get("/panic", panicking, None)
        .unwrap()
        .get("/slow", sleeping, None)
        .unwrap()
        .build()
}

async fn echo_params(req: RequestContext, _env: Arc<GatewayConfig>) -> Result<axum::response::Response, BoxError> {
    Ok(axum::Json(json!({ "params": req.params })).into_response())
}

async fn echo_body(req: RequestContext, _env: Arc<GatewayConfig>) -> Result<axum::response::Response, BoxError> {
    Ok(axum::Json(json!({ "len": req.body.len() })).into_response())
}

async fn failing(_req: RequestContext, _env: Arc<GatewayConfig>) -> Result<axum::response::Response, BoxError> {
    Err("database password is hunter2".into())
}

async fn panicking(_req: RequestContext, _env: Arc<GatewayConfig>) -> Result<axum::response::Response, BoxError> {
    panic!("handler exploded");
}

async fn sleeping(_req: RequestContext, _env: Arc<GatewayConfig>) -> Result<axum::response::Response, BoxError> {
    tokio::time::sleep(Duration::from_secs(3)).await;
    Ok("finally".into_response())
}

/// Wait briefly for background work in async tests.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
