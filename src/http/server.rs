//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap the gateway in the middleware stack (request ID, tracing)
//! - Bind the router to a listener with peer addresses available
//! - Run background maintenance (idle rate-limit bucket sweep)
//! - Drain in-flight requests on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::gateway::Gateway;
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::security::rate_limit::LocalRateLimiter;

/// Build the Axum router with all middleware layers.
///
/// The request deadline is enforced by the gateway itself, so timed-out
/// requests still leave with CORS headers and a JSON body.
pub fn build_router(gateway: Gateway) -> Router {
    gateway
        .into_router()
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Periodic eviction of idle rate-limit buckets.
#[derive(Debug, Clone)]
struct BucketSweep {
    limiter: Arc<LocalRateLimiter>,
    idle: Duration,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    sweep: Option<BucketSweep>,
}

impl HttpServer {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            router: build_router(gateway),
            sweep: None,
        }
    }

    /// Evict buckets of `limiter` idle for longer than `idle` while serving.
    pub fn with_bucket_sweep(mut self, limiter: Arc<LocalRateLimiter>, idle: Duration) -> Self {
        self.sweep = Some(BucketSweep { limiter, idle });
        self
    }

    /// Serve on `listener` until `shutdown` is triggered, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(sweep) = self.sweep {
            tokio::spawn(run_bucket_sweep(sweep, shutdown.clone()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.notified().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn run_bucket_sweep(sweep: BucketSweep, shutdown: Shutdown) {
    let period = (sweep.idle / 2).max(Duration::from_secs(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = sweep.limiter.sweep_idle(sweep.idle);
                if removed > 0 {
                    tracing::debug!(removed, remaining = sweep.limiter.tracked_keys(), "Swept idle rate-limit buckets");
                }
            }
            _ = shutdown.notified() => break,
        }
    }
}
