//! edge-gate: JWT authorization gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!         → http::server (request id, trace span, timeout)
//!         → gateway
//!             → security::cors      (OPTIONS → 204)
//!             → security::rate_limit (429)
//!             → routing             (404)
//!             → auth                (401 / 403)
//!             → api handler         (500 on error or panic)
//!         → CORS headers
//!     Client Response
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use edge_gate::auth::{RemoteKeySetProvider, TokenVerifier};
use edge_gate::config::loader::load_config;
use edge_gate::observability::{logging, metrics};
use edge_gate::security::rate_limit::{LocalRateLimiter, RateLimiter};
use edge_gate::{api, Gateway, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "edge-gate")]
#[command(about = "JWT authorization gateway", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults plus environment when omitted.
    #[arg(short, long, env = "EDGE_GATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    logging::init_tracing(&config.observability)?;
    tracing::info!("edge-gate v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let key_sets = Arc::new(RemoteKeySetProvider::new(&config.auth.jwks)?);
    let verifier = TokenVerifier::from_config(key_sets, &config.auth)?;
    tracing::info!(
        issuer = %verifier.target().issuer,
        jwks_url = %verifier.target().jwks_url,
        "Token verification configured"
    );

    let local_limiter = config
        .rate_limit
        .enabled
        .then(|| Arc::new(LocalRateLimiter::from_config(&config.rate_limit)));
    let limiter = local_limiter
        .clone()
        .map(|limiter| limiter as Arc<dyn RateLimiter>);

    let routes = api::routes(&config)?;
    tracing::info!(routes = routes.len(), "Route table compiled");

    let config = Arc::new(config);
    let gateway = Gateway::new(Arc::clone(&config), routes, verifier, limiter)?;

    let mut server = HttpServer::new(gateway);
    if let Some(limiter) = local_limiter {
        server = server.with_bucket_sweep(
            limiter,
            Duration::from_secs(config.rate_limit.idle_eviction_secs),
        );
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(edge_gate::lifecycle::signals::shutdown_on_signal(shutdown.clone()));

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
