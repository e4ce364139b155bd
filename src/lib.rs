//! JWT authorization gateway.
//!
//! Matches requests against a fixed route table, applies a rate limit,
//! verifies bearer tokens against the identity provider's JWKS, checks
//! permission claims, and dispatches to route handlers.

// Core subsystems
pub mod config;
pub mod gateway;
pub mod http;
pub mod routing;

// Authentication and traffic control
pub mod auth;
pub mod security;

// Route handlers
pub mod api;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use gateway::Gateway;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
