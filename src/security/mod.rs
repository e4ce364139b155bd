//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (OPTIONS answered here, before anything else)
//!     → rate_limit.rs (per ip/subject/path quota)
//!     → routing, then the auth gate
//! Outgoing response:
//!     → cors.rs (CORS headers on every response)
//! ```
//!
//! # Design Decisions
//! - The limiter is a trait so a shared backend can replace the local buckets
//! - Limiter failures fail open; credential failures fail closed

pub mod cors;
pub mod rate_limit;

pub use cors::CorsHeaders;
pub use rate_limit::{rate_limit_key, LimitDecision, LocalRateLimiter, RateLimitError, RateLimiter};
