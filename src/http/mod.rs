//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span, timeout)
//!     → gateway (preflight, rate limit, route, auth gate)
//!     → request.rs (RequestContext handed to the route handler)
//!     → response.rs (error taxonomy → JSON body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{AuthContext, Handler, RequestContext, X_REQUEST_ID};
pub use response::GatewayError;
pub use server::{build_router, HttpServer};
