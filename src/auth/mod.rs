//! Token authentication and authorization.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <jwt>
//!     → verifier.rs (header, kid, signature, iss/aud/exp/nbf/iat)
//!         ↔ jwks.rs (cached key set per JWKS URL)
//!     → claims.rs (verified payload)
//!     → permissions.rs (normalize claim shape, check required permission)
//! ```

pub mod claims;
pub mod jwks;
pub mod permissions;
pub mod provider;
pub mod verifier;

pub use claims::Claims;
pub use jwks::{KeySetProvider, RemoteKeySetProvider, StaticKeySetProvider};
pub use permissions::{check_permission, AccessDecision, RequiredPermission};
pub use provider::VerificationTarget;
pub use verifier::{TokenVerifier, VerifyError};
