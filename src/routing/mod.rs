//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup in registration order)
//!     → matcher.rs (evaluate path template)
//!     → Return: matched Route + Params, or NoMatch
//!
//! Route Compilation (at startup):
//!     path templates
//!     → pattern.rs (<name>, <name..>) or matcher.rs fallback (:name)
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at registration, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by registration)

use std::collections::BTreeMap;

pub mod matcher;
pub mod pattern;
pub mod router;

pub use pattern::{PathPattern, RouteConfigError};
pub use router::{Route, RouteMatch, RouteMethod, RouteTable, RouteTableBuilder};

/// Placeholder name → captured value.
pub type Params = BTreeMap<String, String>;
