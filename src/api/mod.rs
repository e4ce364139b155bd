//! The bundled route table.
//!
//! | Method | Path | Permission |
//! |---|---|---|
//! | GET | `/` | none |
//! | GET | `/health` | none |
//! | GET | `/api/ping` | read |
//! | GET | `/api/get_users` | read |
//! | GET | `/api/get/<user>` | read |

pub mod handlers;

use crate::auth::permissions::RequiredPermission;
use crate::config::GatewayConfig;
use crate::routing::{RouteConfigError, RouteTable, RouteTableBuilder};

/// Append the bundled routes to `builder`, resolving permission names from `config`.
pub fn register(
    builder: RouteTableBuilder,
    config: &GatewayConfig,
) -> Result<RouteTableBuilder, RouteConfigError> {
    let read = || Some(RequiredPermission::one(config.permissions.read.as_str()));

    builder
        .get("/", handlers::hello, None)?
        .get("/health", handlers::health, None)?
        .get("/api/ping", handlers::ping, read())?
        .get("/api/get_users", handlers::get_users, read())?
        .get("/api/get/<user>", handlers::get_user, read())
}

/// The bundled route table on its own.
pub fn routes(config: &GatewayConfig) -> Result<RouteTable, RouteConfigError> {
    Ok(register(RouteTable::builder(), config)?.build())
}
