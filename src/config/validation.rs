//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, TTLs > 0, addresses parse)
//! - Check the identity provider yields a usable issuer and JWKS URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::HeaderValue;
use jsonwebtoken::Algorithm;
use url::Url;

use crate::config::schema::{GatewayConfig, ProviderConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.cors.allowed_origin.trim().is_empty() {
        errors.push(ValidationError::new("cors.allowed_origin", "must not be empty"));
    } else if HeaderValue::from_str(&config.cors.allowed_origin).is_err() {
        errors.push(ValidationError::new(
            "cors.allowed_origin",
            "is not a valid header value",
        ));
    }

    for (field, value) in [
        ("permissions.read", &config.permissions.read),
        ("permissions.write", &config.permissions.write),
        ("permissions.admin", &config.permissions.admin),
    ] {
        if value.trim().is_empty() {
            errors.push(ValidationError::new(field, "must not be empty"));
        }
    }

    validate_provider(&config.auth.provider, &mut errors);

    if config.auth.algorithms.is_empty() {
        errors.push(ValidationError::new("auth.algorithms", "must list at least one algorithm"));
    }
    for name in &config.auth.algorithms {
        match Algorithm::from_str(name) {
            Ok(Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) => errors.push(
                ValidationError::new("auth.algorithms", format!("symmetric algorithm {name} is not allowed")),
            ),
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::new(
                "auth.algorithms",
                format!("unknown algorithm {name}"),
            )),
        }
    }

    if config.auth.jwks.cache_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.jwks.cache_ttl_secs", "must be greater than zero"));
    }
    if config.auth.jwks.max_cached_issuers == 0 {
        errors.push(ValidationError::new("auth.jwks.max_cached_issuers", "must be greater than zero"));
    }
    if config.auth.jwks.fetch_timeout_secs == 0 {
        errors.push(ValidationError::new("auth.jwks.fetch_timeout_secs", "must be greater than zero"));
    }

    if config.rate_limit.enabled {
        if config.rate_limit.requests_per_window == 0 {
            errors.push(ValidationError::new(
                "rate_limit.requests_per_window",
                "must be greater than zero",
            ));
        }
        if config.rate_limit.window_secs == 0 {
            errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than zero"));
        }
    }

    if config.limits.request_timeout_secs == 0 {
        errors.push(ValidationError::new("limits.request_timeout_secs", "must be greater than zero"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_provider(provider: &ProviderConfig, errors: &mut Vec<ValidationError>) {
    match provider {
        ProviderConfig::Auth0 { domain, audience } => {
            if domain.trim().is_empty() || domain.contains('/') || domain.contains("://") {
                errors.push(ValidationError::new(
                    "auth.provider.domain",
                    "must be a bare host name such as tenant.auth0.com",
                ));
            }
            if audience.trim().is_empty() {
                errors.push(ValidationError::new("auth.provider.audience", "must not be empty"));
            }
        }
        ProviderConfig::Dex {
            jwks_endpoint,
            issuer,
            audience,
        } => {
            if Url::parse(jwks_endpoint).is_err() {
                errors.push(ValidationError::new("auth.provider.jwks_endpoint", "is not a valid URL"));
            }
            if Url::parse(issuer).is_err() {
                errors.push(ValidationError::new("auth.provider.issuer", "is not a valid URL"));
            } else if !issuer.ends_with('/') {
                errors.push(ValidationError::new(
                    "auth.provider.issuer",
                    "must end with a trailing slash",
                ));
            }
            if audience.trim().is_empty() {
                errors.push(ValidationError::new("auth.provider.audience", "must not be empty"));
            }
        }
    }
}
