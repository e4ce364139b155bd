//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
///
/// Handlers receive this value (behind an `Arc`) as their environment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// CORS response headers.
    pub cors: CorsConfig,

    /// Permission strings per capability.
    pub permissions: PermissionsConfig,

    /// Token verification settings.
    pub auth: AuthConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Request size and time limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8787").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8787".to_string(),
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Value of `Access-Control-Allow-Origin`.
    pub allowed_origin: String,

    /// Send `Access-Control-Allow-Credentials: true` on preflight responses.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: "*".to_string(),
            allow_credentials: true,
        }
    }
}

/// Permission strings required by the read/write/admin capabilities.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub read: String,
    pub write: String,
    pub admin: String,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            read: "read:api".to_string(),
            write: "write:api".to_string(),
            admin: "admin:api".to_string(),
        }
    }
}

/// Identity provider issuing the bearer tokens.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// Keys and issuer derived from the tenant domain.
    Auth0 { domain: String, audience: String },

    /// Explicitly configured JWKS endpoint, issuer and audience.
    Dex {
        jwks_endpoint: String,
        issuer: String,
        audience: String,
    },
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Auth0 {
            domain: "example.auth0.com".to_string(),
            audience: "https://example.com/api".to_string(),
        }
    }
}

/// Token verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Identity provider settings.
    pub provider: ProviderConfig,

    /// JWKS caching behaviour.
    pub jwks: JwksConfig,

    /// Clock skew tolerated on `exp`, `nbf` and `iat`, in seconds.
    pub leeway_secs: u64,

    /// Accepted signature algorithms (JWA names).
    pub algorithms: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            jwks: JwksConfig::default(),
            leeway_secs: 30,
            algorithms: ["RS256", "RS384", "RS512", "PS256", "ES256", "ES384", "EdDSA"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// JWKS cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwksConfig {
    /// How long a fetched key set stays valid, in seconds.
    pub cache_ttl_secs: u64,

    /// Maximum number of issuers held in the cache.
    pub max_cached_issuers: u64,

    /// Timeout for a single JWKS fetch, in seconds.
    pub fetch_timeout_secs: u64,

    /// Minimum interval between forced refetches caused by an unknown `kid`.
    pub min_refresh_interval_secs: u64,
}

impl Default for JwksConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            max_cached_issuers: 16,
            fetch_timeout_secs: 10,
            min_refresh_interval_secs: 30,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed per key within one window.
    pub requests_per_window: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Header carrying the real client IP, e.g. `CF-Connecting-IP`.
    ///
    /// Only set this behind a proxy that overwrites the header. Clients can
    /// send it themselves, so an unguarded header hands out a fresh bucket
    /// per request. Unset, the peer address keys the limiter.
    pub client_ip_header: Option<String>,

    /// Buckets untouched for this long are dropped, in seconds.
    pub idle_eviction_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: 10,
            window_secs: 60,
            client_ip_header: None,
            idle_eviction_secs: 600,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body buffered for a handler, in bytes.
    pub max_body_bytes: usize,

    /// Total time allowed for one request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024, // 1MB
            request_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.permissions.read, "read:api");
        assert_eq!(config.rate_limit.requests_per_window, 10);
        assert_eq!(config.auth.jwks.cache_ttl_secs, 300);
        assert_eq!(config.rate_limit.client_ip_header, None);
    }

    #[test]
    fn test_dex_provider_from_toml() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [auth.provider]
            type = "dex"
            jwks_endpoint = "https://dex.example.com/keys"
            issuer = "https://dex.example.com/"
            audience = "edge-api"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.auth.provider,
            ProviderConfig::Dex {
                jwks_endpoint: "https://dex.example.com/keys".into(),
                issuer: "https://dex.example.com/".into(),
                audience: "edge-api".into(),
            }
        );
    }
}
