//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{GatewayConfig, ProviderConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { name: &'static str, reason: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { name, reason } => write!(f, "Invalid {}: {}", name, reason),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse a TOML configuration file without validating it.
pub fn read_config_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Load configuration from an optional file, overlay the process environment,
/// then validate the result.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts the environment so tests don't mutate process state.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(addr) = lookup("BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Some(origin) = lookup("CORS_ORIGIN") {
        config.cors.allowed_origin = origin;
    }
    if let Some(read) = lookup("READ_PERMISSION") {
        config.permissions.read = read;
    }
    if let Some(write) = lookup("WRITE_PERMISSION") {
        config.permissions.write = write;
    }
    if let Some(admin) = lookup("ADMIN_PERMISSION") {
        config.permissions.admin = admin;
    }
    if let Some(ttl) = lookup("AUTH0_CACHE_DURATION_S") {
        config.auth.jwks.cache_ttl_secs = ttl.trim().parse().map_err(|_| ConfigError::Env {
            name: "AUTH0_CACHE_DURATION_S",
            reason: format!("'{ttl}' is not a number of seconds"),
        })?;
    }

    let domain = lookup("AUTH0_DOMAIN");
    let audience = lookup("AUTH0_AUDIENCE");

    let provider_type = match lookup("AUTHENTICATION_PROVIDER_TYPE") {
        Some(kind) => kind.to_ascii_lowercase(),
        None => match config.auth.provider {
            ProviderConfig::Auth0 { .. } => "auth0".to_string(),
            ProviderConfig::Dex { .. } => "dex".to_string(),
        },
    };

    config.auth.provider = match (provider_type.as_str(), config.auth.provider.clone()) {
        ("auth0", current) => {
            let (cur_domain, cur_audience) = match current {
                ProviderConfig::Auth0 { domain, audience } => (domain, audience),
                ProviderConfig::Dex { audience, .. } => (String::new(), audience),
            };
            ProviderConfig::Auth0 {
                domain: domain.unwrap_or(cur_domain),
                audience: audience.unwrap_or(cur_audience),
            }
        }
        ("dex", current) => {
            let (cur_endpoint, cur_issuer, cur_audience) = match current {
                ProviderConfig::Dex {
                    jwks_endpoint,
                    issuer,
                    audience,
                } => (jwks_endpoint, issuer, audience),
                ProviderConfig::Auth0 { domain, audience } => {
                    (String::new(), format!("https://{domain}/"), audience)
                }
            };
            // Deployments without DEX_ISSUER fall back to the domain-derived issuer.
            let issuer = lookup("DEX_ISSUER")
                .or_else(|| domain.as_ref().map(|d| format!("https://{d}/")))
                .unwrap_or(cur_issuer);
            ProviderConfig::Dex {
                jwks_endpoint: lookup("DEX_JWKS_ENDPOINT").unwrap_or(cur_endpoint),
                issuer,
                audience: audience.unwrap_or(cur_audience),
            }
        }
        (other, _) => {
            return Err(ConfigError::Env {
                name: "AUTHENTICATION_PROVIDER_TYPE",
                reason: format!("unsupported authentication provider '{other}'"),
            })
        }
    };

    Ok(())
}
