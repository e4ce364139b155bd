//! Identity provider resolution.
//!
//! Turns the configured provider into the three values token verification
//! needs: where the keys live, which issuer to expect, which audience to expect.

use url::Url;

use crate::config::ProviderConfig;

/// Well-known JWKS location under a tenant domain.
pub const JWKS_WELL_KNOWN_PATH: &str = ".well-known/jwks.json";

/// Issuer, audience and key location a token must be verified against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationTarget {
    pub jwks_url: Url,
    /// Compared verbatim with `iss`, trailing slash included.
    pub issuer: String,
    pub audience: String,
}

impl VerificationTarget {
    /// Resolve a provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain or JWKS endpoint does not form a URL.
    pub fn from_provider(provider: &ProviderConfig) -> Result<Self, url::ParseError> {
        match provider {
            ProviderConfig::Auth0 { domain, audience } => {
                let issuer = format!("https://{domain}/");
                let jwks_url = Url::parse(&issuer)?.join(JWKS_WELL_KNOWN_PATH)?;
                Ok(Self {
                    jwks_url,
                    issuer,
                    audience: audience.clone(),
                })
            }
            ProviderConfig::Dex {
                jwks_endpoint,
                issuer,
                audience,
            } => Ok(Self {
                jwks_url: Url::parse(jwks_endpoint)?,
                issuer: issuer.clone(),
                audience: audience.clone(),
            }),
        }
    }
}
