//! Bearer token verification.
//!
//! A token is accepted only when its signature verifies against a key from
//! the issuer's key set, its `iss` and `aud` match the configured provider,
//! and it is inside its validity window (`exp`, `nbf`, `iat`) allowing for
//! the configured leeway. Keys are selected by `kid`; an unknown `kid`
//! triggers one key-set refresh before the token is rejected.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::jwk::{Jwk, JwkSet, PublicKeyUse};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use thiserror::Error;

use crate::auth::claims::Claims;
use crate::auth::jwks::{KeySetError, KeySetProvider};
use crate::auth::provider::VerificationTarget;
use crate::config::AuthConfig;

/// Why a token was rejected. Never shown to clients.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("token is not a well-formed JWT")]
    Malformed(#[source] jsonwebtoken::errors::Error),

    #[error("token header has no kid")]
    MissingKid,

    #[error("no key with kid {kid} in the key set")]
    UnknownKid { kid: String },

    #[error("algorithm {0:?} is not accepted")]
    UnsupportedAlgorithm(Algorithm),

    #[error("key {kid} cannot verify {alg:?} tokens")]
    InvalidKey { kid: String, alg: Algorithm },

    #[error("key set unavailable")]
    KeySet(#[source] Arc<KeySetError>),

    #[error("token rejected")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("token issued in the future")]
    IssuedInFuture,
}

impl VerifyError {
    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            VerifyError::Malformed(_) => "malformed",
            VerifyError::MissingKid => "missing_kid",
            VerifyError::UnknownKid { .. } => "unknown_kid",
            VerifyError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            VerifyError::InvalidKey { .. } => "invalid_key",
            VerifyError::KeySet(_) => "key_set_unavailable",
            VerifyError::Invalid(_) => "invalid",
            VerifyError::IssuedInFuture => "issued_in_future",
        }
    }
}

/// Configuration rejected when building a [`TokenVerifier`].
#[derive(Debug, Error)]
pub enum VerifierConfigError {
    #[error("unknown algorithm {0}")]
    UnknownAlgorithm(String),

    #[error("symmetric algorithm {0} cannot be used with a public key set")]
    SymmetricAlgorithm(String),

    #[error("at least one algorithm must be accepted")]
    NoAlgorithms,

    #[error("invalid provider URL")]
    Url(#[from] url::ParseError),
}

/// Verifies bearer tokens against one provider.
#[derive(Clone)]
pub struct TokenVerifier {
    provider: Arc<dyn KeySetProvider>,
    target: VerificationTarget,
    algorithms: Vec<Algorithm>,
    leeway: Duration,
}

impl TokenVerifier {
    pub fn new(
        provider: Arc<dyn KeySetProvider>,
        target: VerificationTarget,
        algorithms: Vec<Algorithm>,
        leeway: Duration,
    ) -> Self {
        Self {
            provider,
            target,
            algorithms,
            leeway,
        }
    }

    /// Build a verifier from the `[auth]` configuration section.
    ///
    /// # Errors
    ///
    /// Fails on an unusable algorithm list or provider URL.
    pub fn from_config(
        provider: Arc<dyn KeySetProvider>,
        config: &AuthConfig,
    ) -> Result<Self, VerifierConfigError> {
        let target = VerificationTarget::from_provider(&config.provider)?;
        let algorithms = parse_algorithms(&config.algorithms)?;
        Ok(Self::new(
            provider,
            target,
            algorithms,
            Duration::from_secs(config.leeway_secs),
        ))
    }

    pub fn target(&self) -> &VerificationTarget {
        &self.target
    }

    /// Verify `token` and return its claims.
    pub async fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        let header = decode_header(token).map_err(VerifyError::Malformed)?;

        if !self.algorithms.contains(&header.alg) {
            return Err(VerifyError::UnsupportedAlgorithm(header.alg));
        }

        let kid = header.kid.ok_or(VerifyError::MissingKid)?;
        let jwk = self.find_key(&kid).await?;

        if !key_accepts(&jwk, header.alg) {
            return Err(VerifyError::InvalidKey {
                kid,
                alg: header.alg,
            });
        }

        let key = DecodingKey::from_jwk(&jwk).map_err(|_| VerifyError::InvalidKey {
            kid: kid.clone(),
            alg: header.alg,
        })?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[&self.target.audience]);
        validation.set_issuer(&[&self.target.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.validate_nbf = true;
        validation.leeway = self.leeway.as_secs();

        let claims = decode::<Claims>(token, &key, &validation)
            .map_err(VerifyError::Invalid)?
            .claims;

        if let Some(iat) = claims.iat {
            if iat > unix_now().saturating_add(self.leeway.as_secs()) {
                return Err(VerifyError::IssuedInFuture);
            }
        }

        Ok(claims)
    }

    async fn find_key(&self, kid: &str) -> Result<Jwk, VerifyError> {
        let url = &self.target.jwks_url;
        let jwk_set = self.provider.key_set(url).await.map_err(VerifyError::KeySet)?;
        if let Some(jwk) = lookup(&jwk_set, kid) {
            return Ok(jwk);
        }

        tracing::debug!(kid, jwks_url = %url, "Unknown kid, refreshing key set");
        let jwk_set = self.provider.refresh(url).await.map_err(VerifyError::KeySet)?;
        lookup(&jwk_set, kid).ok_or_else(|| VerifyError::UnknownKid {
            kid: kid.to_string(),
        })
    }
}

fn lookup(jwk_set: &JwkSet, kid: &str) -> Option<Jwk> {
    jwk_set.find(kid).cloned()
}

/// A key must be a signing key, and if it names an algorithm, the same one
/// the token header names.
fn key_accepts(jwk: &Jwk, alg: Algorithm) -> bool {
    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        return false;
    }
    match &jwk.common.key_algorithm {
        Some(key_alg) => jwa_name(key_alg) == jwa_name(&alg),
        None => true,
    }
}

fn jwa_name<T: serde::Serialize>(alg: &T) -> Option<String> {
    match serde_json::to_value(alg) {
        Ok(serde_json::Value::String(name)) => Some(name),
        _ => None,
    }
}

/// Parse JWA names, refusing HMAC algorithms.
pub fn parse_algorithms(names: &[String]) -> Result<Vec<Algorithm>, VerifierConfigError> {
    if names.is_empty() {
        return Err(VerifierConfigError::NoAlgorithms);
    }

    names
        .iter()
        .map(|name| {
            let alg = Algorithm::from_str(name)
                .map_err(|_| VerifierConfigError::UnknownAlgorithm(name.clone()))?;
            match alg {
                Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                    Err(VerifierConfigError::SymmetricAlgorithm(name.clone()))
                }
                alg => Ok(alg),
            }
        })
        .collect()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
