//! Viewer Authentication
//!
//! Verifies ID tokens issued by the platform's auth provider and maps the
//! subject to a stable [`ViewerId`]. Tokens are never issued here.

use std::collections::HashSet;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::core::hash::LedgerHasher;
use crate::session::viewer::ViewerId;

/// Claims read from a provider token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerClaims {
    /// Provider user id.
    pub sub: String,
    /// Expiry (Unix seconds); 0 when absent.
    #[serde(default)]
    pub exp: u64,
    /// Issued-at (Unix seconds).
    #[serde(default)]
    pub iat: u64,
    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,
    /// Audience; string or list depending on the provider.
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    /// Display name, when the provider includes one.
    #[serde(default)]
    pub name: Option<String>,
}

impl ViewerClaims {
    /// Stable viewer id for this subject: first 16 bytes of a
    /// domain-separated SHA-256 of `sub`.
    pub fn viewer_id(&self) -> ViewerId {
        let mut hasher = LedgerHasher::for_viewer_id();
        hasher.update_bytes(self.sub.as_bytes());
        let digest = hasher.finalize();

        let mut id = [0u8; 16];
        id.copy_from_slice(&digest[..16]);
        ViewerId::new(id)
    }
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No verification key configured.
    #[error("authentication not configured")]
    NotConfigured,
    /// Public key could not be loaded.
    #[error("invalid verification key: {0}")]
    InvalidKey(String),
    /// Token is not a well-formed JWT.
    #[error("invalid token format")]
    InvalidFormat,
    /// Signature does not verify.
    #[error("invalid signature")]
    InvalidSignature,
    /// Token past its `exp`.
    #[error("token expired")]
    Expired,
    /// Wrong `iss`.
    #[error("invalid issuer")]
    InvalidIssuer,
    /// Wrong `aud`.
    #[error("invalid audience")]
    InvalidAudience,
    /// `sub` empty.
    #[error("token has no subject")]
    MissingSubject,
    /// Anything else the JWT library reports.
    #[error("token rejected: {0}")]
    Rejected(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
            ErrorKind::InvalidAudience => AuthError::InvalidAudience,
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::InvalidFormat
            }
            _ => AuthError::Rejected(err.to_string()),
        }
    }
}

/// Token verifier with its key and rules prepared once.
pub struct Authenticator {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Build from config. RS256 when a PEM is set, HS256 otherwise.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let (key, algorithm) = match (&config.public_key_pem, &config.secret) {
            (Some(pem), _) => (
                DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| AuthError::InvalidKey(e.to_string()))?,
                Algorithm::RS256,
            ),
            (None, Some(secret)) => (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256),
            (None, None) => return Err(AuthError::NotConfigured),
        };

        let mut validation = Validation::new(algorithm);
        validation.required_spec_claims = HashSet::new();
        validation.leeway = 0;
        if config.skip_expiry {
            validation.validate_exp = false;
        }
        match &config.issuer {
            Some(issuer) => validation.set_issuer(&[issuer]),
            None => validation.iss = None,
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self { key, validation })
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<ViewerClaims, AuthError> {
        let claims = decode::<ViewerClaims>(token, &self.key, &self.validation)?.claims;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::MissingSubject);
        }
        Ok(claims)
    }

    /// Verify a token and return the viewer it belongs to.
    pub fn authenticate(&self, token: &str) -> Result<ViewerId, AuthError> {
        self.verify(token).map(|claims| claims.viewer_id())
    }
}
