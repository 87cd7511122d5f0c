//! Signed credential codec for the development (mock) identity backend.
//!
//! Credentials are compact HS256 JWS strings. Verification is a single
//! fallible pass over signature, issuer, audience and time window: callers
//! only ever see "valid identity" or `None`.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::claims::{IdentityClaims, TokenClaims, validate_claims};
use crate::Identity;

/// Issuer of mock credentials.
pub const MOCK_ISSUER: &str = "agriops-mock-idp";

/// Audience of mock credentials.
pub const MOCK_AUDIENCE: &str = "agriops-console";

/// Default credential lifetime.
pub const DEFAULT_TTL_SECS: i64 = 3600;

/// Known-insecure signing secret used when none is configured outside
/// production.
pub const INSECURE_DEV_SECRET: &str = "agriops-dev-secret-not-for-production";

/// Opaque signed session token.
///
/// `Debug` is redacted so credentials never end up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("failed to sign credential: {0}")]
    Signing(String),

    /// `iat + ttl` falls outside the representable timestamp range.
    #[error("credential lifetime of {0}s is out of range")]
    LifetimeOutOfRange(i64),
}

/// A credential that passed verification, with its validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    pub identity: Identity,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// HS256 codec bound to one symmetric secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl core::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &MOCK_ISSUER)
            .field("audience", &MOCK_AUDIENCE)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[MOCK_ISSUER]);
        validation.set_audience(&[MOCK_AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "aud"]);
        // The time window is checked by `validate_claims` against an explicit `now`.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, identity: &Identity, ttl_seconds: i64) -> Result<Credential, TokenError> {
        self.issue_at(identity, ttl_seconds, Utc::now())
    }

    pub fn issue_at(
        &self,
        identity: &Identity,
        ttl_seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<Credential, TokenError> {
        let iat = now.timestamp();
        let exp = iat
            .checked_add(ttl_seconds)
            .filter(|exp| DateTime::from_timestamp(*exp, 0).is_some())
            .ok_or(TokenError::LifetimeOutOfRange(ttl_seconds))?;
        let claims = TokenClaims {
            iss: MOCK_ISSUER.to_string(),
            aud: MOCK_AUDIENCE.to_string(),
            iat,
            exp,
            identity: IdentityClaims::from(identity),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map(Credential::new)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, credential: &Credential) -> Option<Identity> {
        self.verify_at(credential, Utc::now())
    }

    pub fn verify_at(&self, credential: &Credential, now: DateTime<Utc>) -> Option<Identity> {
        self.inspect_at(credential, now).map(|verified| verified.identity)
    }

    /// Expired and tampered credentials are indistinguishable here.
    pub fn is_expired(&self, credential: &Credential) -> bool {
        self.verify(credential).is_none()
    }

    pub fn is_expired_at(&self, credential: &Credential, now: DateTime<Utc>) -> bool {
        self.verify_at(credential, now).is_none()
    }

    /// Same single-pass check as `verify_at`, also exposing the validity window.
    pub fn inspect_at(&self, credential: &Credential, now: DateTime<Utc>) -> Option<VerifiedCredential> {
        let data = match jsonwebtoken::decode::<TokenClaims>(
            credential.as_str(),
            &self.decoding,
            &self.validation,
        ) {
            Ok(data) => data,
            Err(e) => {
                debug!(error = %e, "credential rejected");
                return None;
            }
        };

        let claims = data.claims;
        if let Err(e) = validate_claims(&claims, now) {
            debug!(error = %e, "credential outside its validity window");
            return None;
        }

        let issued_at = DateTime::from_timestamp(claims.iat, 0)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0)?;

        match Identity::try_from(claims.identity) {
            Ok(identity) => Some(VerifiedCredential {
                identity,
                issued_at,
                expires_at,
            }),
            Err(e) => {
                debug!(error = %e, "credential carries an invalid identity");
                None
            }
        }
    }
}
