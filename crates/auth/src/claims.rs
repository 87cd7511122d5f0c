use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use agriops_core::{CollectionPointId, DomainError, FactoryId, RegionId, SubjectId};

use crate::{Identity, Permission, Role};

/// Identity claims on the wire.
///
/// Shared by the mock credential payload and the external backend's userinfo
/// response. Array claims default to empty and nullable claims to `None` when
/// absent; the scalar claims are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: String,

    /// Legacy single-factory claim, kept for older consumers.
    #[serde(default)]
    pub factory_id: Option<String>,

    #[serde(default)]
    pub factory_ids: Vec<String>,

    #[serde(default)]
    pub collection_point_id: Option<String>,

    #[serde(default)]
    pub region_ids: Vec<String>,

    #[serde(default)]
    pub permissions: Vec<String>,
}

impl From<&Identity> for IdentityClaims {
    fn from(identity: &Identity) -> Self {
        let factory_ids: Vec<String> = identity
            .factory_ids()
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();

        Self {
            sub: identity.subject_id().as_str().to_string(),
            email: identity.email().to_string(),
            name: identity.display_name().to_string(),
            role: identity.primary_role().as_str().to_string(),
            factory_id: factory_ids.first().cloned(),
            factory_ids,
            collection_point_id: identity
                .collection_point_id()
                .map(|id| id.as_str().to_string()),
            region_ids: identity
                .region_ids()
                .iter()
                .map(|id| id.as_str().to_string())
                .collect(),
            permissions: identity
                .permissions()
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
        }
    }
}

impl TryFrom<IdentityClaims> for Identity {
    type Error = DomainError;

    fn try_from(claims: IdentityClaims) -> Result<Self, Self::Error> {
        let mut factory_ids = claims.factory_ids;
        if factory_ids.is_empty() {
            factory_ids.extend(claims.factory_id);
        }

        let factory_ids = factory_ids
            .into_iter()
            .map(FactoryId::new)
            .collect::<Result<Vec<_>, _>>()?;
        let region_ids = claims
            .region_ids
            .into_iter()
            .map(RegionId::new)
            .collect::<Result<Vec<_>, _>>()?;
        let collection_point_id = claims
            .collection_point_id
            .map(CollectionPointId::new)
            .transpose()?;

        Ok(Identity::builder(SubjectId::new(claims.sub)?, Role::new(claims.role))
            .email(claims.email)
            .display_name(claims.name)
            .factory_ids(factory_ids)
            .collection_point_id(collection_point_id)
            .region_ids(region_ids)
            .permissions(claims.permissions.into_iter().map(Permission::new))
            .build())
    }
}

/// Full claim set of a mock credential (registered claims + identity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub aud: String,

    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,

    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,

    #[serde(flatten)]
    pub identity: IdentityClaims,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time window of token claims.
///
/// Signature, issuer and audience are checked by the codec before this runs.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
