use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC (`role` claim, the identity's primary role).
///
/// Roles stay opaque strings at this layer so an external identity backend can
/// introduce roles the console does not know about; the archetypes the console
/// ships templates for are exposed as associated constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Platform operator. Bypasses route-level role and permission checks.
    pub const PLATFORM_ADMIN: Role = Role(Cow::Borrowed("platform_admin"));
    /// Owner of one or more factories.
    pub const FACTORY_OWNER: Role = Role(Cow::Borrowed("factory_owner"));
    /// Day-to-day manager of a factory.
    pub const FACTORY_MANAGER: Role = Role(Cow::Borrowed("factory_manager"));
    /// Clerk registering farmers at a collection point.
    pub const REGISTRATION_CLERK: Role = Role(Cow::Borrowed("registration_clerk"));
    /// Read-only regional regulator.
    pub const REGULATOR: Role = Role(Cow::Borrowed("regulator"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_platform_admin(&self) -> bool {
        self.as_str() == Self::PLATFORM_ADMIN.as_str()
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self(Cow::Owned(value.to_string()))
    }
}
