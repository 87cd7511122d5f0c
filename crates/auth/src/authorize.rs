use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;

use agriops_core::FactoryId;

use crate::{Identity, Permission, Session};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("forbidden: factory '{0}' is outside the caller's scope")]
    OutOfScope(String),
}

/// Permission set of a session that may be used for decisions.
///
/// `None` while loading or unauthenticated.
fn granted(session: &Session) -> Option<HashSet<&str>> {
    session
        .trusted_identity()
        .map(|identity| identity.permissions().iter().map(Permission::as_str).collect())
}

/// Does the session hold `permission` (or the wildcard)?
///
/// - No IO
/// - No panics
/// - Ordering of the identity's permissions is irrelevant
pub fn has_permission(session: &Session, permission: &str) -> bool {
    match granted(session) {
        Some(perms) => perms.contains("*") || perms.contains(permission),
        None => false,
    }
}

/// At least one of `permissions` is held. An empty request is never satisfied.
pub fn has_any<I, P>(session: &Session, permissions: I) -> bool
where
    I: IntoIterator<Item = P>,
    P: AsRef<str>,
{
    let Some(perms) = granted(session) else {
        return false;
    };
    if perms.contains("*") {
        return true;
    }
    permissions.into_iter().any(|p| perms.contains(p.as_ref()))
}

/// Every one of `permissions` is held. An empty request is satisfied by any
/// authenticated session.
pub fn has_all<I, P>(session: &Session, permissions: I) -> bool
where
    I: IntoIterator<Item = P>,
    P: AsRef<str>,
{
    let Some(perms) = granted(session) else {
        return false;
    };
    if perms.contains("*") {
        return true;
    }
    permissions.into_iter().all(|p| perms.contains(p.as_ref()))
}

/// Result-returning form of [`has_permission`] for callers that propagate.
pub fn authorize(session: &Session, required: &Permission) -> Result<(), AuthzError> {
    if session.trusted_identity().is_none() {
        return Err(AuthzError::Unauthenticated);
    }
    if has_permission(session, required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Factory-scope check for tenant-scoped screens.
///
/// Wildcard holders see every factory; everyone else only the factories
/// listed in their identity.
pub fn authorize_factory(session: &Session, factory_id: &FactoryId) -> Result<(), AuthzError> {
    let identity = session.trusted_identity().ok_or(AuthzError::Unauthenticated)?;
    if identity.has_wildcard() || identity.factory_ids().contains(factory_id) {
        Ok(())
    } else {
        Err(AuthzError::OutOfScope(factory_id.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Explanation of an authorization decision, for debug logs and audit views.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: String,
    pub granted: bool,
    pub reason: String,
    pub denial: Option<DenialKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    SessionLoading,
    Unauthenticated,
    MissingPermission,
}

/// Explain why `required` would be granted or denied for this session.
pub fn explain(session: &Session, required: &str) -> AuthorizationExplanation {
    let deny = |kind: DenialKind, reason: String| AuthorizationExplanation {
        required_permission: required.to_string(),
        granted: false,
        reason,
        denial: Some(kind),
    };

    if session.is_loading() {
        return deny(
            DenialKind::SessionLoading,
            "Session restore still in progress; identity is not trusted yet".to_string(),
        );
    }

    let Some(identity) = session.identity() else {
        return deny(DenialKind::Unauthenticated, "No authenticated identity".to_string());
    };

    if identity.has_wildcard() {
        return grant(required, identity, "holds wildcard permission '*'");
    }

    if identity.permissions().iter().any(|p| p.as_str() == required) {
        return grant(required, identity, "holds the permission explicitly");
    }

    let mut held: Vec<&str> = identity.permissions().iter().map(Permission::as_str).collect();
    held.sort_unstable();
    deny(
        DenialKind::MissingPermission,
        format!(
            "Role '{}' does not grant '{}'. Current permissions: {:?}",
            identity.primary_role(),
            required,
            held
        ),
    )
}

fn grant(required: &str, identity: &Identity, why: &str) -> AuthorizationExplanation {
    AuthorizationExplanation {
        required_permission: required.to_string(),
        granted: true,
        reason: format!("{} ({}) {}", identity.subject_id(), identity.primary_role(), why),
        denial: None,
    }
}
