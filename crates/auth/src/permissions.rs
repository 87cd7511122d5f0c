use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are opaque `resource:action` strings (e.g. `"farmers:read"`).
/// The wildcard `"*"` is a superset of every permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }

    /// Resource half of a `resource:action` permission.
    pub fn resource(&self) -> Option<&str> {
        self.as_str().split_once(':').map(|(resource, _)| resource)
    }

    /// Action half of a `resource:action` permission.
    pub fn action(&self) -> Option<&str> {
        self.as_str().split_once(':').map(|(_, action)| action)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for Permission {
    fn from(value: &str) -> Self {
        Self(Cow::Owned(value.to_string()))
    }
}

const PLATFORM_ADMIN_TEMPLATE: &[&str] = &["*"];

const FACTORY_OWNER_TEMPLATE: &[&str] = &[
    "factories:read",
    "factories:write",
    "collection_points:read",
    "collection_points:write",
    "farmers:read",
    "quality_events:read",
    "reports:read",
    "costs:read",
    "settings:write",
];

const FACTORY_MANAGER_TEMPLATE: &[&str] = &[
    "factories:read",
    "collection_points:read",
    "farmers:read",
    "farmers:write",
    "quality_events:read",
    "diagnoses:read",
    "action_plans:read",
    "action_plans:write",
    "reports:read",
];

const REGISTRATION_CLERK_TEMPLATE: &[&str] = &[
    "collection_points:read",
    "farmers:read",
    "farmers:create",
];

const REGULATOR_TEMPLATE: &[&str] = &[
    "regions:read",
    "factories:read",
    "farmers:read",
    "reports:read",
];

/// Static permission template for a role archetype.
///
/// Unknown roles get an empty template: an external backend that invents a
/// role must also send explicit permissions for it.
pub fn permission_template(role: &Role) -> &'static [&'static str] {
    match role.as_str() {
        "platform_admin" => PLATFORM_ADMIN_TEMPLATE,
        "factory_owner" => FACTORY_OWNER_TEMPLATE,
        "factory_manager" => FACTORY_MANAGER_TEMPLATE,
        "registration_clerk" => REGISTRATION_CLERK_TEMPLATE,
        "regulator" => REGULATOR_TEMPLATE,
        _ => &[],
    }
}

/// Materialize a role's template as owned permissions.
pub fn permissions_for_role(role: &Role) -> Vec<Permission> {
    permission_template(role)
        .iter()
        .map(|p| Permission::new(*p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_admin_template_is_single_wildcard() {
        let perms = permissions_for_role(&Role::PLATFORM_ADMIN);
        assert_eq!(perms, vec![Permission::WILDCARD]);
        assert!(perms[0].is_wildcard());
    }

    #[test]
    fn templates_use_resource_action_form() {
        for role in [
            Role::FACTORY_OWNER,
            Role::FACTORY_MANAGER,
            Role::REGISTRATION_CLERK,
            Role::REGULATOR,
        ] {
            for perm in permissions_for_role(&role) {
                assert!(perm.resource().is_some(), "{perm} in {role}");
                assert!(!perm.is_wildcard());
            }
        }
    }

    #[test]
    fn unknown_role_has_no_template() {
        assert!(permission_template(&Role::new("auditor")).is_empty());
    }
}
