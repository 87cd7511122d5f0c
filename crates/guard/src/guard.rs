use thiserror::Error;
use tracing::debug;

use agriops_auth::{Permission, Role, Session, explain, has_all};
use agriops_session::{AuthContext, AuthResult};

use crate::views::{AccessDenied, GuardViews};

/// Why an authenticated identity was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("role '{actual}' is not allowed here")]
    Role { actual: Role, allowed: Vec<Role> },

    #[error("missing permission(s) {}", .missing.join(", "))]
    Permissions { missing: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    /// Session restore still running.
    Checking,
    /// Not signed in; a login has been scheduled.
    Redirecting,
    Forbidden(Denial),
    Allowed,
}

/// Side effect requested during render, run on commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Login,
}

/// Access requirements of one page plus the guard's render state.
///
/// Empty requirements admit any authenticated identity.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    roles: Vec<Role>,
    permissions: Vec<Permission>,
    state: GuardState,
    pending: Vec<Effect>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteGuard {
    pub fn new() -> Self {
        Self {
            roles: Vec::new(),
            permissions: Vec::new(),
            state: GuardState::Checking,
            pending: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles.extend(roles);
        self
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions.extend(permissions);
        self
    }

    /// State of the last render.
    pub fn state(&self) -> &GuardState {
        &self.state
    }

    /// Pure decision for `session`; does not touch the render state.
    pub fn evaluate(&self, session: &Session) -> GuardState {
        if session.is_loading() {
            return GuardState::Checking;
        }
        let Some(identity) = session.identity() else {
            return GuardState::Redirecting;
        };

        if identity.primary_role().is_platform_admin() {
            return GuardState::Allowed;
        }

        if !self.roles.is_empty() && !self.roles.contains(identity.primary_role()) {
            return GuardState::Forbidden(Denial::Role {
                actual: identity.primary_role().clone(),
                allowed: self.roles.clone(),
            });
        }

        if !has_all(session, &self.permissions) {
            let missing = self
                .permissions
                .iter()
                .map(|p| explain(session, p.as_str()))
                .filter(|e| !e.granted)
                .map(|e| {
                    debug!(permission = %e.required_permission, reason = %e.reason, "route permission denied");
                    e.required_permission
                })
                .collect();
            return GuardState::Forbidden(Denial::Permissions { missing });
        }

        GuardState::Allowed
    }

    /// Decide what to show for `session`.
    ///
    /// `content` is only called when access is allowed. Entering
    /// `Redirecting` schedules one [`Effect::Login`]; staying there schedules
    /// nothing further.
    pub fn render<V, F>(&mut self, session: &Session, views: &GuardViews<V>, content: F) -> V
    where
        V: Clone + From<AccessDenied>,
        F: FnOnce() -> V,
    {
        let next = self.evaluate(session);
        if next == GuardState::Redirecting && self.state != GuardState::Redirecting {
            debug!("unauthenticated; scheduling login");
            self.pending.push(Effect::Login);
        }
        if let GuardState::Forbidden(denial) = &next {
            if self.state != next {
                debug!(%denial, "route forbidden");
            }
        }
        self.state = next;

        match &self.state {
            GuardState::Checking | GuardState::Redirecting => views.fallback(),
            GuardState::Forbidden(denial) => views.forbidden(denial),
            GuardState::Allowed => content(),
        }
    }

    /// Drain the effects scheduled by previous renders.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.pending)
    }

    /// Run scheduled effects against the consumption hook.
    pub async fn commit(&mut self, auth: &AuthContext) -> AuthResult<()> {
        for effect in self.take_effects() {
            match effect {
                Effect::Login => auth.login().await?,
            }
        }
        Ok(())
    }
}
