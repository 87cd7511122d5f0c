//! Consumption hook.
//!
//! UI code never talks to a provider directly. The host mounts one provider
//! into an [`AuthScope`] at startup and components obtain an [`AuthContext`]
//! from it with [`use_auth`]. Reading the scope before anything is mounted is
//! a programmer error and panics; [`try_use_auth`] is the fallible form.

use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::info;

use agriops_auth::{Credential, Identity, Persona, Session};

use crate::error::{AuthError, AuthResult};
use crate::provider::IdentityProvider;
use crate::store::ProviderState;

/// Handle on the mounted provider. Cheap to clone.
#[derive(Clone)]
pub struct AuthContext {
    provider: Arc<IdentityProvider>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("kind", &self.provider.kind())
            .field("state", &self.provider.state())
            .finish()
    }
}

impl AuthContext {
    pub fn new(provider: Arc<IdentityProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &IdentityProvider {
        &self.provider
    }

    pub fn session(&self) -> Session {
        self.provider.session()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.provider.subscribe()
    }

    pub fn state(&self) -> ProviderState {
        self.provider.state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.session().is_loading()
    }

    pub fn user(&self) -> Option<Identity> {
        self.provider.current_user()
    }

    pub fn show_login_selector(&self) -> bool {
        self.provider.show_login_selector()
    }

    pub async fn login(&self) -> AuthResult<()> {
        self.provider.login().await
    }

    pub async fn logout(&self) -> AuthResult<()> {
        self.provider.logout().await
    }

    pub async fn get_access_token(&self) -> AuthResult<Credential> {
        self.provider.get_access_token().await
    }

    /// Mock provider only.
    pub async fn select_persona(&self, persona_id: &str) -> AuthResult<Identity> {
        match self.provider.persona_selector() {
            Some(mock) => mock.select_persona(persona_id).await,
            None => Err(AuthError::Unsupported(self.provider.kind().as_str())),
        }
    }

    /// Personas offered by the selector; empty for the external provider.
    pub fn personas(&self) -> &'static [Persona] {
        self.provider
            .persona_selector()
            .map(|mock| mock.personas())
            .unwrap_or_default()
    }
}

/// Mount point for the one active provider.
///
/// Created at app start, holds the provider while mounted, dropped (or
/// [`unmount`](Self::unmount)ed) at shutdown.
#[derive(Debug, Default)]
pub struct AuthScope {
    mounted: RwLock<Option<AuthContext>>,
}

impl AuthScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `provider`, replacing whatever was mounted before.
    pub fn mount(&self, provider: IdentityProvider) -> AuthContext {
        let context = AuthContext::new(Arc::new(provider));
        let mut mounted = self
            .mounted
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *mounted = Some(context.clone());
        info!(provider = context.provider.kind().as_str(), "auth provider mounted");
        context
    }

    /// Mount and run the silent session restore.
    pub async fn mount_and_bootstrap(&self, provider: IdentityProvider) -> AuthContext {
        let context = self.mount(provider);
        context.provider.bootstrap().await;
        context
    }

    pub fn unmount(&self) {
        let mut mounted = self
            .mounted
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if mounted.take().is_some() {
            info!("auth provider unmounted");
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<AuthContext> {
        self.mounted
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

pub fn try_use_auth(scope: &AuthScope) -> AuthResult<AuthContext> {
    scope.current().ok_or(AuthError::ProviderNotInitialized)
}

/// # Panics
///
/// Panics if no provider is mounted in `scope`.
pub fn use_auth(scope: &AuthScope) -> AuthContext {
    match try_use_auth(scope) {
        Ok(context) => context,
        Err(_) => panic!("use_auth called outside a mounted auth provider"),
    }
}
