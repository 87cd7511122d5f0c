//! Identity providers.
//!
//! Exactly one variant is active per process, chosen from [`AuthConfig`] at
//! startup. Variant-specific capabilities (the persona selector, the
//! redirect-return handler) are reached through the optional accessors rather
//! than by matching on the enum.

pub mod external;
pub mod mock;

use std::sync::Arc;

use tokio::sync::watch;

use agriops_auth::{Credential, Identity, Session};

use crate::config::{AuthConfig, ProviderConfig, ProviderKind};
use crate::error::AuthResult;
use crate::navigator::Navigator;
use crate::storage::CredentialStorage;
use crate::store::{ProviderState, SessionStore};

pub use external::ExternalProvider;
pub use mock::MockProvider;

/// Credentials with less than this many seconds left are renewed before use.
pub const RENEWAL_MARGIN_SECS: i64 = 60;

pub enum IdentityProvider {
    Mock(MockProvider),
    External(ExternalProvider),
}

impl IdentityProvider {
    pub fn from_config(
        config: &AuthConfig,
        storage: Arc<dyn CredentialStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let store = Arc::new(SessionStore::new());
        match &config.provider {
            ProviderConfig::Mock(mock) => Self::Mock(MockProvider::new(mock, storage, store)),
            ProviderConfig::External(external) => Self::External(ExternalProvider::new(
                external.clone(),
                storage,
                store,
                navigator,
            )),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Mock(_) => ProviderKind::Mock,
            Self::External(_) => ProviderKind::External,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        match self {
            Self::Mock(p) => p.store(),
            Self::External(p) => p.store(),
        }
    }

    pub fn state(&self) -> ProviderState {
        self.store().state()
    }

    pub fn session(&self) -> Session {
        self.store().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.store().subscribe()
    }

    pub async fn bootstrap(&self) {
        match self {
            Self::Mock(p) => p.bootstrap().await,
            Self::External(p) => p.bootstrap().await,
        }
    }

    pub fn current_user(&self) -> Option<Identity> {
        match self {
            Self::Mock(p) => p.current_user(),
            Self::External(p) => p.current_user(),
        }
    }

    pub async fn get_access_token(&self) -> AuthResult<Credential> {
        match self {
            Self::Mock(p) => p.get_access_token().await,
            Self::External(p) => p.get_access_token().await,
        }
    }

    /// Mock: reveals the persona selector. External: starts the redirect.
    pub async fn login(&self) -> AuthResult<()> {
        match self {
            Self::Mock(p) => {
                p.login();
                Ok(())
            }
            Self::External(p) => p.login().await,
        }
    }

    pub async fn logout(&self) -> AuthResult<()> {
        match self {
            Self::Mock(p) => p.logout().await,
            Self::External(p) => p.logout().await,
        }
    }

    /// Whether the persona selector should be displayed. Always false for
    /// the external provider.
    pub fn show_login_selector(&self) -> bool {
        self.persona_selector()
            .is_some_and(MockProvider::show_login_selector)
    }

    pub fn persona_selector(&self) -> Option<&MockProvider> {
        match self {
            Self::Mock(p) => Some(p),
            Self::External(_) => None,
        }
    }

    pub fn redirect_handler(&self) -> Option<&ExternalProvider> {
        match self {
            Self::Mock(_) => None,
            Self::External(p) => Some(p),
        }
    }
}
