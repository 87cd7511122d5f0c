//! Local persona provider for development. No network.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use agriops_auth::{Credential, Identity, Persona, PersonaCatalog, Session, TokenCodec};

use crate::config::MockConfig;
use crate::error::{AuthError, AuthResult};
use crate::provider::RENEWAL_MARGIN_SECS;
use crate::storage::{CREDENTIAL_KEY, CredentialStorage};
use crate::store::{Generation, SessionStore};

pub struct MockProvider {
    codec: TokenCodec,
    token_ttl_secs: i64,
    catalog: &'static PersonaCatalog,
    storage: Arc<dyn CredentialStorage>,
    store: Arc<SessionStore>,
    selector: watch::Sender<bool>,
    writes: Mutex<()>,
}

enum Restored {
    Valid(Identity),
    Missing,
    Rejected,
    Unreadable,
}

impl MockProvider {
    pub fn new(config: &MockConfig, storage: Arc<dyn CredentialStorage>, store: Arc<SessionStore>) -> Self {
        let (selector, _rx) = watch::channel(false);
        Self {
            codec: config.codec(),
            token_ttl_secs: config.token_ttl_secs(),
            catalog: PersonaCatalog::builtin(),
            storage,
            store,
            selector,
            writes: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub async fn bootstrap(&self) {
        let ticket = self.store.begin_bootstrap();

        let restored = match self.storage.get(CREDENTIAL_KEY).await {
            Ok(Some(raw)) => match self.codec.verify(&Credential::new(raw)) {
                Some(identity) => Restored::Valid(identity),
                None => Restored::Rejected,
            },
            Ok(None) => Restored::Missing,
            Err(e) => {
                warn!(error = %e, "could not read stored credential");
                Restored::Unreadable
            }
        };

        let _write = self.writes.lock().await;
        if !self.store.is_current(ticket) {
            debug!("bootstrap superseded by a newer session write");
            return;
        }

        let session = match restored {
            Restored::Valid(identity) => {
                info!(
                    subject = %identity.subject_id(),
                    role = %identity.primary_role(),
                    "session restored from stored credential"
                );
                Session::authenticated(identity)
            }
            Restored::Rejected => {
                info!("stored credential rejected; clearing it");
                if let Err(e) = self.storage.remove(CREDENTIAL_KEY).await {
                    warn!(error = %e, "failed to clear rejected credential");
                }
                Session::anonymous()
            }
            Restored::Missing | Restored::Unreadable => Session::anonymous(),
        };
        self.store.commit(ticket, session);
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.store.current_user()
    }

    /// Stored credential, re-issued first when it is about to expire.
    pub async fn get_access_token(&self) -> AuthResult<Credential> {
        if self.store.snapshot().trusted_identity().is_none() {
            return Err(AuthError::NotAuthenticated);
        }
        let ticket = self.store.begin();
        let now = Utc::now();

        let stored = self.storage.get(CREDENTIAL_KEY).await;
        let verified = match &stored {
            Ok(Some(raw)) => self.codec.inspect_at(&Credential::new(raw.as_str()), now),
            _ => None,
        };

        let Some(verified) = verified else {
            if let Err(e) = &stored {
                warn!(error = %e, "could not read stored credential");
            }
            return self.end_expired_session(ticket).await;
        };

        if verified.expires_at - now > Duration::seconds(RENEWAL_MARGIN_SECS) {
            if let Ok(Some(raw)) = stored {
                return Ok(Credential::new(raw));
            }
        }

        debug!("credential close to expiry; re-issuing");
        let renewed = self.codec.issue(&verified.identity, self.token_ttl_secs);

        let _write = self.writes.lock().await;
        if !self.store.is_current(ticket) {
            debug!("renewal superseded by a newer session write");
            return self.current_credential().await;
        }

        let persisted = match renewed {
            Ok(renewed) => self
                .storage
                .set(CREDENTIAL_KEY, renewed.as_str())
                .await
                .map(|()| renewed),
            Err(e) => Err(e.into()),
        };
        match persisted {
            Ok(renewed) => Ok(renewed),
            Err(e) => {
                warn!(error = %e, "credential renewal failed");
                self.end_session_locked().await
            }
        }
    }

    async fn end_expired_session(&self, ticket: Generation) -> AuthResult<Credential> {
        let _write = self.writes.lock().await;
        if !self.store.is_current(ticket) {
            return self.current_credential().await;
        }
        self.end_session_locked().await
    }

    /// Caller holds `writes`.
    async fn end_session_locked(&self) -> AuthResult<Credential> {
        info!("credential no longer valid; ending session");
        self.store.replace(Session::anonymous());
        if let Err(e) = self.storage.remove(CREDENTIAL_KEY).await {
            warn!(error = %e, "failed to clear expired credential");
        }
        Err(AuthError::SessionExpired)
    }

    /// Whatever a newer write left behind, if it is still valid.
    async fn current_credential(&self) -> AuthResult<Credential> {
        if self.store.snapshot().trusted_identity().is_none() {
            return Err(AuthError::NotAuthenticated);
        }
        match self.storage.get(CREDENTIAL_KEY).await? {
            Some(raw) => {
                let credential = Credential::new(raw);
                if self.codec.is_expired(&credential) {
                    Err(AuthError::SessionExpired)
                } else {
                    Ok(credential)
                }
            }
            None => Err(AuthError::SessionExpired),
        }
    }

    /// Reveal the persona selector. Synchronous, no network.
    pub fn login(&self) {
        self.selector.send_replace(true);
        debug!("persona selector shown");
    }

    pub fn show_login_selector(&self) -> bool {
        *self.selector.borrow()
    }

    pub fn subscribe_login_selector(&self) -> watch::Receiver<bool> {
        self.selector.subscribe()
    }

    pub fn dismiss_login_selector(&self) {
        self.selector.send_replace(false);
    }

    pub fn personas(&self) -> &'static [Persona] {
        self.catalog.personas()
    }

    /// Sign in as one of the catalog personas.
    pub async fn select_persona(&self, persona_id: &str) -> AuthResult<Identity> {
        let persona = self
            .catalog
            .get(persona_id)
            .ok_or_else(|| AuthError::UnknownPersona(persona_id.to_string()))?;
        let identity = persona.identity().clone();
        let credential = self.codec.issue(&identity, self.token_ttl_secs)?;

        let _write = self.writes.lock().await;
        self.storage.set(CREDENTIAL_KEY, credential.as_str()).await?;
        self.store.replace(Session::authenticated(identity.clone()));
        self.selector.send_replace(false);

        info!(
            persona = persona.persona_id(),
            subject = %identity.subject_id(),
            role = %identity.primary_role(),
            "signed in with mock persona"
        );
        Ok(identity)
    }

    pub async fn logout(&self) -> AuthResult<()> {
        let _write = self.writes.lock().await;
        self.store.replace(Session::anonymous());
        self.selector.send_replace(false);
        self.storage.remove(CREDENTIAL_KEY).await?;
        info!("signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::store::ProviderState;
    use agriops_auth::{Role, has_permission};
    use std::sync::atomic::{AtomicBool, Ordering};

    const SECRET: &str = "mock-test-secret";

    fn provider_with(storage: Arc<dyn CredentialStorage>, ttl: i64) -> MockProvider {
        let config = MockConfig::new(SECRET).with_token_ttl(ttl);
        MockProvider::new(&config, storage, Arc::new(SessionStore::new()))
    }

    fn provider() -> (MockProvider, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (provider_with(storage.clone(), 3600), storage)
    }

    #[tokio::test]
    async fn bootstrap_without_credential_is_unauthenticated() {
        let (provider, _) = provider();
        assert_eq!(provider.store.state(), ProviderState::Uninitialized);

        provider.bootstrap().await;

        assert_eq!(provider.store.state(), ProviderState::Unauthenticated);
        assert!(!provider.store.snapshot().is_loading());
        assert_eq!(provider.current_user(), None);
    }

    #[tokio::test]
    async fn bootstrap_restores_valid_credential() {
        let (first, storage) = provider();
        first.select_persona("factory-owner").await.unwrap();

        let second = provider_with(storage.clone(), 3600);
        second.bootstrap().await;

        assert_eq!(second.store.state(), ProviderState::Authenticated);
        assert_eq!(
            second.current_user().map(|u| u.primary_role().clone()),
            Some(Role::FACTORY_OWNER)
        );
    }

    #[tokio::test]
    async fn bootstrap_clears_rejected_credential() {
        let (provider, storage) = provider();
        storage.set(CREDENTIAL_KEY, "garbage.token.value").await.unwrap();

        provider.bootstrap().await;

        assert_eq!(provider.store.state(), ProviderState::Unauthenticated);
        assert_eq!(storage.get(CREDENTIAL_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn bootstrap_rejects_credential_signed_with_other_secret() {
        let storage = Arc::new(MemoryStorage::new());
        let foreign = TokenCodec::new("someone-elses-secret")
            .issue(
                PersonaCatalog::builtin().get("platform-admin").unwrap().identity(),
                3600,
            )
            .unwrap();
        storage.set(CREDENTIAL_KEY, foreign.as_str()).await.unwrap();

        let provider = provider_with(storage.clone(), 3600);
        provider.bootstrap().await;

        assert_eq!(provider.current_user(), None);
        assert_eq!(storage.get(CREDENTIAL_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn login_reveals_selector_and_selection_hides_it() {
        let (provider, storage) = provider();
        provider.bootstrap().await;

        provider.login();
        assert!(provider.show_login_selector());
        assert_eq!(provider.personas().len(), 5);

        let identity = provider.select_persona("registration-clerk").await.unwrap();
        assert!(!provider.show_login_selector());
        assert_eq!(identity.primary_role(), &Role::REGISTRATION_CLERK);
        assert!(has_permission(&provider.store.snapshot(), "farmers:create"));
        assert!(storage.get(CREDENTIAL_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_persona_is_rejected() {
        let (provider, _) = provider();
        assert!(matches!(
            provider.select_persona("janitor").await,
            Err(AuthError::UnknownPersona(id)) if id == "janitor"
        ));
        assert!(!provider.store.snapshot().is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_session_and_credential() {
        let (provider, storage) = provider();
        provider.bootstrap().await;
        provider.select_persona("factory-manager").await.unwrap();

        provider.logout().await.unwrap();

        assert_eq!(provider.current_user(), None);
        assert_eq!(storage.get(CREDENTIAL_KEY).await.unwrap(), None);
        assert_eq!(provider.store.state(), ProviderState::Unauthenticated);
    }

    #[tokio::test]
    async fn access_token_requires_session() {
        let (provider, _) = provider();
        provider.bootstrap().await;
        assert!(matches!(
            provider.get_access_token().await,
            Err(AuthError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn access_token_returns_stored_credential_when_fresh() {
        let (provider, storage) = provider();
        provider.select_persona("regulator").await.unwrap();

        let token = provider.get_access_token().await.unwrap();
        assert_eq!(Some(token.as_str().to_string()), storage.get(CREDENTIAL_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn access_token_is_reissued_near_expiry() {
        let (provider, storage) = provider();
        let identity = provider.select_persona("regulator").await.unwrap();
        let short_lived = TokenCodec::new(SECRET)
            .issue(&identity, RENEWAL_MARGIN_SECS / 2)
            .unwrap();
        storage.set(CREDENTIAL_KEY, short_lived.as_str()).await.unwrap();

        let renewed = provider.get_access_token().await.unwrap();

        let now = Utc::now();
        let verified = TokenCodec::new(SECRET).inspect_at(&renewed, now).unwrap();
        assert!(verified.expires_at - now > Duration::seconds(RENEWAL_MARGIN_SECS));
        assert_eq!(verified.identity, identity);
        assert_eq!(storage.get(CREDENTIAL_KEY).await.unwrap().as_deref(), Some(renewed.as_str()));
        assert!(provider.store.snapshot().is_authenticated());
    }

    /// Memory storage whose writes start failing once `fail_writes` is set.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        fail_writes: AtomicBool,
    }

    #[async_trait::async_trait]
    impl CredentialStorage for FlakyStorage {
        async fn get(&self, key: &str) -> AuthResult<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> AuthResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AuthError::Storage("disk full".to_string()));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> AuthResult<()> {
            self.inner.remove(key).await
        }
    }

    #[tokio::test]
    async fn renewal_that_cannot_be_persisted_ends_session() {
        let storage = Arc::new(FlakyStorage::default());
        let provider = provider_with(storage.clone(), RENEWAL_MARGIN_SECS / 2);
        provider.bootstrap().await;
        provider.select_persona("factory-manager").await.unwrap();

        storage.fail_writes.store(true, Ordering::SeqCst);
        let result = provider.get_access_token().await;

        assert!(matches!(result, Err(AuthError::SessionExpired)));
        assert_eq!(provider.store.state(), ProviderState::Unauthenticated);
        assert_eq!(storage.get(CREDENTIAL_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_stored_credential_ends_session() {
        let (provider, storage) = provider();
        provider.select_persona("regulator").await.unwrap();
        storage.set(CREDENTIAL_KEY, "tampered").await.unwrap();

        assert!(matches!(provider.get_access_token().await, Err(AuthError::SessionExpired)));
        assert_eq!(provider.store.state(), ProviderState::Unauthenticated);
        assert_eq!(storage.get(CREDENTIAL_KEY).await.unwrap(), None);
    }
}
