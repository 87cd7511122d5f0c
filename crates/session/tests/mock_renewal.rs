//! Mock provider renewal racing a logout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

use agriops_session::storage::CREDENTIAL_KEY;
use agriops_session::{
    AuthConfig, AuthError, AuthResult, AuthScope, CredentialStorage, IdentityProvider, MemoryStorage,
    MockConfig, ProviderConfig, RecordingNavigator, use_auth,
};

/// Pauses the next credential read after fetching the value.
#[derive(Default)]
struct GatedStorage {
    inner: MemoryStorage,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl CredentialStorage for GatedStorage {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        let value = self.inner.get(key).await?;
        if key == CREDENTIAL_KEY && self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> AuthResult<()> {
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> AuthResult<()> {
        self.inner.remove(key).await
    }
}

fn short_lived_mock() -> AuthConfig {
    let mut config = AuthConfig::mock("race-test-secret");
    // Every credential starts inside the renewal margin.
    config.provider = ProviderConfig::Mock(MockConfig::new("race-test-secret").with_token_ttl(30));
    config
}

#[tokio::test]
async fn stale_renewal_does_not_survive_logout() {
    let storage = Arc::new(GatedStorage::default());
    let scope = AuthScope::new();
    scope
        .mount_and_bootstrap(IdentityProvider::from_config(
            &short_lived_mock(),
            storage.clone(),
            Arc::new(RecordingNavigator::new()),
        ))
        .await;
    let auth = use_auth(&scope);
    auth.select_persona("factory-owner").await.unwrap();

    storage.armed.store(true, Ordering::SeqCst);
    let renewal = tokio::spawn({
        let auth = auth.clone();
        async move { auth.get_access_token().await }
    });

    storage.entered.notified().await;
    auth.logout().await.unwrap();
    storage.release.notify_one();

    let result = renewal.await.unwrap();
    assert!(matches!(result, Err(AuthError::NotAuthenticated)));
    assert!(!auth.is_authenticated());
    assert!(storage.get(CREDENTIAL_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn renewal_without_interference_rewrites_the_credential() {
    let storage = Arc::new(GatedStorage::default());
    let scope = AuthScope::new();
    scope
        .mount_and_bootstrap(IdentityProvider::from_config(
            &short_lived_mock(),
            storage.clone(),
            Arc::new(RecordingNavigator::new()),
        ))
        .await;
    let auth = use_auth(&scope);
    auth.select_persona("factory-owner").await.unwrap();

    let credential = auth.get_access_token().await.unwrap();

    assert!(auth.is_authenticated());
    assert_eq!(
        storage.get(CREDENTIAL_KEY).await.unwrap().as_deref(),
        Some(credential.as_str())
    );
}
