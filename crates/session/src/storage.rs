//! Durable client-side credential storage.
//!
//! A tiny key/value contract (string keys, string values), the shape of a
//! browser's local storage. Presence of a value never implies validity.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AuthError, AuthResult};

/// Current credential (access token).
pub const CREDENTIAL_KEY: &str = "agriops.auth.credential";

/// Refresh token issued by the external identity backend.
pub const REFRESH_TOKEN_KEY: &str = "agriops.auth.refresh_token";

/// RFC 3339 expiry of the external credential.
pub const CREDENTIAL_EXPIRY_KEY: &str = "agriops.auth.credential_expires_at";

/// `state` of a pending external login redirect.
pub const LOGIN_STATE_KEY: &str = "agriops.auth.login_state";

#[async_trait]
pub trait CredentialStorage: Send + Sync {
    async fn get(&self, key: &str) -> AuthResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> AuthResult<()>;

    /// Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> AuthResult<()>;
}

/// In-memory storage for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> AuthError {
    AuthError::Storage("memory storage lock poisoned".to_string())
}

#[async_trait]
impl CredentialStorage for MemoryStorage {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        let values = self.values.lock().map_err(|_| poisoned())?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> AuthResult<()> {
        let mut values = self.values.lock().map_err(|_| poisoned())?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> AuthResult<()> {
        let mut values = self.values.lock().map_err(|_| poisoned())?;
        values.remove(key);
        Ok(())
    }
}

/// One file per key under a private directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<local data dir>/agriops`, e.g. `~/.local/share/agriops` on Linux.
    pub fn in_default_location() -> AuthResult<Self> {
        let base = dirs::data_local_dir().ok_or_else(|| {
            AuthError::Storage("could not determine the local data directory".to_string())
        })?;
        Ok(Self::new(base.join("agriops")))
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path_for(&self, key: &str) -> AuthResult<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(AuthError::Storage(format!("invalid storage key {key:?}")));
        }
        Ok(self.dir.join(key))
    }
}

#[async_trait]
impl CredentialStorage for FileStorage {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> AuthResult<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write-then-rename so readers never see a half-written credential.
        let tmp = self.dir.join(format!(".{key}.tmp"));
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(key, "stored value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> AuthResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise(storage: &dyn CredentialStorage) {
        assert_eq!(storage.get(CREDENTIAL_KEY).await.unwrap(), None);

        storage.set(CREDENTIAL_KEY, "token-1").await.unwrap();
        storage.set(CREDENTIAL_KEY, "token-2").await.unwrap();
        assert_eq!(storage.get(CREDENTIAL_KEY).await.unwrap().as_deref(), Some("token-2"));

        storage.remove(CREDENTIAL_KEY).await.unwrap();
        storage.remove(CREDENTIAL_KEY).await.unwrap();
        assert_eq!(storage.get(CREDENTIAL_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_storage_contract() {
        exercise(&MemoryStorage::new()).await;
    }

    #[tokio::test]
    async fn file_storage_contract() {
        let dir = std::env::temp_dir().join(format!("agriops-storage-{}", uuid::Uuid::now_v7()));
        let storage = FileStorage::new(&dir);

        exercise(&storage).await;

        storage.set(REFRESH_TOKEN_KEY, "r-1").await.unwrap();
        let reopened = FileStorage::new(&dir);
        assert_eq!(reopened.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(), Some("r-1"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn file_storage_rejects_path_like_keys() {
        let storage = FileStorage::new(std::env::temp_dir());
        assert!(matches!(storage.get("../etc/passwd").await, Err(AuthError::Storage(_))));
        assert!(matches!(storage.set("", "x").await, Err(AuthError::Storage(_))));
    }
}
