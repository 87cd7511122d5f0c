//! `agriops-session`: identity providers and the session store.
//!
//! One [`IdentityProvider`] variant is selected from [`AuthConfig`] at
//! startup, mounted into an [`AuthScope`], and observed by the rest of the
//! console through [`use_auth`].

pub mod config;
pub mod context;
pub mod error;
pub mod navigator;
pub mod provider;
pub mod storage;
pub mod store;

pub use config::{
    AuthConfig, ConfigError, Environment, ExternalConfig, MockConfig, ProviderConfig, ProviderKind,
};
pub use context::{AuthContext, AuthScope, try_use_auth, use_auth};
pub use error::{AuthError, AuthResult};
pub use navigator::{LogNavigator, Navigator, RecordingNavigator};
pub use provider::{ExternalProvider, IdentityProvider, MockProvider, RENEWAL_MARGIN_SECS};
pub use storage::{CredentialStorage, FileStorage, MemoryStorage};
pub use store::{Generation, ProviderState, SessionStore};
