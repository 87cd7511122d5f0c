//! Auth configuration surface.
//!
//! Read once at application start. The provider variant and its settings are
//! chosen here; nothing downstream looks at the environment again.

use thiserror::Error;
use tracing::warn;
use url::Url;

use agriops_auth::{DEFAULT_TTL_SECS, INSECURE_DEV_SECRET, TokenCodec};

pub const AUTH_PROVIDER_VAR: &str = "AUTH_PROVIDER";
pub const AUTH_ENVIRONMENT_VAR: &str = "AUTH_ENVIRONMENT";
pub const MOCK_JWT_SECRET_VAR: &str = "MOCK_JWT_SECRET";
pub const MOCK_TOKEN_TTL_VAR: &str = "MOCK_TOKEN_TTL_SECS";
pub const AUTH_AUTHORITY_VAR: &str = "AUTH_AUTHORITY";
pub const AUTH_CLIENT_ID_VAR: &str = "AUTH_CLIENT_ID";
pub const AUTH_REDIRECT_URI_VAR: &str = "AUTH_REDIRECT_URI";
pub const AUTH_SCOPE_VAR: &str = "AUTH_SCOPE";
pub const AUTH_POST_LOGOUT_REDIRECT_URI_VAR: &str = "AUTH_POST_LOGOUT_REDIRECT_URI";

pub const DEFAULT_SCOPE: &str = "openid profile email offline_access";

/// Upper bound for `MOCK_TOKEN_TTL_SECS` (one year).
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown auth provider '{0}' (expected 'mock' or 'oidc')")]
    UnknownProvider(String),

    #[error("unknown auth environment '{0}' (expected 'development' or 'production')")]
    UnknownEnvironment(String),

    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// The insecure development secret is never accepted in production.
    #[error("MOCK_JWT_SECRET must be set when the mock provider runs in production")]
    InsecureSecret,
}

/// Identity provider variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Mock,
    External,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Mock => "mock",
            ProviderKind::External => "oidc",
        }
    }
}

impl core::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Settings of the mock (local persona) provider.
#[derive(Clone)]
pub struct MockConfig {
    secret: String,
    token_ttl_secs: i64,
}

impl core::fmt::Debug for MockConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MockConfig")
            .field("secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

impl MockConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            token_ttl_secs: DEFAULT_TTL_SECS,
        }
    }

    pub fn with_token_ttl(mut self, secs: i64) -> Self {
        self.token_ttl_secs = secs;
        self
    }

    pub fn token_ttl_secs(&self) -> i64 {
        self.token_ttl_secs
    }

    pub fn codec(&self) -> TokenCodec {
        TokenCodec::new(self.secret.as_bytes())
    }
}

/// Settings of the external (redirect + silent renewal) provider.
#[derive(Debug, Clone)]
pub struct ExternalConfig {
    authority: Url,
    client_id: String,
    redirect_uri: Url,
    scope: String,
    post_logout_redirect_uri: Option<Url>,
}

impl ExternalConfig {
    pub fn new(authority: Url, client_id: impl Into<String>, redirect_uri: Url) -> Self {
        Self {
            authority: with_trailing_slash(authority),
            client_id: client_id.into(),
            redirect_uri,
            scope: DEFAULT_SCOPE.to_string(),
            post_logout_redirect_uri: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_post_logout_redirect_uri(mut self, uri: Url) -> Self {
        self.post_logout_redirect_uri = Some(uri);
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn post_logout_redirect_uri(&self) -> Option<&Url> {
        self.post_logout_redirect_uri.as_ref()
    }

    pub fn authorize_endpoint(&self) -> Url {
        self.endpoint("authorize")
    }

    pub fn token_endpoint(&self) -> Url {
        self.endpoint("token")
    }

    pub fn userinfo_endpoint(&self) -> Url {
        self.endpoint("userinfo")
    }

    pub fn end_session_endpoint(&self) -> Url {
        self.endpoint("logout")
    }

    fn endpoint(&self, path: &str) -> Url {
        // `authority` always ends with '/', so join appends rather than replaces.
        self.authority
            .join(path)
            .unwrap_or_else(|_| self.authority.clone())
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Mock(MockConfig),
    External(ExternalConfig),
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub environment: Environment,
    pub provider: ProviderConfig,
}

impl AuthConfig {
    /// Mock provider in development, signing with `secret`.
    pub fn mock(secret: impl Into<String>) -> Self {
        Self {
            environment: Environment::Development,
            provider: ProviderConfig::Mock(MockConfig::new(secret)),
        }
    }

    pub fn external(config: ExternalConfig) -> Self {
        Self {
            environment: Environment::Development,
            provider: ProviderConfig::External(config),
        }
    }

    pub fn provider_kind(&self) -> ProviderKind {
        match self.provider {
            ProviderConfig::Mock(_) => ProviderKind::Mock,
            ProviderConfig::External(_) => ProviderKind::External,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, file, test map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = match get(AUTH_ENVIRONMENT_VAR).as_deref() {
            None | Some("development") | Some("dev") => Environment::Development,
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => return Err(ConfigError::UnknownEnvironment(other.to_string())),
        };

        let provider = match get(AUTH_PROVIDER_VAR).as_deref() {
            None | Some("mock") => ProviderConfig::Mock(mock_from_lookup(&get, environment)?),
            Some("oidc") | Some("external") => ProviderConfig::External(external_from_lookup(&get)?),
            Some(other) => return Err(ConfigError::UnknownProvider(other.to_string())),
        };

        Ok(Self {
            environment,
            provider,
        })
    }
}

fn mock_from_lookup<G>(get: &G, environment: Environment) -> Result<MockConfig, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let secret = match get(MOCK_JWT_SECRET_VAR) {
        Some(secret) => secret,
        None if environment == Environment::Production => return Err(ConfigError::InsecureSecret),
        None => {
            warn!("{MOCK_JWT_SECRET_VAR} not set; using insecure dev default");
            INSECURE_DEV_SECRET.to_string()
        }
    };

    let mut config = MockConfig::new(secret);
    if let Some(raw) = get(MOCK_TOKEN_TTL_VAR) {
        let ttl: i64 = raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
            key: MOCK_TOKEN_TTL_VAR,
            reason: e.to_string(),
        })?;
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&ttl) {
            return Err(ConfigError::Invalid {
                key: MOCK_TOKEN_TTL_VAR,
                reason: format!("must be between 1 and {MAX_TOKEN_TTL_SECS}"),
            });
        }
        config = config.with_token_ttl(ttl);
    }
    Ok(config)
}

fn external_from_lookup<G>(get: &G) -> Result<ExternalConfig, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let url = |key: &'static str| -> Result<Url, ConfigError> {
        let raw = get(key).ok_or(ConfigError::Missing(key))?;
        Url::parse(&raw).map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
    };

    let authority = url(AUTH_AUTHORITY_VAR)?;
    let redirect_uri = url(AUTH_REDIRECT_URI_VAR)?;
    let client_id = get(AUTH_CLIENT_ID_VAR).ok_or(ConfigError::Missing(AUTH_CLIENT_ID_VAR))?;

    let mut config = ExternalConfig::new(authority, client_id, redirect_uri);
    if let Some(scope) = get(AUTH_SCOPE_VAR) {
        config = config.with_scope(scope);
    }
    if get(AUTH_POST_LOGOUT_REDIRECT_URI_VAR).is_some() {
        config = config.with_post_logout_redirect_uri(url(AUTH_POST_LOGOUT_REDIRECT_URI_VAR)?);
    }
    Ok(config)
}
