//! Session-layer error model.

use thiserror::Error;

use agriops_auth::TokenError;

/// Result type used across the session layer.
pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// No session exists; the caller must log in first.
    #[error("not authenticated")]
    NotAuthenticated,

    /// A credential refresh failed; the session was ended.
    #[error("session expired")]
    SessionExpired,

    /// The consumption hook was read outside a mounted provider (programmer error).
    #[error("auth provider not initialized")]
    ProviderNotInitialized,

    /// The requested capability is not offered by the active provider variant.
    #[error("operation not supported by the {0} provider")]
    Unsupported(&'static str),

    #[error("unknown persona '{0}'")]
    UnknownPersona(String),

    /// The redirect-return `state` did not match the pending login.
    #[error("login state mismatch")]
    StateMismatch,

    #[error("credential storage failed: {0}")]
    Storage(String),

    /// Transport failure talking to the identity backend.
    #[error("identity backend unreachable: {0}")]
    Backend(String),

    /// The identity backend answered but refused the request.
    #[error("identity backend rejected the request: {0}")]
    Rejected(String),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl From<std::io::Error> for AuthError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(value: reqwest::Error) -> Self {
        Self::Backend(value.to_string())
    }
}
