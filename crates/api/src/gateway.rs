//! Client for the backend gateway.
//!
//! Every request carries the current credential as a bearer token. A `401`
//! from the gateway means the credential is no longer accepted: the session
//! is ended and a fresh login is started before the error is returned.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use agriops_session::{AuthContext, AuthError};

pub const GATEWAY_BASE_URL_VAR: &str = "GATEWAY_BASE_URL";
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8000/api/";

#[derive(Debug, Error)]
pub enum GatewayError {
    /// No usable credential (not signed in, or renewal failed).
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The gateway rejected the credential; a new login has been started.
    #[error("gateway rejected the credential")]
    Unauthorized,

    #[error("gateway returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("invalid gateway path '{0}'")]
    InvalidPath(String),

    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct GatewayClient {
    base: Url,
    http: reqwest::Client,
    auth: AuthContext,
}

impl GatewayClient {
    pub fn new(base: Url, auth: AuthContext) -> Self {
        Self {
            base,
            http: reqwest::Client::new(),
            auth,
        }
    }

    /// Base URL from `GATEWAY_BASE_URL`, falling back to the local default.
    pub fn from_env(auth: AuthContext) -> Result<Self, url::ParseError> {
        let raw = std::env::var(GATEWAY_BASE_URL_VAR).unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string());
        Ok(Self::new(Url::parse(&raw)?, auth))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let request = self.http.request(Method::GET, self.url(path)?);
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.request(Method::POST, self.url(path)?).json(body);
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    fn url(&self, path: &str) -> Result<Url, GatewayError> {
        // Relative to the base; a leading '/' would drop the base path.
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|_| GatewayError::InvalidPath(path.to_string()))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, GatewayError> {
        let credential = self.auth.get_access_token().await?;
        let response = request.bearer_auth(credential.as_str()).send().await?;
        let status = response.status();
        debug!(%status, url = %response.url(), "gateway response");

        if status == StatusCode::UNAUTHORIZED {
            warn!("gateway rejected the credential; signing out");
            self.auth.logout().await?;
            self.auth.login().await?;
            return Err(GatewayError::Unauthorized);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status { status, message });
        }
        Ok(response)
    }
}
