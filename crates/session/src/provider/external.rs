//! Provider backed by a third-party identity service.
//!
//! Authorization-code login through a browser redirect, silent renewal with a
//! stored refresh token, identity from the service's userinfo endpoint (same
//! claim names as the mock credential).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use agriops_auth::{Credential, Identity, IdentityClaims, Session};

use crate::config::ExternalConfig;
use crate::error::{AuthError, AuthResult};
use crate::navigator::Navigator;
use crate::provider::RENEWAL_MARGIN_SECS;
use crate::storage::{
    CREDENTIAL_EXPIRY_KEY, CREDENTIAL_KEY, CredentialStorage, LOGIN_STATE_KEY, REFRESH_TOKEN_KEY,
};
use crate::store::{Generation, SessionStore};

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 300;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Tokens and identity obtained from one successful exchange.
struct Grant {
    credential: Credential,
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
    identity: Identity,
}

pub struct ExternalProvider {
    config: ExternalConfig,
    http: reqwest::Client,
    navigator: Arc<dyn Navigator>,
    storage: Arc<dyn CredentialStorage>,
    store: Arc<SessionStore>,
    writes: Mutex<()>,
}

impl ExternalProvider {
    pub fn new(
        config: ExternalConfig,
        storage: Arc<dyn CredentialStorage>,
        store: Arc<SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            navigator,
            storage,
            store,
            writes: Mutex::new(()),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Silent renewal with the stored refresh token. Never prompts.
    pub async fn bootstrap(&self) {
        let ticket = self.store.begin_bootstrap();
        let outcome = self.silent_renew().await;

        let _write = self.writes.lock().await;
        if !self.store.is_current(ticket) {
            debug!("bootstrap superseded by a newer session write");
            return;
        }

        let session = match outcome {
            Ok(Some(grant)) => match self.persist(&grant).await {
                Ok(()) => {
                    info!(
                        subject = %grant.identity.subject_id(),
                        role = %grant.identity.primary_role(),
                        "session restored by silent renewal"
                    );
                    Session::authenticated(grant.identity)
                }
                Err(e) => {
                    warn!(error = %e, "could not persist renewed credential");
                    self.clear_tokens().await;
                    Session::anonymous()
                }
            },
            Ok(None) => Session::anonymous(),
            Err(e) => {
                warn!(error = %e, "silent renewal failed");
                self.clear_tokens().await;
                Session::anonymous()
            }
        };
        self.store.commit(ticket, session);
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.store.current_user()
    }

    /// Stored access token, refreshed first when it is about to expire.
    pub async fn get_access_token(&self) -> AuthResult<Credential> {
        if self.store.snapshot().trusted_identity().is_none() {
            return Err(AuthError::NotAuthenticated);
        }
        let ticket = self.store.begin();

        if let Some(credential) = self.fresh_stored_credential(Utc::now()).await {
            return Ok(credential);
        }

        debug!("access token missing or close to expiry; refreshing");
        let refreshed = self.refresh_from_storage().await;

        let _write = self.writes.lock().await;
        if !self.store.is_current(ticket) {
            debug!("renewal superseded by a newer session write");
            return self.superseded_credential().await;
        }

        match refreshed {
            Ok(grant) => {
                if let Err(e) = self.persist(&grant).await {
                    warn!(error = %e, "could not persist renewed credential");
                    return self.end_session(ticket).await;
                }
                if self.store.current_user().as_ref() != Some(&grant.identity) {
                    self.store.commit(ticket, Session::authenticated(grant.identity));
                }
                Ok(grant.credential)
            }
            Err(e) => {
                warn!(error = %e, "credential renewal failed");
                self.end_session(ticket).await
            }
        }
    }

    async fn end_session(&self, ticket: Generation) -> AuthResult<Credential> {
        if self.store.is_current(ticket) {
            info!("ending session after failed renewal");
            self.store.replace(Session::anonymous());
            self.clear_tokens().await;
        }
        Err(AuthError::SessionExpired)
    }

    async fn superseded_credential(&self) -> AuthResult<Credential> {
        if self.store.snapshot().trusted_identity().is_none() {
            return Err(AuthError::NotAuthenticated);
        }
        // A newer write may have stored a short-lived token; any still valid one will do.
        self.fresh_stored_credential(Utc::now() - Duration::seconds(RENEWAL_MARGIN_SECS))
            .await
            .ok_or(AuthError::SessionExpired)
    }

    /// Stored credential if it stays valid beyond the renewal margin from `now`.
    async fn fresh_stored_credential(&self, now: DateTime<Utc>) -> Option<Credential> {
        let token = self.storage.get(CREDENTIAL_KEY).await.ok()??;
        let expiry = self.storage.get(CREDENTIAL_EXPIRY_KEY).await.ok()??;
        let expires_at = DateTime::parse_from_rfc3339(&expiry).ok()?.with_timezone(&Utc);

        (expires_at - now > Duration::seconds(RENEWAL_MARGIN_SECS)).then(|| Credential::new(token))
    }

    /// Start a browser login. Returns once the redirect has been handed off.
    pub async fn login(&self) -> AuthResult<()> {
        let state = Uuid::new_v4().simple().to_string();
        self.storage.set(LOGIN_STATE_KEY, &state).await?;

        let url = self.authorization_url(&state);
        info!(authority = %self.config.authorize_endpoint(), "redirecting to identity service");
        self.navigator.navigate(&url);
        Ok(())
    }

    pub fn authorization_url(&self, state: &str) -> Url {
        let mut url = self.config.authorize_endpoint();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", self.config.client_id())
            .append_pair("redirect_uri", self.config.redirect_uri().as_str())
            .append_pair("scope", self.config.scope())
            .append_pair("state", state);
        url
    }

    /// Redirect-return half of the login: `callback` is the URL the identity
    /// service sent the browser back to.
    pub async fn complete_login_from_url(&self, callback: &Url) -> AuthResult<Identity> {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        for (key, value) in callback.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(AuthError::Rejected(error));
        }
        let code = code.ok_or_else(|| AuthError::Rejected("callback without code".to_string()))?;
        let state = state.ok_or(AuthError::StateMismatch)?;
        self.complete_login(&code, &state).await
    }

    pub async fn complete_login(&self, code: &str, state: &str) -> AuthResult<Identity> {
        let expected = self.storage.get(LOGIN_STATE_KEY).await?;
        if expected.as_deref() != Some(state) {
            warn!("login callback state does not match the pending login");
            return Err(AuthError::StateMismatch);
        }
        self.storage.remove(LOGIN_STATE_KEY).await?;

        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri().as_str()),
                ("client_id", self.config.client_id()),
            ])
            .await?;
        let grant = self.grant_from(response, None).await?;

        let _write = self.writes.lock().await;
        self.persist(&grant).await?;
        self.store.replace(Session::authenticated(grant.identity.clone()));
        info!(
            subject = %grant.identity.subject_id(),
            role = %grant.identity.primary_role(),
            "signed in through identity service"
        );
        Ok(grant.identity)
    }

    /// Local sign-out, then the identity service's end-session redirect.
    pub async fn logout(&self) -> AuthResult<()> {
        {
            let _write = self.writes.lock().await;
            self.store.replace(Session::anonymous());
            self.clear_tokens().await;
        }
        info!("signed out");

        let mut url = self.config.end_session_endpoint();
        url.query_pairs_mut()
            .append_pair("client_id", self.config.client_id());
        if let Some(uri) = self.config.post_logout_redirect_uri() {
            url.query_pairs_mut()
                .append_pair("post_logout_redirect_uri", uri.as_str());
        }
        self.navigator.navigate(&url);
        Ok(())
    }

    async fn silent_renew(&self) -> AuthResult<Option<Grant>> {
        match self.storage.get(REFRESH_TOKEN_KEY).await? {
            Some(refresh_token) => self.refresh(&refresh_token).await.map(Some),
            None => {
                debug!("no refresh token stored");
                Ok(None)
            }
        }
    }

    async fn refresh_from_storage(&self) -> AuthResult<Grant> {
        let refresh_token = self
            .storage
            .get(REFRESH_TOKEN_KEY)
            .await?
            .ok_or(AuthError::SessionExpired)?;
        self.refresh(&refresh_token).await
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<Grant> {
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id()),
            ])
            .await?;
        self.grant_from(response, Some(refresh_token)).await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> AuthResult<TokenResponse> {
        let response = self
            .http
            .post(self.config.token_endpoint())
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(format!("token endpoint returned {status}: {body}")));
        }
        Ok(response.json().await?)
    }

    async fn fetch_identity(&self, credential: &Credential) -> AuthResult<Identity> {
        let response = self
            .http
            .get(self.config.userinfo_endpoint())
            .bearer_auth(credential.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected(format!("userinfo endpoint returned {status}")));
        }
        let claims: IdentityClaims = response.json().await?;
        Identity::try_from(claims).map_err(|e| AuthError::Rejected(e.to_string()))
    }

    async fn grant_from(&self, response: TokenResponse, previous_refresh: Option<&str>) -> AuthResult<Grant> {
        let expires_in = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = Duration::try_seconds(expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::Rejected(format!("expires_in of {expires_in}s is out of range"))
            })?;

        let credential = Credential::new(response.access_token);
        let identity = self.fetch_identity(&credential).await?;

        Ok(Grant {
            credential,
            refresh_token: response
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at,
            identity,
        })
    }

    async fn persist(&self, grant: &Grant) -> AuthResult<()> {
        self.storage.set(CREDENTIAL_KEY, grant.credential.as_str()).await?;
        self.storage
            .set(CREDENTIAL_EXPIRY_KEY, &grant.expires_at.to_rfc3339())
            .await?;
        match &grant.refresh_token {
            Some(refresh_token) => self.storage.set(REFRESH_TOKEN_KEY, refresh_token).await,
            None => self.storage.remove(REFRESH_TOKEN_KEY).await,
        }
    }

    async fn clear_tokens(&self) {
        for key in [CREDENTIAL_KEY, CREDENTIAL_EXPIRY_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.storage.remove(key).await {
                warn!(key, error = %e, "failed to clear stored token");
            }
        }
    }
}
