//! External provider flows against an in-process fake identity service.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::json;
use tokio::sync::Notify;
use url::Url;

use agriops_session::storage::{CREDENTIAL_KEY, LOGIN_STATE_KEY, REFRESH_TOKEN_KEY};
use agriops_session::{
    AuthConfig, AuthError, CredentialStorage, ExternalConfig, IdentityProvider, MemoryStorage,
    Navigator, ProviderKind, ProviderState, RecordingNavigator,
};

const GOOD_CODE: &str = "good-code";
const REFRESH_TOKEN: &str = "refresh-1";

struct FakeIdp {
    expires_in: AtomicI64,
    issued: AtomicUsize,
    refresh_fails: AtomicBool,
    hold_refresh: AtomicBool,
    refresh_entered: Notify,
    release_refresh: Notify,
}

impl FakeIdp {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            expires_in: AtomicI64::new(3600),
            issued: AtomicUsize::new(0),
            refresh_fails: AtomicBool::new(false),
            hold_refresh: AtomicBool::new(false),
            refresh_entered: Notify::new(),
            release_refresh: Notify::new(),
        })
    }

    fn grant(&self) -> Response {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Json(json!({
            "access_token": format!("access-{n}"),
            "refresh_token": REFRESH_TOKEN,
            "expires_in": self.expires_in.load(Ordering::SeqCst),
            "token_type": "Bearer",
        }))
        .into_response()
    }
}

fn invalid_grant() -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" }))).into_response()
}

async fn token(State(idp): State<Arc<FakeIdp>>, Form(form): Form<HashMap<String, String>>) -> Response {
    let field = |name: &str| form.get(name).map(String::as_str);

    match field("grant_type") {
        Some("authorization_code") if field("code") == Some(GOOD_CODE) => idp.grant(),
        Some("refresh_token") => {
            if idp.hold_refresh.swap(false, Ordering::SeqCst) {
                idp.refresh_entered.notify_one();
                idp.release_refresh.notified().await;
            }
            if idp.refresh_fails.load(Ordering::SeqCst) || field("refresh_token") != Some(REFRESH_TOKEN) {
                invalid_grant()
            } else {
                idp.grant()
            }
        }
        _ => invalid_grant(),
    }
}

async fn userinfo(headers: HeaderMap) -> Response {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match bearer {
        Some(token) if token.starts_with("access-") => Json(json!({
            "sub": "owner-7",
            "email": "owner7@agriops.test",
            "name": "Wanjiru Owner",
            "role": "factory_owner",
            "factory_id": "KEN-FAC-002",
            "permissions": ["factories:read", "farmers:read"],
        }))
        .into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn spawn_idp(idp: Arc<FakeIdp>) -> Url {
    let app = Router::new()
        .route("/idp/token", post(token))
        .route("/idp/userinfo", get(userinfo))
        .with_state(idp);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // No trailing slash on purpose.
    Url::parse(&format!("http://{addr}/idp")).unwrap()
}

struct Harness {
    provider: IdentityProvider,
    storage: Arc<MemoryStorage>,
    navigator: Arc<RecordingNavigator>,
}

fn harness(authority: Url) -> Harness {
    let config = ExternalConfig::new(
        authority,
        "agriops-console",
        Url::parse("http://localhost:5173/auth/callback").unwrap(),
    )
    .with_post_logout_redirect_uri(Url::parse("http://localhost:5173/").unwrap());

    let storage = Arc::new(MemoryStorage::new());
    let navigator = Arc::new(RecordingNavigator::new());
    let provider = IdentityProvider::from_config(
        &AuthConfig::external(config),
        storage.clone() as Arc<dyn CredentialStorage>,
        navigator.clone() as Arc<dyn Navigator>,
    );
    Harness {
        provider,
        storage,
        navigator,
    }
}

fn query(url: &Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
}

async fn sign_in(h: &Harness) {
    h.provider.bootstrap().await;
    h.provider.login().await.unwrap();
    let state = query(&h.navigator.visited()[0])["state"].clone();
    h.provider
        .redirect_handler()
        .unwrap()
        .complete_login(GOOD_CODE, &state)
        .await
        .unwrap();
}

#[tokio::test]
async fn login_redirects_and_callback_signs_in() {
    let authority = spawn_idp(FakeIdp::new()).await;
    let h = harness(authority.clone());

    assert_eq!(h.provider.kind(), ProviderKind::External);
    assert!(h.provider.persona_selector().is_none());
    assert!(!h.provider.show_login_selector());

    h.provider.bootstrap().await;
    assert_eq!(h.provider.state(), ProviderState::Unauthenticated);

    h.provider.login().await.unwrap();
    let visited = h.navigator.visited();
    assert_eq!(visited.len(), 1);
    assert_eq!(visited[0].path(), "/idp/authorize");

    let params = query(&visited[0]);
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["client_id"], "agriops-console");
    assert_eq!(params["redirect_uri"], "http://localhost:5173/auth/callback");
    assert_eq!(params["scope"], "openid profile email offline_access");
    assert_eq!(
        h.storage.get(LOGIN_STATE_KEY).await.unwrap().as_deref(),
        Some(params["state"].as_str())
    );

    let mut callback = Url::parse("http://localhost:5173/auth/callback").unwrap();
    callback
        .query_pairs_mut()
        .append_pair("code", GOOD_CODE)
        .append_pair("state", &params["state"]);
    let identity = h
        .provider
        .redirect_handler()
        .unwrap()
        .complete_login_from_url(&callback)
        .await
        .unwrap();

    assert_eq!(identity.subject_id().as_str(), "owner-7");
    assert_eq!(identity.factory_ids().len(), 1);
    assert_eq!(h.provider.state(), ProviderState::Authenticated);
    assert_eq!(h.provider.current_user(), Some(identity));
    assert_eq!(
        h.storage.get(CREDENTIAL_KEY).await.unwrap().as_deref(),
        Some("access-1")
    );
    assert!(h.storage.get(LOGIN_STATE_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn callback_with_wrong_state_is_rejected() {
    let authority = spawn_idp(FakeIdp::new()).await;
    let h = harness(authority);
    h.provider.bootstrap().await;
    h.provider.login().await.unwrap();

    let result = h
        .provider
        .redirect_handler()
        .unwrap()
        .complete_login(GOOD_CODE, "forged-state")
        .await;

    assert!(matches!(result, Err(AuthError::StateMismatch)));
    assert!(!h.provider.session().is_authenticated());
}

#[tokio::test]
async fn callback_carrying_an_error_is_rejected() {
    let authority = spawn_idp(FakeIdp::new()).await;
    let h = harness(authority);

    let callback = Url::parse("http://localhost:5173/auth/callback?error=access_denied&state=x").unwrap();
    let result = h
        .provider
        .redirect_handler()
        .unwrap()
        .complete_login_from_url(&callback)
        .await;

    assert!(matches!(result, Err(AuthError::Rejected(e)) if e == "access_denied"));
}

#[tokio::test]
async fn bootstrap_restores_with_refresh_token() {
    let authority = spawn_idp(FakeIdp::new()).await;
    let h = harness(authority);
    h.storage.set(REFRESH_TOKEN_KEY, REFRESH_TOKEN).await.unwrap();

    h.provider.bootstrap().await;

    let session = h.provider.session();
    assert!(!session.is_loading());
    assert!(session.is_authenticated());
    assert_eq!(
        h.storage.get(CREDENTIAL_KEY).await.unwrap().as_deref(),
        Some("access-1")
    );
}

#[tokio::test]
async fn bootstrap_with_rejected_refresh_token_ends_anonymous() {
    let idp = FakeIdp::new();
    idp.refresh_fails.store(true, Ordering::SeqCst);
    let authority = spawn_idp(idp).await;
    let h = harness(authority);
    h.storage.set(REFRESH_TOKEN_KEY, REFRESH_TOKEN).await.unwrap();

    h.provider.bootstrap().await;

    assert_eq!(h.provider.state(), ProviderState::Unauthenticated);
    assert!(h.storage.get(REFRESH_TOKEN_KEY).await.unwrap().is_none());
    assert!(h.navigator.visited().is_empty());
}

#[tokio::test]
async fn bootstrap_with_unreachable_backend_ends_anonymous() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let h = harness(Url::parse(&format!("http://{addr}/idp/")).unwrap());
    h.storage.set(REFRESH_TOKEN_KEY, REFRESH_TOKEN).await.unwrap();

    h.provider.bootstrap().await;

    let session = h.provider.session();
    assert!(!session.is_loading());
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn callback_with_out_of_range_lifetime_is_rejected() {
    let idp = FakeIdp::new();
    idp.expires_in.store(i64::MAX, Ordering::SeqCst);
    let authority = spawn_idp(idp).await;
    let h = harness(authority);
    h.provider.bootstrap().await;
    h.provider.login().await.unwrap();
    let state = query(&h.navigator.visited()[0])["state"].clone();

    let result = h
        .provider
        .redirect_handler()
        .unwrap()
        .complete_login(GOOD_CODE, &state)
        .await;

    assert!(matches!(result, Err(AuthError::Rejected(_))));
    assert!(!h.provider.session().is_authenticated());
    assert!(h.storage.get(CREDENTIAL_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn bootstrap_with_out_of_range_lifetime_ends_anonymous() {
    let idp = FakeIdp::new();
    idp.expires_in.store(i64::MAX, Ordering::SeqCst);
    let authority = spawn_idp(idp).await;
    let h = harness(authority);
    h.storage.set(REFRESH_TOKEN_KEY, REFRESH_TOKEN).await.unwrap();

    h.provider.bootstrap().await;

    let session = h.provider.session();
    assert!(!session.is_loading());
    assert!(!session.is_authenticated());
    assert_eq!(h.provider.state(), ProviderState::Unauthenticated);
}

#[tokio::test]
async fn fresh_access_token_is_returned_without_renewal() {
    let idp = FakeIdp::new();
    let authority = spawn_idp(idp.clone()).await;
    let h = harness(authority);
    sign_in(&h).await;

    let first = h.provider.get_access_token().await.unwrap();
    let second = h.provider.get_access_token().await.unwrap();

    assert_eq!(first.as_str(), "access-1");
    assert_eq!(second.as_str(), "access-1");
    assert_eq!(idp.issued.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn access_token_near_expiry_is_renewed() {
    let idp = FakeIdp::new();
    idp.expires_in.store(30, Ordering::SeqCst);
    let authority = spawn_idp(idp.clone()).await;
    let h = harness(authority);
    sign_in(&h).await;

    let renewed = h.provider.get_access_token().await.unwrap();

    assert_eq!(renewed.as_str(), "access-2");
    assert!(h.provider.session().is_authenticated());
    assert_eq!(
        h.storage.get(CREDENTIAL_KEY).await.unwrap().as_deref(),
        Some("access-2")
    );
}

#[tokio::test]
async fn failed_renewal_ends_the_session() {
    let idp = FakeIdp::new();
    idp.expires_in.store(30, Ordering::SeqCst);
    let authority = spawn_idp(idp.clone()).await;
    let h = harness(authority);
    sign_in(&h).await;

    idp.refresh_fails.store(true, Ordering::SeqCst);
    let result = h.provider.get_access_token().await;

    assert!(matches!(result, Err(AuthError::SessionExpired)));
    assert_eq!(h.provider.state(), ProviderState::Unauthenticated);
    assert!(h.storage.get(CREDENTIAL_KEY).await.unwrap().is_none());
    assert!(h.storage.get(REFRESH_TOKEN_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn logout_clears_tokens_and_visits_end_session() {
    let authority = spawn_idp(FakeIdp::new()).await;
    let h = harness(authority);
    sign_in(&h).await;

    h.provider.logout().await.unwrap();

    assert_eq!(h.provider.state(), ProviderState::Unauthenticated);
    assert!(h.storage.get(CREDENTIAL_KEY).await.unwrap().is_none());
    assert!(h.storage.get(REFRESH_TOKEN_KEY).await.unwrap().is_none());

    let end_session = h.navigator.visited().last().cloned().unwrap();
    assert_eq!(end_session.path(), "/idp/logout");
    let params = query(&end_session);
    assert_eq!(params["client_id"], "agriops-console");
    assert_eq!(params["post_logout_redirect_uri"], "http://localhost:5173/");
}

#[tokio::test]
async fn renewal_finishing_after_logout_is_discarded() {
    let idp = FakeIdp::new();
    idp.expires_in.store(30, Ordering::SeqCst);
    let authority = spawn_idp(idp.clone()).await;
    let h = Arc::new(harness(authority));
    sign_in(&h).await;

    idp.hold_refresh.store(true, Ordering::SeqCst);
    let renewal = tokio::spawn({
        let h = h.clone();
        async move { h.provider.get_access_token().await }
    });

    idp.refresh_entered.notified().await;
    h.provider.logout().await.unwrap();
    idp.release_refresh.notify_one();

    let result = renewal.await.unwrap();
    assert!(matches!(result, Err(AuthError::NotAuthenticated)));
    assert!(!h.provider.session().is_authenticated());
    assert!(h.storage.get(CREDENTIAL_KEY).await.unwrap().is_none());
    assert!(h.storage.get(REFRESH_TOKEN_KEY).await.unwrap().is_none());
}
