#![allow(dead_code)]

//! In-process dashboard backend for integration tests.
//!
//! Issues real HS256 access tokens and rotating refresh cookies. Access tokens
//! carry a generation number; [`MockBackend::expire_access_tokens`] bumps it so
//! every outstanding token is rejected with 401 while refresh keeps working.

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use campus_session::error::AuthError;
use campus_session::session::{MemoryRememberStore, RememberStore, TokenStore};
use campus_session::transport::{ApiRequest, ApiResponse, Transport};
use campus_session::{SessionRuntime, create_runtime};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tower::ServiceExt;

pub const LEGACY_ROLE_CLAIM: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";
pub const REFRESH_COOKIE: &str = "refresh_token";

const JWT_SECRET: &[u8] = b"test-jwt-secret";

/// How the refresh endpoint answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Rotate the cookie and return the full identity.
    Normal,
    /// Rotate the cookie but return only the token; identity is in legacy claims.
    TokenOnly,
    /// 401 whatever the cookie says.
    Revoked,
    /// 200 with a failing envelope code.
    EnvelopeDenied,
    /// 502 from the gateway.
    Unavailable,
}

#[derive(Clone, Copy)]
struct User {
    id: i64,
    role: &'static str,
    password: &'static str,
}

const USERS: &[(&str, User)] = &[
    (
        "alice",
        User {
            id: 7,
            role: "TEACHER",
            password: "correct-horse",
        },
    ),
    (
        "root",
        User {
            id: 1,
            role: "ADMIN",
            password: "admin-pass",
        },
    ),
    (
        "locked",
        User {
            id: 99,
            role: "STUDENT",
            password: "whatever",
        },
    ),
];

fn find_user(username: &str) -> Option<User> {
    USERS
        .iter()
        .find(|(name, _)| *name == username)
        .map(|(_, user)| *user)
}

struct BackendState {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    generation: AtomicU64,
    refresh_mode: Mutex<RefreshMode>,
    refresh_open: watch::Sender<bool>,
    refresh_tokens: Mutex<HashMap<String, User>>,
    refresh_calls: AtomicUsize,
    login_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    rejected: AtomicUsize,
}

#[derive(Clone)]
pub struct MockBackend {
    state: Arc<BackendState>,
}

impl MockBackend {
    pub fn new() -> Self {
        let (refresh_open, _rx) = watch::channel(true);
        Self {
            state: Arc::new(BackendState {
                encoding_key: EncodingKey::from_secret(JWT_SECRET),
                decoding_key: DecodingKey::from_secret(JWT_SECRET),
                generation: AtomicU64::new(0),
                refresh_mode: Mutex::new(RefreshMode::Normal),
                refresh_open,
                refresh_tokens: Mutex::new(HashMap::new()),
                refresh_calls: AtomicUsize::new(0),
                login_calls: AtomicUsize::new(0),
                logout_calls: AtomicUsize::new(0),
                rejected: AtomicUsize::new(0),
            }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/auth/login", post(login))
            .route("/auth/refreshtoken", post(refresh))
            .route("/auth/logout", post(logout))
            .route("/students", get(students))
            .route("/forbidden", get(forbidden))
            .with_state(self.state.clone())
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.state.refresh_mode.lock().unwrap() = mode;
    }

    /// Make the refresh endpoint wait until [`MockBackend::release_refresh`].
    pub fn hold_refresh(&self) {
        self.state.refresh_open.send_replace(false);
    }

    pub fn release_refresh(&self) {
        self.state.refresh_open.send_replace(true);
    }

    /// Invalidate every access token issued so far.
    pub fn expire_access_tokens(&self) {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Forget all refresh cookies, as if they had expired server-side.
    pub fn revoke_refresh_tokens(&self) {
        self.state.refresh_tokens.lock().unwrap().clear();
    }

    /// Mint an access token for `username` that the backend accepts.
    pub fn access_token_for(&self, username: &str) -> String {
        let user = find_user(username).unwrap();
        self.state.issue_access_token(user, false)
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.state.login_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.state.logout_calls.load(Ordering::SeqCst)
    }

    /// Requests to protected routes answered with 401.
    pub fn rejected(&self) -> usize {
        self.state.rejected.load(Ordering::SeqCst)
    }

    pub fn active_refresh_tokens(&self) -> usize {
        self.state.refresh_tokens.lock().unwrap().len()
    }
}

impl BackendState {
    fn issue_access_token(&self, user: User, legacy_claims: bool) -> String {
        let exp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 300;
        let generation = self.generation.load(Ordering::SeqCst);
        let claims = if legacy_claims {
            json!({
                "sub": user.id.to_string(),
                LEGACY_ROLE_CLAIM: [user.role],
                "gen": generation,
                "exp": exp,
            })
        } else {
            json!({
                "sub": user.id.to_string(),
                "userId": user.id,
                "role": user.role,
                "gen": generation,
                "exp": exp,
            })
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key).unwrap()
    }

    fn issue_refresh_cookie(&self, user: User) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        self.refresh_tokens
            .lock()
            .unwrap()
            .insert(token.clone(), user);
        format!("{}={}; HttpOnly; Path=/; SameSite=Strict", REFRESH_COOKIE, token)
    }

    /// The bearer token is valid and from the current generation.
    fn authorize(&self, headers: &HeaderMap) -> bool {
        let Some(token) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
        else {
            return false;
        };
        let validation = Validation::new(Algorithm::HS256);
        match jsonwebtoken::decode::<Value>(token, &self.decoding_key, &validation) {
            Ok(data) => {
                data.claims["gen"].as_u64() == Some(self.generation.load(Ordering::SeqCst))
            }
            Err(_) => false,
        }
    }
}

fn envelope(code: i64, message: &str, data: Value) -> Json<Value> {
    Json(json!({ "code": code, "message": message, "data": data }))
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

async fn login(State(state): State<Arc<BackendState>>, Json(body): Json<LoginBody>) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);

    let Some(user) = find_user(&body.username).filter(|u| u.password == body.password) else {
        return (
            StatusCode::UNAUTHORIZED,
            envelope(4010, "Invalid username or password", Value::Null),
        )
            .into_response();
    };

    if body.username == "locked" {
        return envelope(4003, "Account is locked", Value::Null).into_response();
    }

    let cookie = state.issue_refresh_cookie(user);
    let token = state.issue_access_token(user, false);
    (
        [(header::SET_COOKIE, cookie)],
        envelope(
            1000,
            "Login successful",
            json!({ "accessToken": token, "role": user.role, "userId": user.id }),
        ),
    )
        .into_response()
}

async fn refresh(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let mut open = state.refresh_open.subscribe();
    let _ = open.wait_for(|open| *open).await;

    let mode = *state.refresh_mode.lock().unwrap();
    match mode {
        RefreshMode::Revoked => {
            return (
                StatusCode::UNAUTHORIZED,
                envelope(4011, "Refresh token revoked", Value::Null),
            )
                .into_response();
        }
        RefreshMode::EnvelopeDenied => {
            return envelope(4011, "Refresh token expired", Value::Null).into_response();
        }
        RefreshMode::Unavailable => return StatusCode::BAD_GATEWAY.into_response(),
        RefreshMode::Normal | RefreshMode::TokenOnly => {}
    }

    let user = cookie_value(&headers, REFRESH_COOKIE)
        .and_then(|token| state.refresh_tokens.lock().unwrap().remove(token));
    let Some(user) = user else {
        return (
            StatusCode::UNAUTHORIZED,
            envelope(4011, "Refresh token expired", Value::Null),
        )
            .into_response();
    };

    let cookie = state.issue_refresh_cookie(user);
    let data = if mode == RefreshMode::TokenOnly {
        json!({ "accessToken": state.issue_access_token(user, true) })
    } else {
        json!({
            "accessToken": state.issue_access_token(user, false),
            "role": user.role,
            "userId": user.id,
        })
    };
    ([(header::SET_COOKIE, cookie)], envelope(1000, "OK", data)).into_response()
}

async fn logout(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    if !state.authorize(&headers) {
        state.rejected.fetch_add(1, Ordering::SeqCst);
        return (
            StatusCode::UNAUTHORIZED,
            envelope(4010, "Unauthorized", Value::Null),
        )
            .into_response();
    }
    if let Some(token) = cookie_value(&headers, REFRESH_COOKIE) {
        state.refresh_tokens.lock().unwrap().remove(token);
    }
    (
        [(
            header::SET_COOKIE,
            format!("{}=; HttpOnly; Path=/; Max-Age=0", REFRESH_COOKIE),
        )],
        envelope(1000, "Logged out", Value::Null),
    )
        .into_response()
}

async fn students(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !state.authorize(&headers) {
        state.rejected.fetch_add(1, Ordering::SeqCst);
        return (
            StatusCode::UNAUTHORIZED,
            envelope(4010, "Token expired", Value::Null),
        )
            .into_response();
    }
    envelope(
        1000,
        "OK",
        json!([{ "id": 1, "name": "Ana" }, { "id": 2, "name": "Bao" }]),
    )
    .into_response()
}

/// Rejects every caller, valid token or not.
async fn forbidden(State(state): State<Arc<BackendState>>) -> Response {
    state.rejected.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::FORBIDDEN,
        envelope(4030, "Insufficient role", Value::Null),
    )
        .into_response()
}

/// What the client put on the wire, and what its token store held at that moment.
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub store_token: Option<String>,
}

impl SentRequest {
    pub fn bearer(&self) -> Option<&str> {
        self.authorization.as_deref()?.strip_prefix("Bearer ")
    }
}

/// [`Transport`] that dispatches straight into an axum router.
///
/// Keeps a minimal cookie jar so the refresh cookie round-trips like it would
/// in a browser.
pub struct RouterTransport {
    router: Router,
    cookies: Mutex<HashMap<String, String>>,
    sent: Mutex<Vec<SentRequest>>,
    observed: Mutex<Option<TokenStore>>,
}

impl RouterTransport {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            cookies: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            observed: Mutex::new(None),
        }
    }

    /// Record `store`'s token next to every request sent from now on.
    pub fn observe(&self, store: TokenStore) {
        *self.observed.lock().unwrap() = Some(store);
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, path: &str) -> Vec<SentRequest> {
        self.sent()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.lock().unwrap().get(name).cloned()
    }

    pub fn clear_cookies(&self) {
        self.cookies.lock().unwrap().clear();
    }

    fn cookie_header(&self) -> Option<String> {
        let cookies = self.cookies.lock().unwrap();
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    fn store_cookies(&self, headers: &HeaderMap) {
        let mut cookies = self.cookies.lock().unwrap();
        for line in headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
        {
            let Some((name, value)) = line.split(';').next().and_then(|p| p.split_once('=')) else {
                continue;
            };
            if line.contains("Max-Age=0") {
                cookies.remove(name.trim());
            } else {
                cookies.insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }
}

impl Transport for RouterTransport {
    fn send(
        &self,
        request: &ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, AuthError>> + Send {
        let store_token = self
            .observed
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|store| store.access_token());
        self.sent.lock().unwrap().push(SentRequest {
            path: request.path.clone(),
            authorization: request
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            store_token,
        });

        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(request.path.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(cookie) = self.cookie_header() {
            builder = builder.header(header::COOKIE, cookie);
        }
        let http_request = builder
            .body(Body::from(request.body.clone().unwrap_or_default()))
            .unwrap();
        let router = self.router.clone();

        async move {
            let response = router.oneshot(http_request).await.unwrap();
            self.store_cookies(response.headers());
            let status = response.status();
            let headers = response.headers().clone();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .map_err(AuthError::network)?;
            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        }
    }
}

pub type TestRuntime = SessionRuntime<Arc<RouterTransport>>;

pub struct TestContext {
    pub backend: MockBackend,
    pub transport: Arc<RouterTransport>,
    pub remember: Arc<MemoryRememberStore>,
    pub runtime: TestRuntime,
}

pub fn setup() -> TestContext {
    setup_with_remember(MemoryRememberStore::new())
}

pub fn setup_with_remember(remember: MemoryRememberStore) -> TestContext {
    let backend = MockBackend::new();
    let transport = Arc::new(RouterTransport::new(backend.router()));
    let remember = Arc::new(remember);
    let runtime = create_runtime(
        transport.clone(),
        remember.clone() as Arc<dyn RememberStore>,
        Default::default(),
    );
    transport.observe(runtime.context().tokens().clone());
    TestContext {
        backend,
        transport,
        remember,
        runtime,
    }
}

impl TestContext {
    pub async fn login_alice(&self) {
        self.runtime
            .auth()
            .login("alice", "correct-horse", true)
            .await
            .unwrap();
    }
}

/// Poll `condition` until it holds, failing the test after a few seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
