//! `reqwest`-backed transport with a cookie jar.
//!
//! The jar plays the browser's role for the httpOnly refresh cookie: it sends
//! whatever the server set, and the rest of the crate never looks inside.
//! Optionally the jar is written to a file so the refresh credential survives
//! a restart. Cookies are stored per domain, path and name with an absolute
//! expiry, so a reload never extends a `Max-Age` lifetime.

use cookie_store::{Cookie, CookieStore, RawCookie};
use reqwest::header::HeaderValue;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{ApiRequest, ApiResponse, Transport};
use crate::error::AuthError;

/// File name used for the persisted cookie jar inside the state directory.
pub const COOKIE_FILE_NAME: &str = "cookies.json";

/// Cookie store shared between the reqwest client and [`ReqwestTransport::save_cookies`].
struct PersistentJar(RwLock<CookieStore>);

impl PersistentJar {
    fn read(&self) -> RwLockReadGuard<'_, CookieStore> {
        self.0.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CookieStore> {
        self.0.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl reqwest::cookie::CookieStore for PersistentJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let cookies = cookie_headers
            .filter_map(|value| value.to_str().ok())
            .filter_map(|line| RawCookie::parse(line).ok())
            .map(RawCookie::into_owned);
        self.write().store_response_cookies(cookies, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .read()
            .get_request_values(url)
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
    cookie_file: Option<PathBuf>,
    jar: Arc<PersistentJar>,
}

impl ReqwestTransport {
    /// Transport with an in-memory cookie jar.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, AuthError> {
        Self::build(base_url, timeout, None)
    }

    /// Transport whose cookies are loaded from, and saved to, `cookie_file`.
    pub fn with_cookie_file(
        base_url: Url,
        timeout: Duration,
        cookie_file: impl Into<PathBuf>,
    ) -> Result<Self, AuthError> {
        Self::build(base_url, timeout, Some(cookie_file.into()))
    }

    fn build(
        base_url: Url,
        timeout: Duration,
        cookie_file: Option<PathBuf>,
    ) -> Result<Self, AuthError> {
        let store = match cookie_file.as_deref() {
            Some(path) => load_cookie_file(path)?,
            None => CookieStore::default(),
        };
        let jar = Arc::new(PersistentJar(RwLock::new(store)));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .cookie_provider(jar.clone())
            .build()
            .map_err(|e| AuthError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            cookie_file,
            jar,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Write the unexpired cookies to the cookie file, if one is configured.
    ///
    /// Session cookies are kept too: a restart of this process stands in for
    /// a page reload, not for closing the browser.
    pub fn save_cookies(&self) -> Result<(), AuthError> {
        let Some(path) = self.cookie_file.as_deref() else {
            return Ok(());
        };
        let content = {
            let store = self.jar.read();
            let cookies: Vec<&Cookie<'static>> = store.iter_unexpired().collect();
            serde_json::to_string_pretty(&cookies).map_err(AuthError::storage)?
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(AuthError::storage)?;
        }
        std::fs::write(path, content).map_err(AuthError::storage)?;
        debug!(path = %path.display(), "Saved cookies");
        Ok(())
    }

    fn url_for(&self, path: &str) -> Result<Url, AuthError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let joined = if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        };
        Url::parse(&joined)
            .map_err(|e| AuthError::InvalidRequest(format!("Invalid URL {}: {}", joined, e)))
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, AuthError> {
        let url = self.url_for(&request.path)?;
        debug!(request_id = %request.id(), method = %request.method, url = %url, "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(AuthError::network)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(AuthError::network)?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

/// Load the persisted jar, dropping cookies that expired in the meantime.
fn load_cookie_file(path: &Path) -> Result<CookieStore, AuthError> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CookieStore::default()),
        Err(e) => return Err(AuthError::storage(e)),
    };
    match cookie_store::serde::json::load(BufReader::new(file)) {
        Ok(store) => {
            let count = store.iter_unexpired().count();
            debug!(path = %path.display(), count, "Loaded persisted cookies");
            Ok(store)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable cookie file");
            Ok(CookieStore::default())
        }
    }
}
