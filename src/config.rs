//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default login path, relative to the API base URL.
pub const LOGIN_PATH: &str = "/auth/login";

/// Default refresh path. Authenticated by the refresh cookie only.
pub const REFRESH_PATH: &str = "/auth/refreshtoken";

/// Default logout path.
pub const LOGOUT_PATH: &str = "/auth/logout";

/// Paths of the authentication endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login: String,
    pub refresh: String,
    pub logout: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: LOGIN_PATH.to_string(),
            refresh: REFRESH_PATH.to_string(),
            logout: LOGOUT_PATH.to_string(),
        }
    }
}

impl Endpoints {
    /// Whether a failed call to `route` must never trigger a refresh.
    ///
    /// A 401 from login means bad credentials and a 401 from refresh means the
    /// refresh credential is gone; refreshing on either would loop.
    pub fn is_refresh_exempt(&self, route: &str) -> bool {
        let route = route.split('?').next().unwrap_or_default();
        route == self.login || route == self.refresh
    }
}

/// Everything needed to talk to the dashboard API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every request path is appended to.
    pub api_url: Url,
    /// Directory for durable client state (remember flag, cookie jar).
    pub state_dir: PathBuf,
    /// Per-request timeout.
    pub timeout: Duration,
    pub endpoints: Endpoints,
}
