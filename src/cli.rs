//! CLI argument parsing, validation, and startup helpers.

use crate::config::{ClientConfig, Endpoints, LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tracing::error;
use url::Url;

const PASSWORD_ENV: &str = "CAMPUS_PASSWORD";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "campus-session",
    about = "Session client for the language-center dashboard API"
)]
pub struct Args {
    /// Base URL of the dashboard API
    #[arg(long, env = "CAMPUS_API_URL", default_value = "http://localhost:8080/api")]
    pub api_url: String,

    /// Directory holding the remember flag and the cookie jar
    #[arg(long, env = "CAMPUS_STATE_DIR", default_value = ".campus-session")]
    pub state_dir: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "15")]
    pub timeout_secs: u64,

    #[arg(long, default_value = LOGIN_PATH, value_parser = validate_endpoint_path)]
    pub login_path: String,

    #[arg(long, default_value = REFRESH_PATH, value_parser = validate_endpoint_path)]
    pub refresh_path: String,

    #[arg(long, default_value = LOGOUT_PATH, value_parser = validate_endpoint_path)]
    pub logout_path: String,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in. The password is read from CAMPUS_PASSWORD or stdin
    Login {
        username: String,
        /// Restore the session on the next start
        #[arg(long)]
        remember: bool,
    },
    /// Log out and forget the remembered session
    Logout,
    /// Print the current session
    Status,
    /// GET an API path and print the response data
    Get { path: String },
}

fn validate_endpoint_path(s: &str) -> Result<String, String> {
    if !s.starts_with('/') {
        return Err(format!("Endpoint path must start with '/': {}", s));
    }

    if s.contains('?') {
        return Err(format!("Endpoint path must not contain a query: {}", s));
    }

    if s.chars().any(|c| !c.is_ascii() || c.is_whitespace()) {
        return Err(format!("Endpoint path contains invalid characters: {}", s));
    }

    Ok(s.to_string())
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Parse and validate the API base URL.
/// Returns None and logs an error if validation fails.
pub fn validate_api_url(api_url: &str) -> Option<Url> {
    let url = match Url::parse(api_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %api_url, error = %e, "Invalid API URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_local = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));

    if !is_https && !(url.scheme() == "http" && is_local) {
        // The refresh cookie must not travel in the clear.
        error!("API URL must use HTTPS for non-localhost servers");
        return None;
    }

    Some(url)
}

/// Load the login password from the environment or the first line of stdin.
/// Returns None and logs an error if no password is available.
///
/// Must run before the async runtime is built: the variable is removed once read.
pub fn load_password() -> Option<String> {
    let password = if let Ok(password) = std::env::var(PASSWORD_ENV) {
        // Clear the environment variable to prevent leaking
        // SAFETY: Called from `main` before the async runtime or any other
        // thread exists, and nothing else reads this variable.
        unsafe { std::env::remove_var(PASSWORD_ENV) };
        password
    } else {
        let mut line = String::new();
        if let Err(e) = std::io::stdin().lock().read_line(&mut line) {
            error!(error = %e, "Failed to read password from stdin");
            return None;
        }
        line.trim_end_matches(['\r', '\n']).to_string()
    };

    if password.is_empty() {
        error!("Password is required. Set CAMPUS_PASSWORD or pipe it on stdin");
        return None;
    }

    Some(password)
}

/// Build ClientConfig from validated arguments.
pub fn build_config(args: &Args, api_url: Url) -> ClientConfig {
    ClientConfig {
        api_url,
        state_dir: args.state_dir.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
        endpoints: Endpoints {
            login: args.login_path.clone(),
            refresh: args.refresh_path.clone(),
            logout: args.logout_path.clone(),
        },
    }
}
