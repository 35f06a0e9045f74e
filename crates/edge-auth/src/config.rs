//! Edge gate configuration.
//!
//! Configuration is loaded from environment variables. Invalid values fail
//! start-up rather than falling back to defaults.

use crate::tasks::key_set_refresh::MIN_REFRESH_INTERVAL;
use reqwest::Url;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default region used to build the issuer.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default name of the credential cookie.
pub const DEFAULT_COOKIE_NAME: &str = "edge-auth-token";

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default directory served behind the gate.
pub const DEFAULT_CONTENT_DIR: &str = "./public";

/// Default exp/nbf leeway in seconds.
pub const DEFAULT_CLOCK_SKEW_SECONDS: u64 = 60;

/// Maximum exp/nbf leeway in seconds.
pub const MAX_CLOCK_SKEW_SECONDS: u64 = 600;

/// Default bounded wait for a populating key set, in milliseconds.
pub const DEFAULT_READY_TIMEOUT_MS: u64 = 500;

/// Default JWKS fetch timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

const MIN_REFRESH_SECONDS: u64 = MIN_REFRESH_INTERVAL.as_secs();
const MAX_REFRESH_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Hosted login page parameters. Present only when all three are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginConfig {
    pub client_id: String,
    pub callback_url: String,
    pub pool_domain: String,
}

/// Edge gate configuration.
#[derive(Clone)]
pub struct Config {
    /// User-pool identifier, e.g. `us-east-1_AbCdEf123`.
    pub user_pool_id: String,

    /// Region used in the issuer (default: "us-east-1").
    pub region: String,

    /// JWKS endpoint (default: `{issuer}/.well-known/jwks.json`).
    pub jwks_url: String,

    /// Inline JWKS document. Overrides `jwks_url` when set.
    pub jwks_json: Option<String>,

    /// Name of the cookie carrying the access token.
    pub cookie_name: String,

    /// Login redirect settings.
    pub login: Option<LoginConfig>,

    pub bind_address: String,

    pub content_dir: PathBuf,

    /// exp/nbf leeway in seconds (0..=600).
    pub jwt_clock_skew_seconds: u64,

    /// How long a request waits for a populating key set.
    pub key_set_ready_timeout: Duration,

    /// Scheduled refresh interval. No scheduled refresh when `None`.
    pub key_set_refresh_interval: Option<Duration>,

    pub jwks_fetch_timeout: Duration,

    pub log_format: LogFormat,
}

/// Inline JWKS documents are shown by size only.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("user_pool_id", &self.user_pool_id)
            .field("region", &self.region)
            .field("jwks_url", &self.jwks_url)
            .field(
                "jwks_json",
                &self.jwks_json.as_ref().map(|doc| format!("<{} bytes>", doc.len())),
            )
            .field("cookie_name", &self.cookie_name)
            .field("login", &self.login)
            .field("bind_address", &self.bind_address)
            .field("content_dir", &self.content_dir)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("key_set_ready_timeout", &self.key_set_ready_timeout)
            .field("key_set_refresh_interval", &self.key_set_refresh_interval)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .field("log_format", &self.log_format)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid key set ready timeout configuration: {0}")]
    InvalidReadyTimeout(String),

    #[error("Invalid key set refresh configuration: {0}")]
    InvalidRefreshInterval(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidFetchTimeout(String),

    #[error("Invalid log format: {0}")]
    InvalidLogFormat(String),

    #[error("Incomplete login redirect configuration: {0}")]
    IncompleteLogin(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let user_pool_id = vars
            .get("USER_POOL_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("USER_POOL_ID".to_string()))?
            .trim()
            .to_string();

        let region = vars
            .get("AWS_REGION")
            .cloned()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let issuer = issuer_for(&region, &user_pool_id);

        let jwks_url = match vars.get("JWKS_URL") {
            Some(url) => {
                let parsed = Url::parse(url)
                    .map_err(|e| ConfigError::InvalidUrl(format!("JWKS_URL '{url}': {e}")))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ConfigError::InvalidUrl(format!(
                        "JWKS_URL must use http or https, got '{}'",
                        parsed.scheme()
                    )));
                }
                url.clone()
            }
            None => format!("{issuer}/.well-known/jwks.json"),
        };

        let jwks_json = vars.get("JWKS_JSON").filter(|v| !v.trim().is_empty()).cloned();

        let cookie_name = vars
            .get("AUTH_COOKIE_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string());

        let login = parse_login(vars)?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let content_dir = PathBuf::from(
            vars.get("CONTENT_DIR")
                .map_or(DEFAULT_CONTENT_DIR, String::as_str),
        );

        let jwt_clock_skew_seconds = parse_ranged(
            vars,
            "JWT_CLOCK_SKEW_SECONDS",
            DEFAULT_CLOCK_SKEW_SECONDS,
            0..=MAX_CLOCK_SKEW_SECONDS,
            ConfigError::InvalidJwtClockSkew,
        )?;

        let ready_timeout_ms = parse_ranged(
            vars,
            "KEY_SET_READY_TIMEOUT_MS",
            DEFAULT_READY_TIMEOUT_MS,
            1..=30_000,
            ConfigError::InvalidReadyTimeout,
        )?;

        let key_set_refresh_interval = if vars.contains_key("KEY_SET_REFRESH_SECONDS") {
            Some(Duration::from_secs(parse_ranged(
                vars,
                "KEY_SET_REFRESH_SECONDS",
                MIN_REFRESH_SECONDS,
                MIN_REFRESH_SECONDS..=MAX_REFRESH_SECONDS,
                ConfigError::InvalidRefreshInterval,
            )?))
        } else {
            None
        };

        let fetch_timeout_seconds = parse_ranged(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_FETCH_TIMEOUT_SECONDS,
            1..=120,
            ConfigError::InvalidFetchTimeout,
        )?;

        let log_format = match vars.get("LOG_FORMAT").map(|v| v.to_ascii_lowercase()) {
            None => LogFormat::Text,
            Some(v) if v == "text" => LogFormat::Text,
            Some(v) if v == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidLogFormat(format!(
                    "LOG_FORMAT must be 'text' or 'json', got '{other}'"
                )))
            }
        };

        Ok(Config {
            user_pool_id,
            region,
            jwks_url,
            jwks_json,
            cookie_name,
            login,
            bind_address,
            content_dir,
            jwt_clock_skew_seconds,
            key_set_ready_timeout: Duration::from_millis(ready_timeout_ms),
            key_set_refresh_interval,
            jwks_fetch_timeout: Duration::from_secs(fetch_timeout_seconds),
            log_format,
        })
    }

    /// The expected `iss` claim.
    #[must_use]
    pub fn issuer(&self) -> String {
        issuer_for(&self.region, &self.user_pool_id)
    }

    /// Hosted login URL for the redirect challenge, if configured.
    #[must_use]
    pub fn login_url(&self) -> Option<String> {
        let login = self.login.as_ref()?;
        build_login_url(login).ok()
    }
}

fn issuer_for(region: &str, user_pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}")
}

fn parse_login(vars: &HashMap<String, String>) -> Result<Option<LoginConfig>, ConfigError> {
    const NAMES: [&str; 3] = ["CLIENT_ID", "CALLBACK_URL", "POOL_DOMAIN"];

    let present: Vec<&str> = NAMES
        .into_iter()
        .filter(|name| vars.get(*name).is_some_and(|v| !v.is_empty()))
        .collect();

    if present.is_empty() {
        return Ok(None);
    }
    if present.len() != NAMES.len() {
        let missing: Vec<&str> = NAMES
            .into_iter()
            .filter(|name| !present.contains(name))
            .collect();
        return Err(ConfigError::IncompleteLogin(format!(
            "CLIENT_ID, CALLBACK_URL and POOL_DOMAIN must be set together, missing {}",
            missing.join(", ")
        )));
    }

    let get = |name: &str| vars.get(name).cloned().unwrap_or_default();
    let login = LoginConfig {
        client_id: get("CLIENT_ID"),
        callback_url: get("CALLBACK_URL"),
        pool_domain: get("POOL_DOMAIN"),
    };

    // Surface a bad domain at start-up rather than on the first rejection
    build_login_url(&login)?;
    Ok(Some(login))
}

fn build_login_url(login: &LoginConfig) -> Result<String, ConfigError> {
    let domain = login.pool_domain.trim_end_matches('/');
    let base = if domain.starts_with("https://") || domain.starts_with("http://") {
        format!("{domain}/login")
    } else {
        format!("https://{domain}/login")
    };

    Url::parse_with_params(
        &base,
        &[
            ("response_type", "token"),
            ("client_id", login.client_id.as_str()),
            ("redirect_uri", login.callback_url.as_str()),
        ],
    )
    .map(String::from)
    .map_err(|e| ConfigError::InvalidUrl(format!("POOL_DOMAIN '{}': {e}", login.pool_domain)))
}

fn parse_ranged(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    range: RangeInclusive<u64>,
    err: fn(String) -> ConfigError,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.trim().parse().map_err(|e| {
        err(format!(
            "{name} must be a valid non-negative integer, got '{value_str}': {e}"
        ))
    })?;

    if !range.contains(&value) {
        return Err(err(format!(
            "{name} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )));
    }

    Ok(value)
}
