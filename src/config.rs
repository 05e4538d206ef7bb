//! Configuration types.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::generation::PollerConfig;

/// Where nutrition targets are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetSource {
    #[default]
    Local,
    Remote,
}

impl FromStr for TargetSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!("expected `local` or `remote`, got `{other}`")),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Backend base URL (profiles, meal plans, macros).
    pub api_url: String,
    /// Web app origin that hosts `/api/complete-registration`.
    pub app_url: String,
    /// Local cache database file.
    pub db_path: PathBuf,
    /// Key isolating this browser context's cache rows.
    pub context_id: String,
    pub user_id: Option<String>,
    pub access_token: Option<SecretString>,
    pub poller: PollerConfig,
    /// Per-request timeout for backend calls. Generation is slow.
    pub http_timeout: Duration,
    pub targets: TargetSource,
    pub bind: SocketAddr,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            app_url: "http://localhost:3000".to_string(),
            db_path: PathBuf::from("./data/nutrigenie.db"),
            context_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            access_token: None,
            poller: PollerConfig::default(),
            http_timeout: Duration::from_secs(120),
            targets: TargetSource::default(),
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

impl AppConfig {
    /// Read `NUTRIGENIE_*` variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = std::env::var("NUTRIGENIE_API_URL").unwrap_or(defaults.api_url);
        let app_url = std::env::var("NUTRIGENIE_APP_URL").unwrap_or(defaults.app_url);
        let db_path = std::env::var("NUTRIGENIE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let context_id = std::env::var("NUTRIGENIE_CONTEXT_ID")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.context_id);

        let user_id = std::env::var("NUTRIGENIE_USER_ID").ok();
        let access_token = std::env::var("NUTRIGENIE_ACCESS_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())
            .map(SecretString::from);
        if access_token.is_some() && user_id.is_none() {
            return Err(ConfigError::MissingEnvVar("NUTRIGENIE_USER_ID".to_string()));
        }

        let interval_ms: u64 = parse_var("NUTRIGENIE_POLL_INTERVAL_MS")?.unwrap_or(1000);
        let timeout_secs: u64 = parse_var("NUTRIGENIE_POLL_TIMEOUT_SECS")?.unwrap_or(180);
        if interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "NUTRIGENIE_POLL_INTERVAL_MS".to_string(),
                message: "must be positive".to_string(),
            });
        }
        let http_timeout_secs: u64 = parse_var("NUTRIGENIE_HTTP_TIMEOUT_SECS")?.unwrap_or(120);

        Ok(Self {
            api_url: trim_slash(api_url),
            app_url: trim_slash(app_url),
            db_path,
            context_id,
            user_id,
            access_token,
            poller: PollerConfig {
                interval: Duration::from_millis(interval_ms),
                timeout: Duration::from_secs(timeout_secs),
            },
            http_timeout: Duration::from_secs(http_timeout_secs),
            targets: parse_var("NUTRIGENIE_TARGETS")?.unwrap_or_default(),
            bind: parse_var("NUTRIGENIE_BIND")?.unwrap_or(defaults.bind),
        })
    }
}

fn parse_var<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                })
        }
        _ => Ok(None),
    }
}

fn trim_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
