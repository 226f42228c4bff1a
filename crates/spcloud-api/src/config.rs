//! Connection configuration: token and host, with environment fallback.

use serde::Deserialize;
use url::Url;

use crate::error::ApiError;

pub const TOKEN_ENV: &str = "STEAMPIPE_CLOUD_TOKEN";
pub const HOST_ENV: &str = "STEAMPIPE_CLOUD_HOST";

/// Production host. Any configured host containing it keeps the default server.
pub const DEFAULT_HOST: &str = "cloud.steampipe.io";
pub const DEFAULT_BASE_URL: &str = "https://cloud.steampipe.io/api/v0";

/// Connection settings as supplied by the host's configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
}

/// Fully resolved connection: a usable token and the API base URL.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConnection {
    pub token: String,
    pub base_url: String,
}

impl std::fmt::Debug for ResolvedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConnection")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// A configured value, even an empty one, replaces the environment variable.
fn configured_or_env(configured: &Option<String>, var: &str) -> String {
    match configured {
        Some(value) => value.clone(),
        None => std::env::var(var).unwrap_or_default(),
    }
}

fn missing_host() -> ApiError {
    ApiError::Configuration("missing protocol or host".to_string())
}

impl ConnectionConfig {
    /// Build a config purely from `STEAMPIPE_CLOUD_TOKEN` / `STEAMPIPE_CLOUD_HOST`.
    pub fn from_env() -> Self {
        Self {
            token: std::env::var(TOKEN_ENV).ok(),
            host: std::env::var(HOST_ENV).ok(),
        }
    }

    /// Resolve the token and base URL. Config values win over the environment.
    /// No network I/O happens here.
    pub fn resolve(&self) -> Result<ResolvedConnection, ApiError> {
        let token = configured_or_env(&self.token, TOKEN_ENV);
        if token.trim().is_empty() {
            return Err(ApiError::Configuration(format!(
                "'token' must be set in the connection configuration or via {}",
                TOKEN_ENV
            )));
        }

        let host = configured_or_env(&self.host, HOST_ENV);
        let base_url = match host.trim() {
            "" => DEFAULT_BASE_URL.to_string(),
            host => rewrite_base_url(host)?,
        };

        Ok(ResolvedConnection { token, base_url })
    }
}

/// Rewrite the default server URL so it points at `host`, keeping the default
/// scheme and API path.
pub fn rewrite_base_url(host: &str) -> Result<String, ApiError> {
    if host.contains(DEFAULT_HOST) {
        return Ok(DEFAULT_BASE_URL.to_string());
    }

    // `localhost:8080` parses with `localhost` as its scheme and no host.
    let parsed = Url::parse(host).map_err(|e| match e {
        url::ParseError::RelativeUrlWithoutBase | url::ParseError::EmptyHost => missing_host(),
        other => ApiError::Configuration(format!("invalid host: {}", other)),
    })?;
    let host_name = parsed.host_str().filter(|h| !h.is_empty()).ok_or_else(missing_host)?;

    let default = Url::parse(DEFAULT_BASE_URL)
        .map_err(|e| ApiError::Configuration(format!("invalid default server url: {}", e)))?;
    let authority = match parsed.port() {
        Some(port) => format!("{}:{}", host_name, port),
        None => host_name.to_string(),
    };

    Ok(format!("{}://{}{}", default.scheme(), authority, default.path()))
}
