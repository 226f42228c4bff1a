//! HTTP client for the Steampipe Cloud REST API.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::error::ApiError;
use crate::metrics::ApiMetrics;
use crate::models::{ListParams, Page};
use crate::paths::ApiPath;

/// Authenticated API client. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    metrics: ApiMetrics,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Resolve `config` and build a client. Performs no network I/O.
pub fn connect(config: &ConnectionConfig) -> Result<ApiClient, ApiError> {
    let resolved = config.resolve()?;
    let client = ApiClient::new(&resolved.token, resolved.base_url)?;
    info!("Configured Steampipe Cloud client for {}", client.base_url());
    Ok(client)
}

impl ApiClient {
    pub fn new(token: &str, base_url: impl Into<String>) -> Result<Self, ApiError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            ApiError::Configuration("token contains characters not allowed in a header".to_string())
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("spcloud/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Connection(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            metrics: ApiMetrics::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn metrics(&self) -> &ApiMetrics {
        &self.metrics
    }

    pub fn url(&self, path: &ApiPath) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Fetch a single resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &ApiPath) -> Result<T, ApiError> {
        debug!("GET {}", path);
        let request = self.http.get(self.url(path));
        self.send(request, path).await
    }

    /// Fetch one page of a list endpoint.
    pub async fn list<T: DeserializeOwned>(
        &self,
        path: &ApiPath,
        params: &ListParams,
    ) -> Result<Page<T>, ApiError> {
        debug!("LIST {} {:?}", path, params);
        let request = self.http.get(self.url(path)).query(&params.query_pairs());
        let page = self.send(request, path).await?;
        self.metrics.pages_fetched.inc();
        Ok(page)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        path: &ApiPath,
    ) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        self.metrics.record_status(status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_string()
            } else {
                body.trim().to_string()
            };
            return Err(match status.as_u16() {
                404 => ApiError::NotFound(path.to_string()),
                429 => ApiError::RateLimited {
                    attempts: 1,
                    message,
                },
                code => ApiError::Status {
                    status: code,
                    message,
                },
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(format!("{}: {}", path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = ApiClient::new("spt_abc", "http://localhost:9000/api/v0/").unwrap();
        assert_eq!(
            client.url(&ApiPath::actor()),
            "http://localhost:9000/api/v0/actor"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let client = ApiClient::new("spt_secret", "http://localhost").unwrap();
        assert!(!format!("{:?}", client).contains("spt_secret"));
    }

    #[test]
    fn test_invalid_token_is_configuration_error() {
        let err = ApiClient::new("bad\ntoken", "http://localhost").unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
    }
}
