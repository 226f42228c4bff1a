//! Prometheus metrics for API traffic.

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use std::sync::Arc;

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct StatusLabel(pub String);

impl StatusLabel {
    /// Collapse a status code into its class (`2xx`, `4xx`, ...).
    pub fn from_status(status: u16) -> Self {
        StatusLabel(format!("{}xx", status / 100))
    }
}

impl prometheus_client::encoding::EncodeLabelSet for StatusLabel {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("status", self.0.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct ApiMetrics {
    pub requests: Family<StatusLabel, Counter>,
    pub rate_limited: Counter,
    pub pages_fetched: Counter,
    pub registry: Arc<Registry>,
}

impl ApiMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let requests = Family::<StatusLabel, Counter>::default();
        registry.register(
            "spcloud_api_requests",
            "API requests by response status class",
            requests.clone(),
        );

        let rate_limited = Counter::default();
        registry.register(
            "spcloud_api_rate_limited",
            "Responses rejected with HTTP 429",
            rate_limited.clone(),
        );

        let pages_fetched = Counter::default();
        registry.register(
            "spcloud_api_pages_fetched",
            "List pages decoded successfully",
            pages_fetched.clone(),
        );

        Self {
            requests,
            rate_limited,
            pages_fetched,
            registry: Arc::new(registry),
        }
    }

    pub fn record_status(&self, status: u16) {
        self.requests.get_or_create(&StatusLabel::from_status(status)).inc();
        if status == 429 {
            self.rate_limited.inc();
        }
    }

    /// Render the registry in Prometheus text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}
