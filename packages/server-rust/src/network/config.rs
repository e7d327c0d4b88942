//! Network configuration types for the HTTP binding.

use std::time::Duration;

/// Configuration of the HTTP binding.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
    /// Mount point of the `service` alias endpoint, `{prefix}/{module}/{name}`.
    pub service_prefix: String,
    /// Policy extractors run for every call arriving over HTTP, in order.
    pub policy_extractors: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            service_prefix: "/services".to_string(),
            policy_extractors: Vec::new(),
        }
    }
}

impl NetworkConfig {
    /// Route of the `service` alias endpoint in axum syntax.
    #[must_use]
    pub fn service_route(&self) -> String {
        format!(
            "{}/{{module}}/{{name}}",
            self.service_prefix.trim_end_matches('/')
        )
    }
}
