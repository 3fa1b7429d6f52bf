//! HTTP readiness probe

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{WaitUntilReady, DEFAULT_INTERVAL_MS, DEFAULT_TIMEOUT_MS};
use crate::docker::DockerApi;
use crate::error::{Error, Result};

/// Issues GET requests against a mapped port until the expected status
/// comes back.
#[derive(Debug, Clone)]
pub struct HttpWaitStrategy {
    /// Container-side port the service listens on
    pub port: u16,
    pub path: String,
    pub expected_status: u16,
    pub timeout_ms: u64,
    pub interval_ms: u64,
}

impl HttpWaitStrategy {
    pub fn new(port: u16, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };

        Self {
            port,
            path,
            expected_status: 200,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }

    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_interval(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    fn probe_url(&self, host: &str, mapped_port: u16) -> String {
        format!("http://{}:{}{}", host, mapped_port, self.path)
    }
}

#[async_trait]
impl WaitUntilReady for HttpWaitStrategy {
    async fn wait_until_ready(&self, api: &DockerApi, container_id: &str) -> Result<()> {
        let host = super::probe_host(api).await?;
        let mapped = super::mapped_port_for(api, container_id, self.port, "http").await?;
        let url = self.probe_url(&host, mapped);

        let client = reqwest::Client::new();
        let attempts = async {
            loop {
                match client.get(&url).send().await {
                    Ok(response) if response.status().as_u16() == self.expected_status => {
                        return Ok(())
                    }
                    Ok(response) => {
                        debug!("http probe {} returned {}", url, response.status());
                    }
                    Err(e) => {
                        debug!("http probe {} failed: {}", url, e);
                    }
                }
                tokio::time::sleep(Duration::from_millis(self.interval_ms)).await;
            }
        };

        tokio::time::timeout(Duration::from_millis(self.timeout_ms), attempts)
            .await
            .map_err(|_| Error::WaitTimeout("http"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let strategy = HttpWaitStrategy::new(8080, "/health");

        assert_eq!(strategy.expected_status, 200);
        assert_eq!(strategy.timeout_ms, 60_000);
        assert_eq!(strategy.interval_ms, 1000);
    }

    #[test]
    fn test_probe_url_normalizes_path() {
        let with_slash = HttpWaitStrategy::new(8080, "/health");
        let without_slash = HttpWaitStrategy::new(8080, "health");

        assert_eq!(
            with_slash.probe_url("localhost", 49153),
            "http://localhost:49153/health"
        );
        assert_eq!(
            without_slash.probe_url("localhost", 49153),
            "http://localhost:49153/health"
        );
    }
}
