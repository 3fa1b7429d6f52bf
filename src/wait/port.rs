//! TCP readiness probe

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use super::{WaitUntilReady, DEFAULT_INTERVAL_MS, DEFAULT_TIMEOUT_MS};
use crate::docker::DockerApi;
use crate::error::{Error, Result};

/// Probes that the container's mapped host port accepts TCP connections.
#[derive(Debug, Clone)]
pub struct PortWaitStrategy {
    /// Container-side port the service listens on
    pub port: u16,
    pub timeout_ms: u64,
    pub interval_ms: u64,
}

impl PortWaitStrategy {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_interval(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }
}

#[async_trait]
impl WaitUntilReady for PortWaitStrategy {
    async fn wait_until_ready(&self, api: &DockerApi, container_id: &str) -> Result<()> {
        let host = super::probe_host(api).await?;
        let mapped = super::mapped_port_for(api, container_id, self.port, "port").await?;

        let attempts = async {
            loop {
                match TcpStream::connect((host.as_str(), mapped)).await {
                    Ok(_) => return Ok(()),
                    Err(e) => {
                        debug!("tcp probe {}:{} failed: {}", host, mapped, e);
                    }
                }
                tokio::time::sleep(Duration::from_millis(self.interval_ms)).await;
            }
        };

        tokio::time::timeout(Duration::from_millis(self.timeout_ms), attempts)
            .await
            .map_err(|_| Error::WaitTimeout("port"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let strategy = PortWaitStrategy::new(6379);

        assert_eq!(strategy.port, 6379);
        assert_eq!(strategy.timeout_ms, 60_000);
        assert_eq!(strategy.interval_ms, 1000);
    }
}
