//! Log-matching readiness probe

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::{WaitUntilReady, DEFAULT_INTERVAL_MS, DEFAULT_TIMEOUT_MS};
use crate::docker::DockerApi;
use crate::error::{Error, Result};

/// Matches a regex against the container's combined stdout and stderr.
#[derive(Debug, Clone)]
pub struct LogWaitStrategy {
    pub pattern: Regex,
    pub timeout_ms: u64,
    pub interval_ms: u64,
}

impl LogWaitStrategy {
    /// # Panics
    /// Panics if `pattern` is not a valid regular expression.
    pub fn new(pattern: &str) -> Self {
        let pattern = Regex::new(pattern)
            .unwrap_or_else(|e| panic!("invalid log wait pattern '{}': {}", pattern, e));

        Self {
            pattern,
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

    fn matches(&self, logs: &[u8]) -> bool {
        self.pattern.is_match(&String::from_utf8_lossy(logs))
    }
}

#[async_trait]
impl WaitUntilReady for LogWaitStrategy {
    async fn wait_until_ready(&self, api: &DockerApi, container_id: &str) -> Result<()> {
        let attempts = async {
            loop {
                let logs = api.stdout_logs(container_id).await?;
                if self.matches(&logs) {
                    return Ok(());
                }

                debug!(
                    "log pattern '{}' not yet seen in container {}",
                    self.pattern, container_id
                );
                tokio::time::sleep(Duration::from_millis(self.interval_ms)).await;
            }
        };

        tokio::time::timeout(Duration::from_millis(self.timeout_ms), attempts)
            .await
            .map_err(|_| Error::WaitTimeout("log"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_across_lines() {
        let strategy = LogWaitStrategy::new(r"ready for connections.*port: 3306");

        let logs = b"2024-01-01T00:00:00Z [Server] starting\n\
            2024-01-01T00:00:05Z [Server] /usr/sbin/mysqld: ready for connections. port: 3306\n";
        assert!(strategy.matches(logs));
        assert!(!strategy.matches(b"still initializing"));
    }

    #[test]
    fn test_matches_tolerates_invalid_utf8() {
        let strategy = LogWaitStrategy::new("ready");

        let mut logs = vec![0xff, 0xfe];
        logs.extend_from_slice(b"ready\n");
        assert!(strategy.matches(&logs));
    }

    #[test]
    #[should_panic(expected = "invalid log wait pattern")]
    fn test_invalid_pattern_panics() {
        let _ = LogWaitStrategy::new("(unclosed");
    }
}
