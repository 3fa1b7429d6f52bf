//! Exec-based readiness probe

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use super::{WaitUntilReady, DEFAULT_INTERVAL_MS, DEFAULT_TIMEOUT_MS};
use crate::docker::DockerApi;
use crate::error::{Error, Result};

/// Delay between exec status polls within one probe round.
const EXEC_POLL_MS: u64 = 100;

/// Runs a command inside the container until it exits with status 0.
#[derive(Debug, Clone)]
pub struct CommandWaitStrategy {
    pub cmd: Vec<String>,
    pub timeout_ms: u64,
    pub interval_ms: u64,
}

impl CommandWaitStrategy {
    pub fn new(cmd: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
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

    /// One probe round: create and start an exec, poll it to completion.
    async fn probe(&self, api: &DockerApi, container_id: &str) -> Result<bool> {
        let exec_id = api.create_exec(container_id, self.cmd.clone()).await?;
        api.start_exec(&exec_id).await?;

        loop {
            let status = api.inspect_exec(&exec_id).await?;
            if !status.running {
                trace!("command probe exited with {:?}", status.exit_code);
                return Ok(status.exit_code == Some(0));
            }
            tokio::time::sleep(Duration::from_millis(EXEC_POLL_MS)).await;
        }
    }
}

#[async_trait]
impl WaitUntilReady for CommandWaitStrategy {
    async fn wait_until_ready(&self, api: &DockerApi, container_id: &str) -> Result<()> {
        let attempts = async {
            loop {
                match self.probe(api, container_id).await {
                    Ok(true) => return Ok(()),
                    Ok(false) => {
                        debug!(
                            "command {:?} not ready in container {}",
                            self.cmd, container_id
                        );
                    }
                    Err(e) => return Err(e),
                }
                tokio::time::sleep(Duration::from_millis(self.interval_ms)).await;
            }
        };

        tokio::time::timeout(Duration::from_millis(self.timeout_ms), attempts)
            .await
            .map_err(|_| Error::WaitTimeout("command"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let strategy = CommandWaitStrategy::new(["redis-cli", "PING"]);

        assert_eq!(strategy.cmd, vec!["redis-cli", "PING"]);
        assert_eq!(strategy.timeout_ms, 60_000);
        assert_eq!(strategy.interval_ms, 1000);
    }

    #[test]
    fn test_builder_overrides() {
        let strategy = CommandWaitStrategy::new(["false"])
            .with_timeout(2000)
            .with_interval(250);

        assert_eq!(strategy.timeout_ms, 2000);
        assert_eq!(strategy.interval_ms, 250);
    }
}
