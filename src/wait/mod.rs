//! Readiness probes applied after container start
//!
//! Every strategy polls until its condition holds, bounded by its own
//! wall-clock budget. The pipeline runs strategies in declaration order and
//! short-circuits on the first failure; the container is then left behind
//! for the reaper.

mod command;
mod http;
mod log;
mod port;

pub use command::CommandWaitStrategy;
pub use http::HttpWaitStrategy;
pub use log::LogWaitStrategy;
pub use port::PortWaitStrategy;

use async_trait::async_trait;
use tracing::debug;

use crate::docker::DockerApi;
use crate::error::{Error, Result};

/// Default pause between probe attempts, in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Default overall probe budget, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Readiness contract shared by all strategy variants.
#[async_trait]
pub trait WaitUntilReady {
    /// Block until the condition holds, or fail with `WaitTimeout` once the
    /// strategy's own budget elapses. Transport errors propagate as-is.
    async fn wait_until_ready(&self, api: &DockerApi, container_id: &str) -> Result<()>;
}

/// A readiness probe applied after container start
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    Command(CommandWaitStrategy),
    Log(LogWaitStrategy),
    Http(HttpWaitStrategy),
    Port(PortWaitStrategy),
}

impl WaitStrategy {
    /// Strategy name used in error values and logs
    pub fn name(&self) -> &'static str {
        match self {
            WaitStrategy::Command(_) => "command",
            WaitStrategy::Log(_) => "log",
            WaitStrategy::Http(_) => "http",
            WaitStrategy::Port(_) => "port",
        }
    }
}

#[async_trait]
impl WaitUntilReady for WaitStrategy {
    async fn wait_until_ready(&self, api: &DockerApi, container_id: &str) -> Result<()> {
        match self {
            WaitStrategy::Command(strategy) => strategy.wait_until_ready(api, container_id).await,
            WaitStrategy::Log(strategy) => strategy.wait_until_ready(api, container_id).await,
            WaitStrategy::Http(strategy) => strategy.wait_until_ready(api, container_id).await,
            WaitStrategy::Port(strategy) => strategy.wait_until_ready(api, container_id).await,
        }
    }
}

impl From<CommandWaitStrategy> for WaitStrategy {
    fn from(strategy: CommandWaitStrategy) -> Self {
        WaitStrategy::Command(strategy)
    }
}

impl From<LogWaitStrategy> for WaitStrategy {
    fn from(strategy: LogWaitStrategy) -> Self {
        WaitStrategy::Log(strategy)
    }
}

impl From<HttpWaitStrategy> for WaitStrategy {
    fn from(strategy: HttpWaitStrategy) -> Self {
        WaitStrategy::Http(strategy)
    }
}

impl From<PortWaitStrategy> for WaitStrategy {
    fn from(strategy: PortWaitStrategy) -> Self {
        WaitStrategy::Port(strategy)
    }
}

/// Apply strategies in declaration order; the first failure aborts the rest.
pub(crate) async fn run_pipeline(
    api: &DockerApi,
    container_id: &str,
    strategies: &[WaitStrategy],
) -> Result<()> {
    for strategy in strategies {
        debug!(
            "running {} wait strategy for container {}",
            strategy.name(),
            container_id
        );
        strategy.wait_until_ready(api, container_id).await?;
    }

    Ok(())
}

/// Host the port and http probes dial.
///
/// Inside a container the daemon's published ports are not reachable via
/// localhost, so the bridge gateway is used instead.
pub(crate) async fn probe_host(api: &DockerApi) -> Result<String> {
    if tokio::fs::metadata("/.dockerenv").await.is_ok() {
        api.get_bridge_gateway().await
    } else {
        Ok("localhost".to_string())
    }
}

/// Mapped host port for a probe, or `WaitFailed` naming the strategy.
pub(crate) async fn mapped_port_for(
    api: &DockerApi,
    container_id: &str,
    container_port: u16,
    strategy: &'static str,
) -> Result<u16> {
    let handle = api.get_container(container_id).await?;

    handle
        .mapped_port(container_port)
        .ok_or_else(|| Error::WaitFailed {
            strategy,
            detail: format!("container port {} is not mapped to a host port", container_port),
        })
}
