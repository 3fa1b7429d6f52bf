//! Redis container config

use crate::builder::{require_image_prefix, Builder};
use crate::container::ContainerDescriptor;
use crate::wait::CommandWaitStrategy;

const IMAGE_PREFIX: &str = "redis";
const DEFAULT_IMAGE: &str = "redis:7.2";
const REDIS_PORT: u16 = 6379;
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 60_000;

/// Redis server for integration tests.
///
/// Readiness is a `redis-cli PING` inside the container.
#[derive(Debug, Clone)]
pub struct RedisContainer {
    image: String,
    fixed_host_port: Option<u16>,
    wait_timeout_ms: u64,
}

impl RedisContainer {
    pub fn new() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            fixed_host_port: None,
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
        }
    }

    /// Use a different `redis` image tag.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Bind 6379 to a fixed host port instead of an ephemeral one.
    pub fn with_fixed_port(mut self, host_port: u16) -> Self {
        self.fixed_host_port = Some(host_port);
        self
    }

    pub fn with_wait_timeout(mut self, timeout_ms: u64) -> Self {
        self.wait_timeout_ms = timeout_ms;
        self
    }
}

impl Default for RedisContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder for RedisContainer {
    fn build(&self) -> ContainerDescriptor {
        require_image_prefix(&self.image, IMAGE_PREFIX);

        let descriptor = ContainerDescriptor::new(&self.image).with_wait_strategy(
            CommandWaitStrategy::new(["redis-cli", "PING"]).with_timeout(self.wait_timeout_ms),
        );

        match self.fixed_host_port {
            Some(host) => descriptor.with_fixed_port(REDIS_PORT, host),
            None => descriptor.with_exposed_port(REDIS_PORT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::PortMapping;
    use crate::wait::WaitStrategy;

    #[test]
    fn test_defaults() {
        let descriptor = RedisContainer::new().build();

        assert_eq!(descriptor.image, "redis:7.2");
        assert_eq!(descriptor.exposed_ports, vec![PortMapping::Ephemeral(6379)]);

        match &descriptor.wait_strategies[0] {
            WaitStrategy::Command(strategy) => {
                assert_eq!(strategy.cmd, vec!["redis-cli", "PING"]);
                assert_eq!(strategy.timeout_ms, 60_000);
            }
            other => panic!("expected command strategy, got {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "invalid image")]
    fn test_non_redis_image_panics() {
        let _ = RedisContainer::new().with_image("valkey/valkey:8").build();
    }
}
