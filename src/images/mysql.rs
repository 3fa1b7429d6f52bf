//! MySQL container config

use crate::builder::{require_image_prefix, Builder};
use crate::container::ContainerDescriptor;
use crate::wait::LogWaitStrategy;

const IMAGE_PREFIX: &str = "mysql";
const DEFAULT_IMAGE: &str = "mysql:8";
const MYSQL_PORT: u16 = 3306;

// MySQL initializes its data directory on first boot, which routinely takes
// longer than a minute on cold CI machines.
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 120_000;

/// MySQL server for integration tests.
///
/// The root account gets a random throwaway password; tests connect with the
/// configured user instead. Readiness is probed by watching the server log
/// for the final "ready for connections" line on the real port.
#[derive(Debug, Clone)]
pub struct MySqlContainer {
    image: String,
    user: String,
    password: String,
    database: String,
    fixed_host_port: Option<u16>,
    wait_timeout_ms: u64,
}

impl MySqlContainer {
    pub fn new() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            user: "test".to_string(),
            password: "test".to_string(),
            database: "test".to_string(),
            fixed_host_port: None,
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
        }
    }

    /// Use a different `mysql` image tag.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Bind 3306 to a fixed host port instead of an ephemeral one.
    pub fn with_fixed_port(mut self, host_port: u16) -> Self {
        self.fixed_host_port = Some(host_port);
        self
    }

    pub fn with_wait_timeout(mut self, timeout_ms: u64) -> Self {
        self.wait_timeout_ms = timeout_ms;
        self
    }
}

impl Default for MySqlContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder for MySqlContainer {
    fn build(&self) -> ContainerDescriptor {
        require_image_prefix(&self.image, IMAGE_PREFIX);

        let descriptor = ContainerDescriptor::new(&self.image)
            .with_env("MYSQL_USER", &self.user)
            .with_env("MYSQL_PASSWORD", &self.password)
            .with_env("MYSQL_DATABASE", &self.database)
            .with_env("MYSQL_RANDOM_ROOT_PASSWORD", "yes")
            .with_wait_strategy(
                LogWaitStrategy::new(r"ready for connections.*port: 3306")
                    .with_timeout(self.wait_timeout_ms),
            );

        match self.fixed_host_port {
            Some(host) => descriptor.with_fixed_port(MYSQL_PORT, host),
            None => descriptor.with_exposed_port(MYSQL_PORT),
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
        let descriptor = MySqlContainer::new().build();

        assert_eq!(descriptor.image, "mysql:8");
        assert_eq!(descriptor.environment["MYSQL_USER"], "test");
        assert_eq!(descriptor.environment["MYSQL_PASSWORD"], "test");
        assert_eq!(descriptor.environment["MYSQL_DATABASE"], "test");
        assert_eq!(descriptor.environment["MYSQL_RANDOM_ROOT_PASSWORD"], "yes");
        assert_eq!(descriptor.exposed_ports, vec![PortMapping::Ephemeral(3306)]);
    }

    #[test]
    fn test_readiness_watches_server_log() {
        let descriptor = MySqlContainer::new().build();

        match &descriptor.wait_strategies[0] {
            WaitStrategy::Log(strategy) => {
                assert!(strategy
                    .pattern
                    .is_match("X Plugin ready for connections. port: 3306"));
                assert_eq!(strategy.timeout_ms, 120_000);
            }
            other => panic!("expected log strategy, got {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "invalid image")]
    fn test_non_mysql_image_panics() {
        let _ = MySqlContainer::new().with_image("mariadb:11").build();
    }
}
