//! Postgres container config

use crate::builder::{require_image_prefix, Builder};
use crate::container::ContainerDescriptor;
use crate::wait::CommandWaitStrategy;

const IMAGE_PREFIX: &str = "postgres";
const DEFAULT_IMAGE: &str = "postgres:16-alpine";
const POSTGRES_PORT: u16 = 5432;
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 60_000;

/// Postgres server for integration tests.
///
/// Exposes 5432 on an ephemeral host port unless a fixed one is requested;
/// readiness is probed with `pg_isready` inside the container.
#[derive(Debug, Clone)]
pub struct PostgresContainer {
    image: String,
    user: String,
    password: String,
    database: String,
    fixed_host_port: Option<u16>,
    wait_timeout_ms: u64,
}

impl PostgresContainer {
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

    /// Use a different `postgres` image tag.
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

    /// Bind 5432 to a fixed host port instead of an ephemeral one.
    pub fn with_fixed_port(mut self, host_port: u16) -> Self {
        self.fixed_host_port = Some(host_port);
        self
    }

    pub fn with_wait_timeout(mut self, timeout_ms: u64) -> Self {
        self.wait_timeout_ms = timeout_ms;
        self
    }
}

impl Default for PostgresContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder for PostgresContainer {
    fn build(&self) -> ContainerDescriptor {
        require_image_prefix(&self.image, IMAGE_PREFIX);

        let descriptor = ContainerDescriptor::new(&self.image)
            .with_env("POSTGRES_USER", &self.user)
            .with_env("POSTGRES_PASSWORD", &self.password)
            .with_env("POSTGRES_DB", &self.database)
            .with_wait_strategy(
                CommandWaitStrategy::new([
                    "pg_isready",
                    "-U",
                    self.user.as_str(),
                    "-d",
                    self.database.as_str(),
                    "-h",
                    "localhost",
                ])
                .with_timeout(self.wait_timeout_ms),
            );

        match self.fixed_host_port {
            Some(host) => descriptor.with_fixed_port(POSTGRES_PORT, host),
            None => descriptor.with_exposed_port(POSTGRES_PORT),
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
        let descriptor = PostgresContainer::new().build();

        assert_eq!(descriptor.image, "postgres:16-alpine");
        assert_eq!(descriptor.environment["POSTGRES_USER"], "test");
        assert_eq!(descriptor.environment["POSTGRES_PASSWORD"], "test");
        assert_eq!(descriptor.environment["POSTGRES_DB"], "test");
        assert_eq!(descriptor.exposed_ports, vec![PortMapping::Ephemeral(5432)]);
    }

    #[test]
    fn test_fixed_port_binds_canonical_container_port() {
        let descriptor = PostgresContainer::new().with_fixed_port(5433).build();

        assert_eq!(
            descriptor.exposed_ports,
            vec![PortMapping::Fixed {
                container: 5432,
                host: 5433
            }]
        );
    }

    #[test]
    fn test_readiness_uses_pg_isready() {
        let descriptor = PostgresContainer::new().with_user("app").build();

        assert_eq!(descriptor.wait_strategies.len(), 1);
        match &descriptor.wait_strategies[0] {
            WaitStrategy::Command(strategy) => {
                assert_eq!(strategy.cmd[0], "pg_isready");
                assert!(strategy.cmd.contains(&"app".to_string()));
            }
            other => panic!("expected command strategy, got {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "invalid image")]
    fn test_non_postgres_image_panics() {
        let _ = PostgresContainer::new().with_image("mysql:8").build();
    }
}
