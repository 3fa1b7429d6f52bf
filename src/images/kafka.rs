//! Kafka container config

use crate::builder::{require_image_prefix, Builder};
use crate::container::ContainerDescriptor;
use crate::wait::CommandWaitStrategy;

const IMAGE_PREFIX: &str = "confluentinc/cp-kafka";
const DEFAULT_IMAGE: &str = "confluentinc/cp-kafka:7.4.3";

/// Listener clients on the host connect to.
const CLIENT_PORT: u16 = 9092;
/// Listener brokers and in-container tooling use.
const BROKER_PORT: u16 = 29092;
const ZOOKEEPER_PORT: u16 = 2181;

// A broker needs time to elect itself and settle group coordination.
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 120_000;

/// Single-node Kafka broker with an embedded ZooKeeper for integration tests.
///
/// Advertised listeners must name a port clients can actually reach, and the
/// advertisement happens before any client connects, so the client port is
/// bound to a fixed host port rather than an ephemeral one. The internal
/// `BROKER` listener on 29092 stays inside the container and serves both
/// replication and the readiness probes.
#[derive(Debug, Clone)]
pub struct KafkaContainer {
    image: String,
    client_host_port: u16,
    wait_timeout_ms: u64,
}

impl KafkaContainer {
    pub fn new() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            client_host_port: CLIENT_PORT,
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
        }
    }

    /// Use a different `confluentinc/cp-kafka` image tag.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Bind the client listener to a different fixed host port.
    pub fn with_fixed_port(mut self, host_port: u16) -> Self {
        self.client_host_port = host_port;
        self
    }

    pub fn with_wait_timeout(mut self, timeout_ms: u64) -> Self {
        self.wait_timeout_ms = timeout_ms;
        self
    }

    /// Shell line that brings up the embedded ZooKeeper and then hands the
    /// process over to the stock Confluent entrypoint.
    fn startup_command(&self) -> String {
        format!(
            "echo 'clientPort={port}' > /tmp/zookeeper.properties \
             && echo 'dataDir=/var/lib/zookeeper/data' >> /tmp/zookeeper.properties \
             && echo 'dataLogDir=/var/lib/zookeeper/log' >> /tmp/zookeeper.properties \
             && zookeeper-server-start /tmp/zookeeper.properties \
             & exec /etc/confluent/docker/run",
            port = ZOOKEEPER_PORT
        )
    }
}

impl Default for KafkaContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder for KafkaContainer {
    fn build(&self) -> ContainerDescriptor {
        require_image_prefix(&self.image, IMAGE_PREFIX);

        let listeners = format!(
            "BROKER://0.0.0.0:{},OUTSIDE://0.0.0.0:{}",
            BROKER_PORT, CLIENT_PORT
        );
        let advertised = format!(
            "BROKER://localhost:{},OUTSIDE://localhost:{}",
            BROKER_PORT, self.client_host_port
        );

        ContainerDescriptor::new(&self.image)
            .with_fixed_port(CLIENT_PORT, self.client_host_port)
            .with_cmd(["sh", "-c", self.startup_command().as_str()])
            .with_env("KAFKA_BROKER_ID", "1")
            .with_env(
                "KAFKA_ZOOKEEPER_CONNECT",
                format!("localhost:{}", ZOOKEEPER_PORT),
            )
            .with_env("KAFKA_LISTENERS", listeners)
            .with_env("KAFKA_ADVERTISED_LISTENERS", advertised)
            .with_env(
                "KAFKA_LISTENER_SECURITY_PROTOCOL_MAP",
                "BROKER:PLAINTEXT,OUTSIDE:PLAINTEXT",
            )
            .with_env("KAFKA_INTER_BROKER_LISTENER_NAME", "BROKER")
            .with_env("KAFKA_OFFSETS_TOPIC_REPLICATION_FACTOR", "1")
            .with_env("KAFKA_TRANSACTION_STATE_LOG_REPLICATION_FACTOR", "1")
            .with_env("KAFKA_TRANSACTION_STATE_LOG_MIN_ISR", "1")
            .with_wait_strategy(
                CommandWaitStrategy::new([
                    "kafka-topics",
                    "--bootstrap-server",
                    "localhost:29092",
                    "--list",
                ])
                .with_timeout(self.wait_timeout_ms),
            )
            .with_wait_strategy(
                CommandWaitStrategy::new([
                    "kafka-broker-api-versions",
                    "--bootstrap-server",
                    "localhost:29092",
                ])
                .with_timeout(self.wait_timeout_ms),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::PortMapping;
    use crate::wait::WaitStrategy;

    #[test]
    fn test_defaults() {
        let descriptor = KafkaContainer::new().build();

        assert_eq!(descriptor.image, "confluentinc/cp-kafka:7.4.3");
        assert_eq!(
            descriptor.exposed_ports,
            vec![PortMapping::Fixed {
                container: 9092,
                host: 9092
            }]
        );
        assert_eq!(
            descriptor.environment["KAFKA_ZOOKEEPER_CONNECT"],
            "localhost:2181"
        );
    }

    #[test]
    fn test_advertises_both_listeners() {
        let descriptor = KafkaContainer::new().build();

        let advertised = &descriptor.environment["KAFKA_ADVERTISED_LISTENERS"];
        assert!(advertised.contains("BROKER://localhost:29092"));
        assert!(advertised.contains("OUTSIDE://localhost:9092"));
    }

    #[test]
    fn test_fixed_port_shows_up_in_advertisement() {
        let descriptor = KafkaContainer::new().with_fixed_port(19092).build();

        assert_eq!(
            descriptor.exposed_ports,
            vec![PortMapping::Fixed {
                container: 9092,
                host: 19092
            }]
        );
        assert!(descriptor.environment["KAFKA_ADVERTISED_LISTENERS"]
            .contains("OUTSIDE://localhost:19092"));
    }

    #[test]
    fn test_embedded_zookeeper_starts_before_broker() {
        let descriptor = KafkaContainer::new().build();

        let cmd = descriptor.cmd.unwrap();
        assert_eq!(cmd[0], "sh");
        assert!(cmd[2].contains("zookeeper-server-start"));
        assert!(cmd[2].contains("/etc/confluent/docker/run"));
    }

    #[test]
    fn test_readiness_probes_both_tooling_paths() {
        let descriptor = KafkaContainer::new().build();

        let commands: Vec<&str> = descriptor
            .wait_strategies
            .iter()
            .map(|strategy| match strategy {
                WaitStrategy::Command(command) => command.cmd[0].as_str(),
                other => panic!("expected command strategy, got {:?}", other),
            })
            .collect();

        assert_eq!(commands, vec!["kafka-topics", "kafka-broker-api-versions"]);
    }

    #[test]
    #[should_panic(expected = "invalid image")]
    fn test_non_kafka_image_panics() {
        let _ = KafkaContainer::new().with_image("bitnami/kafka:3.6").build();
    }
}
