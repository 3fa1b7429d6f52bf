//! Berth - ephemeral Docker containers for integration tests
//!
//! A test declares the container it needs (image, ports, environment, wait
//! conditions); berth pulls the image, creates and starts the container
//! through the Docker Engine API, blocks until the service inside is
//! observably ready and hands back a handle exposing the mapped host ports.
//! Every container carries the process-wide session labels and is registered
//! with a reaper sidecar, so containers are removed even when the test
//! process dies without cleaning up.

pub mod builder;
pub mod container;
pub mod docker;
pub mod error;
pub mod images;
pub mod session;
pub mod wait;

// Re-export commonly used types
pub use builder::Builder;
pub use container::{
    BindMount, BindVolume, ContainerDescriptor, ContainerHandle, MountMode, PortMapping,
    ResolvedPort,
};
pub use error::{Error, Result};
pub use images::{KafkaContainer, MySqlContainer, PostgresContainer, RedisContainer};
pub use session::{session, Session};
pub use wait::{
    CommandWaitStrategy, HttpWaitStrategy, LogWaitStrategy, PortWaitStrategy, WaitStrategy,
};
