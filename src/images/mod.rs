//! Declarative configs for commonly used images
//!
//! Each config is a [`Builder`](crate::builder::Builder) variant: it
//! validates its image against the variant's canonical prefix, injects the
//! environment the image requires and attaches a readiness probe tuned for
//! that service.

mod kafka;
mod mysql;
mod postgres;
mod redis;

pub use kafka::KafkaContainer;
pub use mysql::MySqlContainer;
pub use postgres::PostgresContainer;
pub use redis::RedisContainer;
