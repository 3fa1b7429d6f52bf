//! Normalized container-creation request

use std::collections::BTreeMap;

use crate::wait::WaitStrategy;

/// Host port selection for an exposed container port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortMapping {
    /// Let the daemon assign an ephemeral host port
    Ephemeral(u16),

    /// Bind the container port to a fixed host port
    Fixed { container: u16, host: u16 },
}

impl PortMapping {
    /// The container-side port of this mapping
    pub fn container_port(&self) -> u16 {
        match self {
            PortMapping::Ephemeral(port) => *port,
            PortMapping::Fixed { container, .. } => *container,
        }
    }
}

/// Access mode for a bind mount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    Ro,
    Rw,
}

impl MountMode {
    /// The mode suffix of a `src:dst:mode` bind string
    pub fn as_str(&self) -> &'static str {
        match self {
            MountMode::Ro => "ro",
            MountMode::Rw => "rw",
        }
    }
}

/// A host path mounted into the container
#[derive(Debug, Clone)]
pub struct BindMount {
    pub host_src: String,
    pub container_dest: String,
    pub mode: MountMode,
}

/// A named volume mounted into the container
#[derive(Debug, Clone)]
pub struct BindVolume {
    pub volume_name: String,
    pub container_dest: String,
    pub read_only: bool,
}

/// The normalized request form consumed by the Docker API facade.
///
/// Environment and labels are kept in sorted maps, so the serialized create
/// request does not depend on caller insertion order.
#[derive(Debug, Clone, Default)]
pub struct ContainerDescriptor {
    pub image: String,
    pub cmd: Option<Vec<String>>,
    pub exposed_ports: Vec<PortMapping>,
    pub environment: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub bind_mounts: Vec<BindMount>,
    pub bind_volumes: Vec<BindVolume>,
    /// Off by default; the reaper owns cleanup.
    pub auto_remove: bool,
    pub privileged: bool,
    /// Applied in declaration order after start.
    pub wait_strategies: Vec<WaitStrategy>,
}

impl ContainerDescriptor {
    /// Create a descriptor for the given `image:tag`.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    /// Expose a container port on a daemon-assigned ephemeral host port.
    ///
    /// # Panics
    /// Panics if `port` is 0.
    pub fn with_exposed_port(mut self, port: u16) -> Self {
        assert!(port > 0, "container port must be in 1..=65535");
        self.exposed_ports.push(PortMapping::Ephemeral(port));
        self
    }

    /// Bind a container port to a fixed host port.
    ///
    /// # Panics
    /// Panics if `container` is 0.
    pub fn with_fixed_port(mut self, container: u16, host: u16) -> Self {
        assert!(container > 0, "container port must be in 1..=65535");
        self.exposed_ports.push(PortMapping::Fixed { container, host });
        self
    }

    /// Override the image's default command.
    pub fn with_cmd(mut self, cmd: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.cmd = Some(cmd.into_iter().map(Into::into).collect());
        self
    }

    /// Set an environment variable. Later values replace earlier ones.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Set a label. Later values replace earlier ones.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Mount a host path into the container.
    pub fn with_bind_mount(
        mut self,
        host_src: impl Into<String>,
        container_dest: impl Into<String>,
        mode: MountMode,
    ) -> Self {
        self.bind_mounts.push(BindMount {
            host_src: host_src.into(),
            container_dest: container_dest.into(),
            mode,
        });
        self
    }

    /// Mount a named volume into the container.
    pub fn with_bind_volume(
        mut self,
        volume_name: impl Into<String>,
        container_dest: impl Into<String>,
        read_only: bool,
    ) -> Self {
        self.bind_volumes.push(BindVolume {
            volume_name: volume_name.into(),
            container_dest: container_dest.into(),
            read_only,
        });
        self
    }

    pub fn with_auto_remove(mut self, auto_remove: bool) -> Self {
        self.auto_remove = auto_remove;
        self
    }

    pub fn with_privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Append a readiness probe to the wait pipeline.
    pub fn with_wait_strategy(mut self, strategy: impl Into<WaitStrategy>) -> Self {
        self.wait_strategies.push(strategy.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_is_sorted_regardless_of_insertion_order() {
        let a = ContainerDescriptor::new("redis:7.2")
            .with_env("B", "2")
            .with_env("A", "1");
        let b = ContainerDescriptor::new("redis:7.2")
            .with_env("A", "1")
            .with_env("B", "2");

        let a_keys: Vec<_> = a.environment.keys().collect();
        let b_keys: Vec<_> = b.environment.keys().collect();
        assert_eq!(a_keys, b_keys);
        assert_eq!(a_keys, vec!["A", "B"]);
    }

    #[test]
    fn test_env_replaces_duplicate_keys() {
        let descriptor = ContainerDescriptor::new("redis:7.2")
            .with_env("KEY", "old")
            .with_env("KEY", "new");

        assert_eq!(descriptor.environment.get("KEY").map(String::as_str), Some("new"));
        assert_eq!(descriptor.environment.len(), 1);
    }

    #[test]
    #[should_panic(expected = "container port must be in 1..=65535")]
    fn test_zero_port_is_rejected() {
        let _ = ContainerDescriptor::new("redis:7.2").with_exposed_port(0);
    }

    #[test]
    fn test_defaults() {
        let descriptor = ContainerDescriptor::new("redis:7.2");

        assert!(!descriptor.auto_remove);
        assert!(!descriptor.privileged);
        assert!(descriptor.cmd.is_none());
        assert!(descriptor.wait_strategies.is_empty());
    }
}
