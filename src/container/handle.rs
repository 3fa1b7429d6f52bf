//! Post-start container observation

use std::collections::BTreeMap;

/// A container port together with the host port the daemon published for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPort {
    pub container: u16,
    pub host: u16,
}

/// Returned to the caller once a container is running and all of its
/// readiness probes have passed.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    /// Opaque container id
    pub id: String,

    /// Image the container was created from
    pub image: String,

    /// One entry per exposed container port, resolved post-start
    pub exposed_ports: Vec<ResolvedPort>,

    /// Environment as reported by inspect
    pub environment: BTreeMap<String, String>,

    /// Labels as reported by inspect
    pub labels: BTreeMap<String, String>,
}

impl ContainerHandle {
    /// The host port mapped to `container_port`, if the daemon published one.
    pub fn mapped_port(&self, container_port: u16) -> Option<u16> {
        self.exposed_ports
            .iter()
            .find(|port| port.container == container_port)
            .map(|port| port.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_with_ports(ports: Vec<ResolvedPort>) -> ContainerHandle {
        ContainerHandle {
            id: "deadbeef".to_string(),
            image: "redis:7.2".to_string(),
            exposed_ports: ports,
            environment: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }

    #[test]
    fn test_mapped_port_resolves_container_port() {
        let handle = handle_with_ports(vec![
            ResolvedPort { container: 6379, host: 49153 },
            ResolvedPort { container: 8080, host: 49154 },
        ]);

        assert_eq!(handle.mapped_port(6379), Some(49153));
        assert_eq!(handle.mapped_port(8080), Some(49154));
    }

    #[test]
    fn test_mapped_port_is_none_for_unexposed_port() {
        let handle = handle_with_ports(vec![ResolvedPort { container: 6379, host: 49153 }]);

        assert_eq!(handle.mapped_port(5432), None);
    }
}
