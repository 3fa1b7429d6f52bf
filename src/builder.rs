//! Declarative config to descriptor contract

use crate::container::ContainerDescriptor;

/// Turns a declarative container config into a normalized descriptor.
///
/// Implementations validate their configuration eagerly: an image that does
/// not match the variant's canonical prefix is a programming error and
/// panics before any Docker I/O happens.
pub trait Builder {
    fn build(&self) -> ContainerDescriptor;
}

/// The generic case: a descriptor is its own config.
impl Builder for ContainerDescriptor {
    fn build(&self) -> ContainerDescriptor {
        self.clone()
    }
}

/// Validation shared by the image-specific configs.
pub(crate) fn require_image_prefix(image: &str, prefix: &str) {
    assert!(
        image.starts_with(prefix),
        "invalid image '{}': expected an image starting with '{}'",
        image,
        prefix
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_builds_to_itself() {
        let descriptor = ContainerDescriptor::new("busybox:latest")
            .with_exposed_port(8080)
            .with_env("KEY", "value");

        let built = descriptor.build();

        assert_eq!(built.image, descriptor.image);
        assert_eq!(built.exposed_ports, descriptor.exposed_ports);
        assert_eq!(built.environment, descriptor.environment);
    }

    #[test]
    #[should_panic(expected = "invalid image")]
    fn test_prefix_mismatch_panics() {
        require_image_prefix("mysql:8", "postgres");
    }

    #[test]
    fn test_prefix_match_passes() {
        require_image_prefix("postgres:16-alpine", "postgres");
    }
}
