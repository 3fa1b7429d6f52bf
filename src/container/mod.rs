//! Container request and observation types

mod descriptor;
mod handle;

pub use descriptor::{BindMount, BindVolume, ContainerDescriptor, MountMode, PortMapping};
pub use handle::{ContainerHandle, ResolvedPort};
