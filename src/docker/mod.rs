//! Docker Engine access
//!
//! `host` resolves the transport from the environment; `api` is the typed
//! facade the rest of the crate consumes. Nothing outside this module
//! touches bollard types.

mod api;
mod host;

pub use api::{DockerApi, ExecStatus};
pub use host::connect;
