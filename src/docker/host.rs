//! Docker transport resolution

use bollard::{Docker, API_DEFAULT_VERSION};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Request timeout for Engine API calls, in seconds. This is the only bound
/// on an in-flight HTTP call.
const API_TIMEOUT_SECS: u64 = 120;

/// Resolve the Docker transport from the environment.
///
/// `DOCKER_HOST` is honored when set (`unix://` socket or `tcp://`/`http://`
/// address); otherwise the platform-local socket is used. A connection
/// failure here fails session initialization.
pub fn connect() -> Result<Docker> {
    match std::env::var("DOCKER_HOST") {
        Ok(host) if !host.is_empty() => connect_to(&host),
        _ => {
            debug!("DOCKER_HOST not set, using local defaults");
            Docker::connect_with_local_defaults().map_err(|e| Error::Connection(e.to_string()))
        }
    }
}

fn connect_to(host: &str) -> Result<Docker> {
    let url = Url::parse(host)
        .map_err(|e| Error::Connection(format!("invalid DOCKER_HOST '{}': {}", host, e)))?;

    debug!("connecting to docker daemon at {}", host);
    let client = match url.scheme() {
        "unix" => Docker::connect_with_socket(url.path(), API_TIMEOUT_SECS, API_DEFAULT_VERSION),
        "tcp" | "http" => Docker::connect_with_http(host, API_TIMEOUT_SECS, API_DEFAULT_VERSION),
        scheme => {
            return Err(Error::Connection(format!(
                "unsupported DOCKER_HOST scheme '{}'",
                scheme
            )))
        }
    };

    client.map_err(|e| Error::Connection(e.to_string()))
}
