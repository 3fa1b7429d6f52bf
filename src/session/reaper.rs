//! Reaper sidecar client
//!
//! The reaper container watches the Docker daemon and deletes every
//! container matching a registered label filter once its client socket
//! closes. The session keeps one connection open for its entire lifetime;
//! process death is the cleanup trigger, no shutdown hook required.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info};
use url::form_urlencoded;

use crate::container::{ContainerDescriptor, MountMode};
use crate::docker::DockerApi;
use crate::error::{Error, Result};

const RYUK_IMAGE: &str = "testcontainers/ryuk:0.5.1";
const RYUK_PORT: u16 = 8080;

/// How long the reaper gets to acknowledge a filter registration.
const ACK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Open TCP connection keeping the reaper's sweep armed.
///
/// Nothing is ever written after the handshake; the socket exists so that
/// its close tells the reaper to start deleting.
pub(crate) struct ReaperConnection {
    #[allow(dead_code)]
    stream: BufReader<TcpStream>,
}

/// Start the reaper sidecar and register this session's label filter.
///
/// Returns only after the reaper acknowledged; a missing ACK fails session
/// initialization.
pub(crate) async fn start(
    api: &DockerApi,
    labels: &BTreeMap<String, String>,
) -> Result<(String, ReaperConnection)> {
    let descriptor = reaper_descriptor();

    api.pull_image(&descriptor.image).await?;
    let container_id = api.create_container(&descriptor).await?;
    api.start_container(&container_id).await?;

    let handle = api.get_container(&container_id).await?;
    let port = handle
        .mapped_port(RYUK_PORT)
        .ok_or_else(|| Error::ReaperConnect("reaper port was not published".to_string()))?;

    info!("reaper {} listening on localhost:{}", container_id, port);
    let connection = register(port, labels).await?;

    Ok((container_id, connection))
}

/// One `label=K=V&...` line out, one `ACK` line back.
async fn register(port: u16, labels: &BTreeMap<String, String>) -> Result<ReaperConnection> {
    let stream = TcpStream::connect(("localhost", port))
        .await
        .map_err(|e| Error::ReaperConnect(e.to_string()))?;

    let mut stream = BufReader::new(stream);

    let filter = filter_line(labels);
    debug!("registering reaper filter: {}", filter.trim_end());
    stream
        .get_mut()
        .write_all(filter.as_bytes())
        .await
        .map_err(|e| Error::ReaperConnect(e.to_string()))?;

    let mut response = String::new();
    tokio::time::timeout(ACK_TIMEOUT, stream.read_line(&mut response))
        .await
        .map_err(|_| Error::ReaperAckMissing)?
        .map_err(|e| Error::ReaperConnect(e.to_string()))?;

    if response.trim_end() != "ACK" {
        return Err(Error::ReaperAckMissing);
    }

    debug!("reaper acknowledged the session filter");
    Ok(ReaperConnection { stream })
}

fn reaper_descriptor() -> ContainerDescriptor {
    ContainerDescriptor::new(RYUK_IMAGE)
        .with_exposed_port(RYUK_PORT)
        .with_env("RYUK_PORT", RYUK_PORT.to_string())
        .with_bind_mount("/var/run/docker.sock", "/var/run/docker.sock", MountMode::Rw)
}

/// `label=K=V` pairs joined by `&`, URL-encoded, newline-terminated.
fn filter_line(labels: &BTreeMap<String, String>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in labels {
        serializer.append_pair("label", &format!("{}={}", key, value));
    }

    format!("{}\n", serializer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::PortMapping;

    #[test]
    fn test_reaper_descriptor() {
        let descriptor = reaper_descriptor();

        assert_eq!(descriptor.image, "testcontainers/ryuk:0.5.1");
        assert_eq!(descriptor.exposed_ports, vec![PortMapping::Ephemeral(8080)]);
        assert_eq!(descriptor.environment["RYUK_PORT"], "8080");

        let mount = &descriptor.bind_mounts[0];
        assert_eq!(mount.host_src, "/var/run/docker.sock");
        assert_eq!(mount.container_dest, "/var/run/docker.sock");
        assert_eq!(mount.mode, MountMode::Rw);
    }

    #[test]
    fn test_filter_line_covers_every_label() {
        let labels = BTreeMap::from([
            ("io.berth".to_string(), "true".to_string()),
            ("io.berth.session-id".to_string(), "abc123".to_string()),
        ]);

        let line = filter_line(&labels);

        assert!(line.ends_with('\n'));
        assert_eq!(line.matches("label=").count(), 2);
        assert!(line.contains("io.berth%3Dtrue"));
        assert!(line.contains("io.berth.session-id%3Dabc123"));
        assert_eq!(line.matches('&').count(), 1);
    }
}
