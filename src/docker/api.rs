//! Typed facade over the Docker Engine HTTP API
//!
//! Pure request/reply wrappers: no retries, no concurrency. Each operation
//! translates one Engine call and maps its failure into the crate error
//! taxonomy; `stop_container` is the specified kill + delete pair.

use std::collections::{HashMap, HashSet};

use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecOptions};
use bollard::image::CreateImageOptions;
use bollard::models::{
    ContainerInspectResponse, HostConfig, Mount, MountTypeEnum, PortBinding,
};
use bollard::network::InspectNetworkOptions;
use bollard::Docker;
use bytes::Bytes;
use futures_util::StreamExt;
use tracing::{debug, info};

use crate::container::{ContainerDescriptor, ContainerHandle, PortMapping, ResolvedPort};
use crate::error::{Error, Result};

/// Exec probe observation
#[derive(Debug, Clone, Copy)]
pub struct ExecStatus {
    pub running: bool,
    pub exit_code: Option<i64>,
}

/// Facade over the Engine API. Cheap to clone; worker tasks operate on
/// clones while the session actor keeps the original.
#[derive(Clone)]
pub struct DockerApi {
    client: Docker,
}

impl DockerApi {
    pub fn new(client: Docker) -> Self {
        Self { client }
    }

    /// Pull an image. Idempotent at the Engine layer.
    pub async fn pull_image(&self, image: &str) -> Result<()> {
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            match progress {
                Ok(update) => {
                    if let Some(status) = update.status {
                        debug!("pull {}: {}", image, status);
                    }
                }
                Err(e) => return Err(Error::engine(e, Error::PullImage)),
            }
        }

        info!("pulled image {}", image);
        Ok(())
    }

    /// Create a container from a normalized descriptor.
    pub async fn create_container(&self, descriptor: &ContainerDescriptor) -> Result<String> {
        let config = create_request(descriptor);

        let response = self
            .client
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(|e| Error::engine(e, Error::CreateContainer))?;

        info!("created container {} from {}", response.id, descriptor.image);
        Ok(response.id)
    }

    /// Start a created container.
    pub async fn start_container(&self, id: &str) -> Result<()> {
        self.client
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::engine(e, Error::StartContainer))?;

        info!("started container {}", id);
        Ok(())
    }

    /// Stop a container: kill, then delete. Both calls run in order.
    pub async fn stop_container(&self, id: &str) -> Result<()> {
        self.client
            .kill_container(id, Some(KillContainerOptions { signal: "SIGKILL" }))
            .await
            .map_err(|e| Error::engine(e, Error::Engine))?;

        self.client
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| Error::engine(e, Error::Engine))?;

        info!("killed and removed container {}", id);
        Ok(())
    }

    /// Inspect a container and derive the caller-facing handle.
    pub async fn get_container(&self, id: &str) -> Result<ContainerHandle> {
        let details = self
            .client
            .inspect_container(id, None)
            .await
            .map_err(|e| Error::engine(e, Error::Engine))?;

        Ok(handle_from_inspect(id, details))
    }

    /// Create an exec instance attached to stdout and stderr.
    pub async fn create_exec(&self, id: &str, cmd: Vec<String>) -> Result<String> {
        let options = CreateExecOptions {
            cmd: Some(cmd),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let exec = self
            .client
            .create_exec(id, options)
            .await
            .map_err(|e| Error::engine(e, Error::Engine))?;

        Ok(exec.id)
    }

    /// Start an exec instance detached; progress is observed via
    /// [`inspect_exec`](Self::inspect_exec).
    pub async fn start_exec(&self, exec_id: &str) -> Result<()> {
        self.client
            .start_exec(
                exec_id,
                Some(StartExecOptions {
                    detach: true,
                    ..Default::default()
                }),
            )
            .await
            .map(|_| ())
            .map_err(|e| Error::engine(e, Error::Engine))
    }

    /// Observe a running or finished exec instance.
    pub async fn inspect_exec(&self, exec_id: &str) -> Result<ExecStatus> {
        let details = self
            .client
            .inspect_exec(exec_id)
            .await
            .map_err(|e| Error::engine(e, Error::Engine))?;

        Ok(ExecStatus {
            running: details.running.unwrap_or(false),
            exit_code: details.exit_code,
        })
    }

    /// Fetch the container's combined stdout and stderr.
    pub async fn stdout_logs(&self, id: &str) -> Result<Bytes> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: "all".to_string(),
            ..Default::default()
        };

        let mut stream = self.client.logs(id, Some(options));
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            let output = chunk.map_err(|e| Error::engine(e, Error::Engine))?;
            collected.extend_from_slice(&output.into_bytes());
        }

        Ok(Bytes::from(collected))
    }

    /// Gateway address of the default bridge network.
    ///
    /// Probes running while the test process itself lives inside a container
    /// dial this address instead of localhost.
    pub async fn get_bridge_gateway(&self) -> Result<String> {
        let network = self
            .client
            .inspect_network("bridge", None::<InspectNetworkOptions<String>>)
            .await
            .map_err(|e| Error::engine(e, Error::Engine))?;

        network
            .ipam
            .and_then(|ipam| ipam.config)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|config| config.gateway)
            .find(|gateway| !gateway.trim().is_empty())
            .ok_or(Error::NoGateway)
    }

    /// Write a single file into the container through the archive endpoint.
    pub async fn put_file(&self, id: &str, path: &str, content: &[u8]) -> Result<()> {
        let archive = tar_single_file(path, content)?;

        let options = UploadToContainerOptions {
            path: "/",
            ..Default::default()
        };

        self.client
            .upload_to_container(id, Some(options), archive)
            .await
            .map_err(|e| Error::engine(e, Error::Engine))
    }
}

/// Translate a descriptor into the Engine's create request.
fn create_request(descriptor: &ContainerDescriptor) -> Config<String> {
    let env: Vec<String> = descriptor
        .environment
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();

    let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    for mapping in &descriptor.exposed_ports {
        let key = format!("{}/tcp", mapping.container_port());
        exposed_ports.insert(key.clone(), HashMap::new());

        // An empty HostPort lets the daemon pick an ephemeral port.
        let host_port = match mapping {
            PortMapping::Ephemeral(_) => String::new(),
            PortMapping::Fixed { host, .. } => host.to_string(),
        };
        port_bindings.insert(
            key,
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(host_port),
            }]),
        );
    }

    // Named volumes go through Mounts and win over a bind mount claiming the
    // same destination.
    let volume_targets: HashSet<&str> = descriptor
        .bind_volumes
        .iter()
        .map(|volume| volume.container_dest.as_str())
        .collect();

    let binds: Vec<String> = descriptor
        .bind_mounts
        .iter()
        .filter(|mount| !volume_targets.contains(mount.container_dest.as_str()))
        .map(|mount| {
            format!(
                "{}:{}:{}",
                mount.host_src,
                mount.container_dest,
                mount.mode.as_str()
            )
        })
        .collect();

    let mounts: Vec<Mount> = descriptor
        .bind_volumes
        .iter()
        .map(|volume| Mount {
            target: Some(volume.container_dest.clone()),
            source: Some(volume.volume_name.clone()),
            typ: Some(MountTypeEnum::VOLUME),
            read_only: Some(volume.read_only),
            ..Default::default()
        })
        .collect();

    let host_config = HostConfig {
        port_bindings: Some(port_bindings),
        binds: if binds.is_empty() { None } else { Some(binds) },
        mounts: if mounts.is_empty() { None } else { Some(mounts) },
        auto_remove: Some(descriptor.auto_remove),
        privileged: Some(descriptor.privileged),
        ..Default::default()
    };

    Config {
        image: Some(descriptor.image.clone()),
        cmd: descriptor.cmd.clone(),
        env: Some(env),
        exposed_ports: Some(exposed_ports),
        labels: Some(descriptor.labels.clone().into_iter().collect()),
        host_config: Some(host_config),
        ..Default::default()
    }
}

/// Derive the caller-facing handle from an inspect response.
fn handle_from_inspect(id: &str, details: ContainerInspectResponse) -> ContainerHandle {
    let config = details.config.unwrap_or_default();

    let environment = config
        .env
        .unwrap_or_default()
        .iter()
        .filter_map(|entry| {
            entry
                .split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
        })
        .collect();

    let labels = config.labels.unwrap_or_default().into_iter().collect();

    let exposed_ports = details
        .network_settings
        .and_then(|settings| settings.ports)
        .map(resolved_ports)
        .unwrap_or_default();

    ContainerHandle {
        id: details.id.unwrap_or_else(|| id.to_string()),
        image: config.image.unwrap_or_default(),
        exposed_ports,
        environment,
        labels,
    }
}

/// `NetworkSettings.Ports` to resolved `(container, host)` pairs: strip the
/// `/tcp` suffix and take the first parseable host port.
fn resolved_ports(ports: HashMap<String, Option<Vec<PortBinding>>>) -> Vec<ResolvedPort> {
    let mut resolved: Vec<ResolvedPort> = ports
        .into_iter()
        .filter_map(|(key, bindings)| {
            let container = key.strip_suffix("/tcp")?.parse().ok()?;
            let host = bindings?
                .into_iter()
                .find_map(|binding| binding.host_port.and_then(|port| port.parse().ok()))?;
            Some(ResolvedPort { container, host })
        })
        .collect();

    resolved.sort_by_key(|port| port.container);
    resolved
}

/// Wrap one file into an in-memory tar archive for the archive endpoint.
fn tar_single_file(path: &str, content: &[u8]) -> Result<Bytes> {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();

    let mut builder = tar::Builder::new(Vec::new());
    builder.append_data(&mut header, path.trim_start_matches('/'), content)?;
    let archive = builder.into_inner()?;

    Ok(Bytes::from(archive))
}
