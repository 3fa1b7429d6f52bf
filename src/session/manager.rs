//! Session manager actor
//!
//! One task per process owns the Docker connection, the session labels and
//! the reaper socket. Requests arrive over a mailbox and are each served on
//! a spawned worker holding immutable snapshots, so the mailbox never blocks
//! on Docker I/O and no session state is touched across an await.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use sha1::{Digest, Sha1};
use tokio::sync::{mpsc, oneshot, OnceCell};
use tracing::info;

use super::reaper::{self, ReaperConnection};
use crate::builder::Builder;
use crate::container::{ContainerDescriptor, ContainerHandle};
use crate::docker::{self, DockerApi, ExecStatus};
use crate::error::{Error, Result};
use crate::wait;

/// Reserved label carrying the session id.
pub const SESSION_ID_LABEL: &str = "io.berth.session-id";
/// Reserved label carrying the library version.
pub const VERSION_LABEL: &str = "io.berth.version";
/// Reserved label carrying the host-language tag.
pub const LANG_LABEL: &str = "io.berth.lang";
/// Reserved presence-marker label.
pub const MARKER_LABEL: &str = "io.berth";

/// How long a caller waits for the actor's reply before giving up. The
/// worker keeps running past this; a container it started stays reaper-owned.
const CALLER_TIMEOUT: Duration = Duration::from_millis(300_000);

static SESSION: OnceCell<Session> = OnceCell::const_new();

/// Obtain the process-wide session, initializing it on first use.
///
/// Initialization resolves the Docker transport, starts the reaper sidecar
/// and registers the session's label filter with it; the session is only
/// handed out once the reaper has acknowledged.
pub async fn session() -> Result<&'static Session> {
    SESSION.get_or_try_init(Session::initialize).await
}

/// Handle to the process-wide session manager.
#[derive(Clone)]
pub struct Session {
    tx: mpsc::Sender<Request>,
    session_id: String,
    reaper_container_id: String,
}

enum Request {
    StartContainer {
        descriptor: ContainerDescriptor,
        reply: oneshot::Sender<Result<ContainerHandle>>,
    },
    StopContainer {
        id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    GetContainer {
        id: String,
        reply: oneshot::Sender<Result<ContainerHandle>>,
    },
    CreateExec {
        id: String,
        cmd: Vec<String>,
        reply: oneshot::Sender<Result<String>>,
    },
    StartExec {
        exec_id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    InspectExec {
        exec_id: String,
        reply: oneshot::Sender<Result<ExecStatus>>,
    },
    StdoutLogs {
        id: String,
        reply: oneshot::Sender<Result<Bytes>>,
    },
    PutFile {
        id: String,
        path: String,
        content: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
}

impl Session {
    async fn initialize() -> Result<Session> {
        let api = DockerApi::new(docker::connect()?);
        let session_id = generate_session_id();

        info!("initializing container session {}", session_id);

        let labels = session_labels(&session_id);
        let (reaper_container_id, reaper) = reaper::start(&api, &labels).await?;

        let (tx, rx) = mpsc::channel(64);
        let actor = Actor {
            api,
            labels,
            reaper,
            reaper_container_id: reaper_container_id.clone(),
            rx,
        };
        tokio::spawn(actor.run());

        Ok(Session {
            tx,
            session_id,
            reaper_container_id,
        })
    }

    /// The 40-hex-character identifier labelled onto everything this session
    /// creates.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Id of the companion reaper container.
    pub fn reaper_container_id(&self) -> &str {
        &self.reaper_container_id
    }

    /// Build the config, start the container and block until every one of
    /// its readiness probes has passed.
    ///
    /// # Panics
    /// Panics if the config is invalid (for example an image that does not
    /// match the variant's canonical prefix). Validation happens here,
    /// before any Docker I/O.
    pub async fn start_container(&self, config: &impl Builder) -> Result<ContainerHandle> {
        let descriptor = config.build();
        self.call(move |reply| Request::StartContainer { descriptor, reply })
            .await
    }

    /// Kill and remove a container now instead of leaving it to the reaper.
    pub async fn stop_container(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.call(move |reply| Request::StopContainer { id, reply })
            .await
    }

    /// Inspect a container.
    pub async fn get_container(&self, id: &str) -> Result<ContainerHandle> {
        let id = id.to_string();
        self.call(move |reply| Request::GetContainer { id, reply })
            .await
    }

    /// Create an exec instance in a running container.
    pub async fn create_exec(&self, id: &str, cmd: Vec<String>) -> Result<String> {
        let id = id.to_string();
        self.call(move |reply| Request::CreateExec { id, cmd, reply })
            .await
    }

    /// Start a previously created exec instance.
    pub async fn start_exec(&self, exec_id: &str) -> Result<()> {
        let exec_id = exec_id.to_string();
        self.call(move |reply| Request::StartExec { exec_id, reply })
            .await
    }

    /// Observe an exec instance.
    pub async fn inspect_exec(&self, exec_id: &str) -> Result<ExecStatus> {
        let exec_id = exec_id.to_string();
        self.call(move |reply| Request::InspectExec { exec_id, reply })
            .await
    }

    /// Fetch a container's combined stdout and stderr.
    pub async fn stdout_logs(&self, id: &str) -> Result<Bytes> {
        let id = id.to_string();
        self.call(move |reply| Request::StdoutLogs { id, reply })
            .await
    }

    /// Write a single file into a container.
    pub async fn put_file(
        &self,
        id: &str,
        path: &str,
        content: impl Into<Vec<u8>>,
    ) -> Result<()> {
        let id = id.to_string();
        let path = path.to_string();
        let content = content.into();
        self.call(move |reply| Request::PutFile {
            id,
            path,
            content,
            reply,
        })
        .await
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> Request,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| Error::SessionClosed)?;

        match tokio::time::timeout(CALLER_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::SessionClosed),
            Err(_) => Err(Error::SessionTimeout),
        }
    }
}

struct Actor {
    api: DockerApi,
    /// The four reserved labels; immutable after init.
    labels: BTreeMap<String, String>,
    /// Held open for the whole session; its close arms the reaper sweep.
    reaper: ReaperConnection,
    reaper_container_id: String,
    rx: mpsc::Receiver<Request>,
}

impl Actor {
    async fn run(mut self) {
        while let Some(request) = self.rx.recv().await {
            self.dispatch(request);
        }

        // Every session handle is gone. Closing the reaper socket hands
        // whatever is still running over to the sweep.
        info!(
            "session closed, reaper {} takes over remaining containers",
            self.reaper_container_id
        );
        drop(self.reaper);
    }

    /// Serve one request on a detached worker over immutable snapshots.
    fn dispatch(&self, request: Request) {
        let api = self.api.clone();
        let labels = self.labels.clone();

        tokio::spawn(async move {
            match request {
                Request::StartContainer {
                    mut descriptor,
                    reply,
                } => {
                    descriptor.labels.extend(labels);
                    let _ = reply.send(start_pipeline(&api, descriptor).await);
                }
                Request::StopContainer { id, reply } => {
                    let _ = reply.send(api.stop_container(&id).await);
                }
                Request::GetContainer { id, reply } => {
                    let _ = reply.send(api.get_container(&id).await);
                }
                Request::CreateExec { id, cmd, reply } => {
                    let _ = reply.send(api.create_exec(&id, cmd).await);
                }
                Request::StartExec { exec_id, reply } => {
                    let _ = reply.send(api.start_exec(&exec_id).await);
                }
                Request::InspectExec { exec_id, reply } => {
                    let _ = reply.send(api.inspect_exec(&exec_id).await);
                }
                Request::StdoutLogs { id, reply } => {
                    let _ = reply.send(api.stdout_logs(&id).await);
                }
                Request::PutFile {
                    id,
                    path,
                    content,
                    reply,
                } => {
                    let _ = reply.send(api.put_file(&id, &path, &content).await);
                }
            }
        });
    }
}

/// The strictly ordered start sequence: pull, create, start, wait, inspect.
/// A failure after create leaves the container behind for the reaper.
async fn start_pipeline(api: &DockerApi, descriptor: ContainerDescriptor) -> Result<ContainerHandle> {
    api.pull_image(&descriptor.image).await?;
    let id = api.create_container(&descriptor).await?;
    api.start_container(&id).await?;

    wait::run_pipeline(api, &id, &descriptor.wait_strategies).await?;

    api.get_container(&id).await
}

/// The reserved labels attached to every container this session creates.
/// The reaper filter is registered over exactly this set.
fn session_labels(session_id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (SESSION_ID_LABEL.to_string(), session_id.to_string()),
        (
            VERSION_LABEL.to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        ),
        (LANG_LABEL.to_string(), "rust".to_string()),
        (MARKER_LABEL.to_string(), "true".to_string()),
    ])
}

/// 40 hex characters derived from the process id and the current UTC instant.
fn generate_session_id() -> String {
    let mut hasher = Sha1::new();
    hasher.update(std::process::id().to_be_bytes());
    hasher.update(Utc::now().to_rfc3339().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_is_40_hex_chars() {
        let id = generate_session_id();

        assert_eq!(id.len(), 40);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, id.to_lowercase());
    }

    #[test]
    fn test_session_labels_cover_the_reserved_set() {
        let labels = session_labels("a".repeat(40).as_str());

        assert_eq!(labels.len(), 4);
        assert_eq!(labels[SESSION_ID_LABEL], "a".repeat(40));
        assert_eq!(labels[VERSION_LABEL], env!("CARGO_PKG_VERSION"));
        assert_eq!(labels[LANG_LABEL], "rust");
        assert_eq!(labels[MARKER_LABEL], "true");
    }

    #[test]
    fn test_session_labels_override_user_labels() {
        let mut descriptor = ContainerDescriptor::new("redis:7.2")
            .with_label(MARKER_LABEL, "forged")
            .with_label("custom", "kept");

        descriptor.labels.extend(session_labels("deadbeef"));

        assert_eq!(descriptor.labels[MARKER_LABEL], "true");
        assert_eq!(descriptor.labels["custom"], "kept");
        assert_eq!(descriptor.labels[SESSION_ID_LABEL], "deadbeef");
    }
}
