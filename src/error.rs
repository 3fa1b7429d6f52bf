use thiserror::Error;

/// Error type for container lifecycle operations
#[derive(Debug, Error)]
pub enum Error {
    #[error("docker engine returned HTTP {0}")]
    Http(u16),

    #[error("docker connection error: {0}")]
    Connection(String),

    #[error("failed to pull image: {0}")]
    PullImage(String),

    #[error("failed to create container: {0}")]
    CreateContainer(String),

    #[error("failed to start container: {0}")]
    StartContainer(String),

    #[error("docker engine error: {0}")]
    Engine(String),

    #[error("bridge network has no gateway")]
    NoGateway,

    #[error("wait strategy '{0}' timed out")]
    WaitTimeout(&'static str),

    #[error("wait strategy '{strategy}' failed: {detail}")]
    WaitFailed {
        strategy: &'static str,
        detail: String,
    },

    #[error("reaper did not acknowledge the label filter")]
    ReaperAckMissing,

    #[error("failed to reach the reaper: {0}")]
    ReaperConnect(String),

    #[error("session operation timed out")]
    SessionTimeout,

    #[error("session manager is no longer running")]
    SessionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Map a raw engine failure, keeping HTTP statuses and transport errors
    /// apart from operation-specific engine messages.
    pub(crate) fn engine(err: bollard::errors::Error, wrap: fn(String) -> Error) -> Error {
        match err {
            bollard::errors::Error::DockerResponseServerError { status_code, .. } => {
                Error::Http(status_code)
            }
            bollard::errors::Error::IOError { err } => Error::Connection(err.to_string()),
            other => wrap(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_maps_server_errors_to_http() {
        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "no such container".to_string(),
        };

        match Error::engine(err, Error::Engine) {
            Error::Http(404) => {}
            other => panic!("expected Http(404), got {:?}", other),
        }
    }

    #[test]
    fn test_engine_wraps_other_errors_per_operation() {
        let err = bollard::errors::Error::JsonDataError {
            message: "unexpected field".to_string(),
            column: 0,
        };

        match Error::engine(err, Error::CreateContainer) {
            Error::CreateContainer(_) => {}
            other => panic!("expected CreateContainer, got {:?}", other),
        }
    }
}
