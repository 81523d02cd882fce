//! Docker client — core struct, constructor, error type.
//!
//! Domain methods live in sibling modules (`container`, `swarm`) which add
//! `impl DockerClient` blocks. This is the one orchestrator dependency the
//! rest of the crate is built against; nothing outside this module touches
//! `bollard` directly.

use bollard::Docker;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockerError {
    #[error("Docker connection failed: {0}")]
    ConnectionFailed(String),
    #[error("container not found: {0}")]
    ContainerNotFound(String),
    #[error("stats stream closed before yielding a sample")]
    StreamClosed,
    #[error("this node is not a swarm manager")]
    NotSwarmManager,
    #[error("bollard error: {0}")]
    BollardError(#[from] bollard::errors::Error),
}

/// Result of inspecting swarm state — distinguishes manager, worker, and not-in-swarm.
#[derive(Debug)]
pub enum SwarmInspectResult {
    Manager(bollard::models::Swarm),
    Worker,
    NotInSwarm,
}

#[derive(Debug, Clone)]
pub struct DockerClient {
    pub(super) client: Docker,
}

impl DockerClient {
    pub fn new(socket_path: &str) -> Result<Self, DockerError> {
        let client = if socket_path.is_empty() {
            Docker::connect_with_defaults()
                .map_err(|e| DockerError::ConnectionFailed(e.to_string()))?
        } else {
            let clean_path = socket_path.trim_start_matches("unix://");
            Docker::connect_with_socket(clean_path, 120, &bollard::API_DEFAULT_VERSION)
                .map_err(|e| DockerError::ConnectionFailed(e.to_string()))?
        };
        Ok(DockerClient { client })
    }

    /// Docker daemon system info, used by the `info` subcommand.
    pub async fn system_info(&self) -> Result<bollard::models::SystemInfo, DockerError> {
        self.client.info().await.map_err(DockerError::from)
    }

    pub async fn server_version(&self) -> Result<bollard::models::SystemVersion, DockerError> {
        self.client.version().await.map_err(DockerError::from)
    }
}
