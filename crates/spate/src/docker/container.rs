//! Container domain — one-shot stats snapshots.
//!
//! Spate never manages containers directly; it only needs a single
//! CPU/memory utilization sample per replica. Replica addresses are
//! resolved via `list_tasks_for_service`'s network attachments, not by
//! listing containers.

use super::client::{DockerClient, DockerError};
use bollard::models::ContainerStatsResponse;
use bollard::query_parameters::StatsOptionsBuilder;
use futures_util::StreamExt;

impl DockerClient {
    /// Take a single stats snapshot (no streaming) for one container.
    pub async fn stats_once(
        &self,
        container_id: &str,
    ) -> Result<ContainerStatsResponse, DockerError> {
        let options = Some(StatsOptionsBuilder::default().stream(false).build());
        let mut stream = self.client.stats(container_id, options);
        match stream.next().await {
            Some(Ok(stats)) => Ok(stats),
            Some(Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                ..
            })) => Err(DockerError::ContainerNotFound(container_id.to_string())),
            Some(Err(e)) => Err(DockerError::from(e)),
            None => Err(DockerError::StreamClosed),
        }
    }
}
