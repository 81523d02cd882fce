//! Swarm domain — the orchestrator client surface the control loop depends
//! on: service listing/inspection, optimistic-concurrency updates, task
//! listing for replica counts, and swarm role detection.

use super::client::{DockerClient, DockerError, SwarmInspectResult};
use bollard::models::{Service, ServiceSpec, ServiceUpdateResponse, Task};
use bollard::query_parameters::{ListServicesOptionsBuilder, ListTasksOptionsBuilder};

impl DockerClient {
    /// Get swarm information. Distinguishes manager, worker, and not-in-swarm.
    pub async fn swarm_inspect(&self) -> Result<SwarmInspectResult, DockerError> {
        match self.client.inspect_swarm().await {
            Ok(swarm) => Ok(SwarmInspectResult::Manager(swarm)),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 503, ..
            }) => Ok(SwarmInspectResult::Worker),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 406, ..
            }) => Ok(SwarmInspectResult::NotInSwarm),
            Err(e) => Err(DockerError::from(e)),
        }
    }

    /// List services carrying the given label selector (e.g. `de.mtneug.spate.enable=enable`).
    pub async fn list_services(&self, label_filter: &str) -> Result<Vec<Service>, DockerError> {
        let options = ListServicesOptionsBuilder::default()
            .filters(&std::collections::HashMap::from([(
                "label".to_string(),
                vec![label_filter.to_string()],
            )]))
            .build();
        match self.client.list_services(Some(options)).await {
            Ok(services) => Ok(services),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 503, ..
            }) => Err(DockerError::NotSwarmManager),
            Err(e) => Err(DockerError::from(e)),
        }
    }

    pub async fn inspect_service(&self, service_id: &str) -> Result<Service, DockerError> {
        match self.client.inspect_service(service_id, None).await {
            Ok(service) => Ok(service),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 503, ..
            }) => Err(DockerError::NotSwarmManager),
            Err(e) => Err(DockerError::from(e)),
        }
    }

    /// List tasks belonging to a single service, used to count running replicas.
    pub async fn list_tasks_for_service(&self, service_id: &str) -> Result<Vec<Task>, DockerError> {
        let options = ListTasksOptionsBuilder::default()
            .filters(&std::collections::HashMap::from([(
                "service".to_string(),
                vec![service_id.to_string()],
            )]))
            .build();
        match self.client.list_tasks(Some(options)).await {
            Ok(tasks) => Ok(tasks),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 503, ..
            }) => Err(DockerError::NotSwarmManager),
            Err(e) => Err(DockerError::from(e)),
        }
    }

    /// Update a service's spec, enforcing optimistic concurrency on `version`.
    pub async fn update_service(
        &self,
        service_id: &str,
        spec: ServiceSpec,
        version: u64,
    ) -> Result<ServiceUpdateResponse, DockerError> {
        use bollard::query_parameters::UpdateServiceOptions;

        let version_i64 = i64::try_from(version).map_err(|_| {
            DockerError::ConnectionFailed(format!(
                "service version index {version} exceeds i64::MAX"
            ))
        })?;
        let opts = UpdateServiceOptions {
            version: version_i64,
            ..Default::default()
        };

        self.client
            .update_service(service_id, spec, opts, None)
            .await
            .map_err(DockerError::from)
    }
}
