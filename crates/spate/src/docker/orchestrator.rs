//! Orchestrator trait — the surface the control loop depends on.
//! Grounded on the teacher's `client::docker::DockerOps`: an object-safe
//! trait returning boxed futures so a fake in-memory implementation can
//! stand in for `DockerClient` in tests without a running daemon.

use super::{DockerClient, DockerError};
use bollard::models::{ContainerStatsResponse, Service, ServiceSpec, ServiceUpdateResponse, Task};
use std::future::Future;
use std::pin::Pin;

pub trait Orchestrator: Send + Sync {
    fn list_services<'a>(
        &'a self,
        label_filter: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Service>, DockerError>> + Send + 'a>>;

    fn inspect_service<'a>(
        &'a self,
        service_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Service, DockerError>> + Send + 'a>>;

    fn update_service<'a>(
        &'a self,
        service_id: &'a str,
        spec: ServiceSpec,
        version: u64,
    ) -> Pin<Box<dyn Future<Output = Result<ServiceUpdateResponse, DockerError>> + Send + 'a>>;

    fn list_tasks_for_service<'a>(
        &'a self,
        service_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Task>, DockerError>> + Send + 'a>>;

    fn stats_once<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ContainerStatsResponse, DockerError>> + Send + 'a>>;
}

impl Orchestrator for DockerClient {
    fn list_services<'a>(
        &'a self,
        label_filter: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Service>, DockerError>> + Send + 'a>> {
        Box::pin(DockerClient::list_services(self, label_filter))
    }

    fn inspect_service<'a>(
        &'a self,
        service_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Service, DockerError>> + Send + 'a>> {
        Box::pin(DockerClient::inspect_service(self, service_id))
    }

    fn update_service<'a>(
        &'a self,
        service_id: &'a str,
        spec: ServiceSpec,
        version: u64,
    ) -> Pin<Box<dyn Future<Output = Result<ServiceUpdateResponse, DockerError>> + Send + 'a>> {
        Box::pin(DockerClient::update_service(self, service_id, spec, version))
    }

    fn list_tasks_for_service<'a>(
        &'a self,
        service_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Task>, DockerError>> + Send + 'a>> {
        Box::pin(DockerClient::list_tasks_for_service(self, service_id))
    }

    fn stats_once<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ContainerStatsResponse, DockerError>> + Send + 'a>> {
        Box::pin(DockerClient::stats_once(self, container_id))
    }
}
