//! In-memory test double for [`Orchestrator`]. Grounded on the teacher's
//! `client::fake::FakeDocker`: seed state through builder methods, then
//! exercise the same trait the real bollard-backed client implements.

use super::orchestrator::Orchestrator;
use super::DockerError;
use bollard::models::{ContainerStatsResponse, Service, ServiceSpec, ServiceUpdateResponse, Task};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    services: HashMap<String, Service>,
    tasks: HashMap<String, Vec<Task>>,
    stats: HashMap<String, ContainerStatsResponse>,
    next_version: i64,
}

/// A fake orchestrator for deterministic testing. All methods operate on
/// in-memory state seeded through the `seed_*`/`set_*` builder methods.
pub struct FakeOrchestrator {
    inner: Mutex<Inner>,
}

impl FakeOrchestrator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_version: 1,
                ..Default::default()
            }),
        }
    }

    /// Seed (or replace) a service, keyed by its id.
    pub async fn seed_service(&self, service: Service) {
        let id = service.id.clone().expect("seeded service must carry an id");
        self.inner.lock().await.services.insert(id, service);
    }

    pub async fn remove_service(&self, service_id: &str) {
        self.inner.lock().await.services.remove(service_id);
    }

    /// Seed the running tasks backing a service's replicas.
    pub async fn seed_tasks(&self, service_id: &str, tasks: Vec<Task>) {
        self.inner
            .lock()
            .await
            .tasks
            .insert(service_id.to_string(), tasks);
    }

    /// Seed the stats snapshot returned for a given container id.
    pub async fn set_stats(&self, container_id: &str, stats: ContainerStatsResponse) {
        self.inner
            .lock()
            .await
            .stats
            .insert(container_id.to_string(), stats);
    }

    /// Current replica count for a seeded service, as last recorded by
    /// `update_service` — used by tests to assert on scale decisions.
    pub async fn replicas_of(&self, service_id: &str) -> Option<i64> {
        self.inner
            .lock()
            .await
            .services
            .get(service_id)
            .and_then(|s| s.spec.as_ref())
            .and_then(|s| s.mode.as_ref())
            .and_then(|m| m.replicated.as_ref())
            .and_then(|r| r.replicas)
    }
}

impl Default for FakeOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator for FakeOrchestrator {
    fn list_services<'a>(
        &'a self,
        label_filter: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Service>, DockerError>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.inner.lock().await;
            let (key, value) = label_filter
                .split_once('=')
                .unwrap_or((label_filter, ""));
            Ok(state
                .services
                .values()
                .filter(|s| {
                    s.spec
                        .as_ref()
                        .and_then(|spec| spec.labels.as_ref())
                        .and_then(|labels| labels.get(key))
                        .is_some_and(|v| v == value)
                })
                .cloned()
                .collect())
        })
    }

    fn inspect_service<'a>(
        &'a self,
        service_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Service, DockerError>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.inner.lock().await;
            state
                .services
                .get(service_id)
                .cloned()
                .ok_or_else(|| DockerError::ContainerNotFound(service_id.to_string()))
        })
    }

    fn update_service<'a>(
        &'a self,
        service_id: &'a str,
        spec: ServiceSpec,
        version: u64,
    ) -> Pin<Box<dyn Future<Output = Result<ServiceUpdateResponse, DockerError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            let Some(service) = state.services.get_mut(service_id) else {
                return Err(DockerError::ContainerNotFound(service_id.to_string()));
            };
            let current_version = service.version.as_ref().and_then(|v| v.index).unwrap_or(0);
            if current_version != version as i64 {
                return Err(DockerError::ConnectionFailed(
                    "version mismatch on update_service".to_string(),
                ));
            }
            let next_version = state.next_version;
            state.next_version += 1;
            let service = state.services.get_mut(service_id).unwrap();
            service.spec = Some(spec);
            service.version = Some(bollard::models::ObjectVersion {
                index: Some(current_version + next_version),
            });
            Ok(ServiceUpdateResponse { warnings: None })
        })
    }

    fn list_tasks_for_service<'a>(
        &'a self,
        service_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Task>, DockerError>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.inner.lock().await;
            Ok(state.tasks.get(service_id).cloned().unwrap_or_default())
        })
    }

    fn stats_once<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ContainerStatsResponse, DockerError>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.inner.lock().await;
            state
                .stats
                .get(container_id)
                .cloned()
                .ok_or_else(|| DockerError::ContainerNotFound(container_id.to_string()))
        })
    }
}
