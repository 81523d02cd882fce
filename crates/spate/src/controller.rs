//! Top-level controller (spec §4.8). Grounded on `controller/controller.go`:
//! compose the change producer and event dispatcher as a group; on stop,
//! also stop every autoscaler still in the registry.

use crate::autoscaler::Autoscaler;
use crate::dispatcher::Dispatcher;
use crate::docker::Orchestrator;
use crate::label::Defaults;
use crate::lifecycle::{Group, Lifecycle, Registry};
use crate::metrics::Metrics;
use crate::producer::Producer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

pub struct Controller {
    group: Group,
    registry: Arc<Registry<Arc<Autoscaler>>>,
}

impl Controller {
    pub fn new(
        docker: Arc<dyn Orchestrator>,
        defaults: Arc<Defaults>,
        period: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        let registry: Arc<Registry<Arc<Autoscaler>>> = Arc::new(Registry::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let producer = Producer::new(docker.clone(), registry.clone(), tx, period, metrics.clone());
        let producer_lifecycle = Lifecycle::new(Box::new(move |cancel| {
            Box::pin(async move {
                producer.run(cancel).await;
                Ok(())
            })
        }));

        let dispatcher = Dispatcher::new(docker, defaults, registry.clone(), rx, metrics);
        let dispatcher_lifecycle = Lifecycle::new(Box::new(move |cancel| {
            Box::pin(async move {
                dispatcher.run(cancel).await;
                Ok(())
            })
        }));

        Self {
            group: Group::new(vec![producer_lifecycle, dispatcher_lifecycle]),
            registry,
        }
    }

    pub async fn start(&self) -> Result<(), Vec<crate::lifecycle::Error>> {
        self.group.start().await
    }

    pub async fn stop(&self) {
        if let Err(errs) = self.group.stop().await {
            warn!(errors = ?errs, "controller: errors stopping producer/dispatcher group");
        }
        let errs = self.registry.stop_all().await;
        if !errs.is_empty() {
            warn!(errors = ?errs, "controller: errors stopping remaining autoscalers");
        }
    }

    pub fn active_service_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::fake::FakeOrchestrator;
    use bollard::models::{
        ObjectVersion, Service, ServiceSpec, ServiceSpecMode, ServiceSpecModeReplicated,
    };
    use std::collections::HashMap;

    fn enabled_service(id: &str) -> Service {
        let mut labels = HashMap::new();
        labels.insert("de.mtneug.spate.enable".to_string(), "enable".to_string());
        labels.insert(
            "de.mtneug.spate.metric.cpu.type".to_string(),
            "cpu".to_string(),
        );
        Service {
            id: Some(id.to_string()),
            version: Some(ObjectVersion { index: Some(1) }),
            spec: Some(ServiceSpec {
                name: Some("svc".to_string()),
                labels: Some(labels),
                mode: Some(ServiceSpecMode {
                    replicated: Some(ServiceSpecModeReplicated { replicas: Some(2) }),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn controller_registers_an_autoscaler_for_an_enabled_service() {
        let docker = Arc::new(FakeOrchestrator::new());
        docker.seed_service(enabled_service("svc1")).await;
        let defaults = Arc::new(Defaults::default());
        let metrics = Arc::new(Metrics::new());
        let controller = Controller::new(docker, defaults, Duration::from_millis(20), metrics);

        controller.start().await.unwrap();

        let mut registered = false;
        for _ in 0..50 {
            if controller.active_service_count() == 1 {
                registered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(
            registered,
            "expected the service to be registered within the timeout"
        );

        controller.stop().await;
        assert_eq!(controller.active_service_count(), 0);
    }
}
