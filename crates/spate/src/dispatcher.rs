//! Event dispatcher (spec §4.6). Grounded on `controller/event_loop.go`:
//! a single task draining an unbounded channel sequentially and applying
//! each event to the keyed registry of autoscalers. Unbounded rather than
//! a fixed depth-20 buffer, per spec §4.6's "queue depth ≥ 20" — a bounded
//! channel would make the producer's `send` block once the dispatcher
//! falls behind, which the spec rules out.

use crate::autoscaler::Autoscaler;
use crate::docker::Orchestrator;
use crate::event::{EventType, ServiceChangeEvent};
use crate::label::{self, Defaults};
use crate::lifecycle::{Lifecycle, Registry};
use crate::metrics::Metrics;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct Dispatcher {
    docker: Arc<dyn Orchestrator>,
    defaults: Arc<Defaults>,
    registry: Arc<Registry<Arc<Autoscaler>>>,
    events: mpsc::UnboundedReceiver<ServiceChangeEvent>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(
        docker: Arc<dyn Orchestrator>,
        defaults: Arc<Defaults>,
        registry: Arc<Registry<Arc<Autoscaler>>>,
        events: mpsc::UnboundedReceiver<ServiceChangeEvent>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            docker,
            defaults,
            registry,
            events,
            metrics,
        }
    }

    fn build_autoscaler(
        &self,
        service: crate::label::ServiceSnapshot,
        update_flag: bool,
    ) -> Option<Arc<Autoscaler>> {
        let service_id = service.id.clone();
        let config = match label::decode(&service, &self.defaults) {
            Ok(c) => c,
            Err(e) => {
                warn!(service = %service_id, error = %e, "label decode failed, skipping event");
                return None;
            }
        };
        match Autoscaler::build(
            self.docker.clone(),
            service,
            config,
            update_flag,
            self.metrics.clone(),
        ) {
            Ok(a) => Some(Arc::new(a)),
            Err(e) => {
                warn!(service = %service_id, error = %e, "failed to build autoscaler, skipping event");
                None
            }
        }
    }

    async fn apply(&self, event: ServiceChangeEvent) {
        let service_id = event.service.id.clone();
        match event.event_type {
            EventType::Created => {
                let Some(autoscaler) = self.build_autoscaler(event.service, false) else {
                    return;
                };
                let value = autoscaler.clone();
                let lifecycle = Lifecycle::new(Box::new(move |cancel| {
                    let a = autoscaler.clone();
                    Box::pin(async move {
                        a.run(cancel).await;
                        Ok(())
                    })
                }));
                match self
                    .registry
                    .add_and_start(service_id.clone(), lifecycle, value)
                    .await
                {
                    Ok(true) => debug!(service = %service_id, "autoscaler added"),
                    Ok(false) => debug!(service = %service_id, "autoscaler already registered"),
                    Err(e) => warn!(service = %service_id, error = %e, "failed to start autoscaler"),
                }
            }
            EventType::Updated => {
                let Some(autoscaler) = self.build_autoscaler(event.service, true) else {
                    return;
                };
                let value = autoscaler.clone();
                let lifecycle = Lifecycle::new(Box::new(move |cancel| {
                    let a = autoscaler.clone();
                    Box::pin(async move {
                        a.run(cancel).await;
                        Ok(())
                    })
                }));
                match self
                    .registry
                    .update_and_restart(service_id.clone(), lifecycle, value)
                    .await
                {
                    Ok(_) => debug!(service = %service_id, "autoscaler restarted"),
                    Err(e) => warn!(service = %service_id, error = %e, "failed to restart autoscaler"),
                }
            }
            EventType::Deleted => match self.registry.delete_and_stop(&service_id).await {
                Ok(_) => debug!(service = %service_id, "autoscaler stopped"),
                Err(e) => warn!(service = %service_id, error = %e, "failed to stop autoscaler"),
            },
        }
    }

    /// Drains events sequentially until the channel closes or `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                event = self.events.recv() => {
                    match event {
                        Some(event) => self.apply(event).await,
                        None => return,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::fake::FakeOrchestrator;
    use crate::label::ServiceSnapshot;
    use std::collections::HashMap;

    fn enabled_service(id: &str, version: u64) -> ServiceSnapshot {
        let mut labels = HashMap::new();
        labels.insert("de.mtneug.spate.enable".to_string(), "enable".to_string());
        labels.insert(
            "de.mtneug.spate.metric.cpu.type".to_string(),
            "cpu".to_string(),
        );
        ServiceSnapshot {
            id: id.to_string(),
            name: "svc".to_string(),
            version_index: version,
            replicas: Some(2),
            labels,
        }
    }

    fn test_dispatcher() -> (Dispatcher, Arc<Registry<Arc<Autoscaler>>>) {
        let docker: Arc<dyn Orchestrator> = Arc::new(FakeOrchestrator::new());
        let defaults = Arc::new(Defaults::default());
        let registry: Arc<Registry<Arc<Autoscaler>>> = Arc::new(Registry::new());
        let (_tx, rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(Metrics::new());
        let dispatcher = Dispatcher::new(docker, defaults, registry.clone(), rx, metrics);
        (dispatcher, registry)
    }

    #[tokio::test]
    async fn created_event_registers_an_autoscaler() {
        let (dispatcher, registry) = test_dispatcher();
        dispatcher
            .apply(ServiceChangeEvent::new(
                EventType::Created,
                enabled_service("svc1", 1),
            ))
            .await;
        assert!(registry.contains("svc1"));
        registry.stop_all().await;
    }

    #[tokio::test]
    async fn deleted_event_stops_and_removes_the_autoscaler() {
        let (dispatcher, registry) = test_dispatcher();
        dispatcher
            .apply(ServiceChangeEvent::new(
                EventType::Created,
                enabled_service("svc1", 1),
            ))
            .await;
        assert!(registry.contains("svc1"));

        dispatcher
            .apply(ServiceChangeEvent::new(
                EventType::Deleted,
                enabled_service("svc1", 1),
            ))
            .await;
        assert!(!registry.contains("svc1"));
    }

    #[tokio::test]
    async fn service_with_no_metric_labels_is_skipped() {
        let (dispatcher, registry) = test_dispatcher();
        let mut svc = enabled_service("svc2", 1);
        svc.labels
            .retain(|k, _| k == "de.mtneug.spate.enable");
        dispatcher
            .apply(ServiceChangeEvent::new(EventType::Created, svc))
            .await;
        assert!(!registry.contains("svc2"));
    }
}
