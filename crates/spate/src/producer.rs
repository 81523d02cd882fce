//! Change producer (spec §4.7). Grounded on
//! `controller/change_loop.go`/`service_event_publisher.go`: list enabled
//! services, diff against the registry with a reusable "seen" set, emit
//! created/updated/deleted events.

use crate::autoscaler::Autoscaler;
use crate::docker::Orchestrator;
use crate::event::{EventType, ServiceChangeEvent};
use crate::label::ServiceSnapshot;
use crate::lifecycle::Registry;
use crate::metrics::Metrics;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const ENABLE_LABEL: &str = "de.mtneug.spate.enable=enable";

pub struct Producer {
    docker: Arc<dyn Orchestrator>,
    registry: Arc<Registry<Arc<Autoscaler>>>,
    events: mpsc::UnboundedSender<ServiceChangeEvent>,
    period: Duration,
    metrics: Arc<Metrics>,
}

impl Producer {
    pub fn new(
        docker: Arc<dyn Orchestrator>,
        registry: Arc<Registry<Arc<Autoscaler>>>,
        events: mpsc::UnboundedSender<ServiceChangeEvent>,
        period: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            docker,
            registry,
            events,
            period,
            metrics,
        }
    }

    async fn reconcile(&self, seen: &mut HashSet<String>) {
        self.metrics.reconciles_total.inc();
        seen.clear();

        let services = match self.docker.list_services(ENABLE_LABEL).await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "producer: list_services failed, skipping this round");
                return;
            }
        };

        for service in services {
            let Some(snapshot) = to_snapshot(&service) else {
                continue;
            };
            seen.insert(snapshot.id.clone());

            match self.registry.get(&snapshot.id) {
                None => {
                    let _ = self
                        .events
                        .send(ServiceChangeEvent::new(EventType::Created, snapshot));
                }
                Some(autoscaler) => {
                    if autoscaler.version_index().await < snapshot.version_index {
                        let _ = self
                            .events
                            .send(ServiceChangeEvent::new(EventType::Updated, snapshot));
                    }
                }
            }
        }

        for key in self.registry.keys() {
            if !seen.contains(&key) {
                // Spec §4.7 step 4: the deleted event carries the registered
                // service's last-known snapshot, read under the registry's
                // shared lock, not a fabricated empty one.
                let Some(autoscaler) = self.registry.get(&key) else {
                    continue;
                };
                let snapshot = autoscaler.snapshot().await;
                let _ = self
                    .events
                    .send(ServiceChangeEvent::new(EventType::Deleted, snapshot));
            }
        }

        self.metrics.managed_services.set(self.registry.len() as i64);
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut seen = HashSet::new();
        self.reconcile(&mut seen).await;

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = interval.tick() => self.reconcile(&mut seen).await,
            }
        }
    }
}

fn to_snapshot(service: &bollard::models::Service) -> Option<ServiceSnapshot> {
    let spec = service.spec.as_ref()?;
    let replicas = spec
        .mode
        .as_ref()
        .and_then(|m| m.replicated.as_ref())
        .and_then(|r| r.replicas)
        .map(|r| r as u64);
    Some(ServiceSnapshot {
        id: service.id.clone()?,
        name: spec.name.clone().unwrap_or_default(),
        version_index: service.version.as_ref().and_then(|v| v.index).unwrap_or(0) as u64,
        replicas,
        labels: spec.labels.clone().unwrap_or_default(),
    })
}
