//! Per-service control loop (spec §4.5). Grounded on the upstream
//! `autoscaler`/`scaler` stubs' use of `startstopper.StartStopper` plus the
//! teacher's `AgentState`-style `RwLock`-guarded shared state
//! (`state/agent.rs`) for the snapshot/cooldown interplay.

use crate::docker::Orchestrator;
use crate::label::{AutoscalerConfig, Cooldowns, DecodeError, GoalConfig, ServiceSnapshot};
use crate::lifecycle::{self, Group, Lifecycle};
use crate::measurer::Measurer;
use crate::metrics::Metrics;
use crate::observer::Observer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum Error {
    #[error("autoscaler configuration has no goals")]
    NoGoals,
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Docker(#[from] crate::docker::DockerError),
    #[error(transparent)]
    Lifecycle(#[from] lifecycle::Error),
}

struct Goal {
    name: String,
    observer: Arc<Observer>,
    target: crate::metric::Target,
}

/// Per-service control loop. `update_flag` distinguishes a freshly created
/// autoscaler from one that replaced a prior version of the same service
/// (selects which initial cooldown applies).
pub struct Autoscaler {
    service_id: String,
    docker: Arc<dyn Orchestrator>,
    goals: Vec<Goal>,
    observer_group: Group,
    period: Duration,
    cooldowns: Cooldowns,
    update_flag: bool,
    replicas_min: u64,
    replicas_max: u64,
    snapshot: RwLock<ServiceSnapshot>,
    last_scale_call_version: AtomicU64,
    metrics: Arc<Metrics>,
}

impl Autoscaler {
    pub fn build(
        docker: Arc<dyn Orchestrator>,
        service: ServiceSnapshot,
        config: AutoscalerConfig,
        update_flag: bool,
        metrics: Arc<Metrics>,
    ) -> Result<Self, Error> {
        if config.goals.is_empty() {
            return Err(Error::NoGoals);
        }

        let service_id = service.id.clone();
        let mut goals = Vec::with_capacity(config.goals.len());
        let mut observer_lifecycles = Vec::with_capacity(config.goals.len());

        for GoalConfig {
            observer_period,
            aggregation_method,
            aggregation_amount,
            metric,
            target,
        } in config.goals
        {
            let name = metric.name.clone();
            let measurer = Measurer::new(docker.clone(), service_id.clone(), metric);
            let observer = Arc::new(Observer::new(
                measurer,
                aggregation_method.into(),
                observer_period,
                aggregation_amount,
                metrics.clone(),
            ));
            let obs_for_runner = observer.clone();
            observer_lifecycles.push(Lifecycle::new(Box::new(move |cancel| {
                let obs = obs_for_runner.clone();
                Box::pin(async move {
                    obs.run(cancel).await;
                    Ok(())
                })
            })));
            goals.push(Goal {
                name,
                observer,
                target,
            });
        }

        Ok(Self {
            service_id,
            docker,
            goals,
            observer_group: Group::new(observer_lifecycles),
            period: config.period,
            cooldowns: config.cooldowns,
            update_flag,
            replicas_min: config.replicas_min,
            replicas_max: config.replicas_max,
            snapshot: RwLock::new(service),
            last_scale_call_version: AtomicU64::new(0),
            metrics,
        })
    }

    /// Read-only snapshot access for the change producer.
    pub async fn version_index(&self) -> u64 {
        self.snapshot.read().await.version_index
    }

    /// The last-known snapshot of the service this autoscaler manages, read
    /// under the shared lock. Used by the producer to emit `deleted` events
    /// carrying real data instead of a fabricated empty snapshot.
    pub async fn snapshot(&self) -> ServiceSnapshot {
        self.snapshot.read().await.clone()
    }

    async fn refresh_snapshot_from(&self, snapshot: ServiceSnapshot) {
        *self.snapshot.write().await = snapshot;
    }

    /// One tick of the control loop (spec §4.5 steps 1-10), run under the
    /// implicit exclusive access of `run`'s single-task loop. The post-scale
    /// cooldown races against `cancel` just like the initial cooldown in
    /// `run`, so shutdown never stalls behind a pending cooldown.
    async fn tick(&self, cancel: &CancellationToken) {
        let service = match self.docker.inspect_service(&self.service_id).await {
            Ok(s) => s,
            Err(e) => {
                warn!(service = %self.service_id, error = %e, "tick: inspect_service failed, aborting");
                return;
            }
        };

        let Some(mode) = service.spec.as_ref().and_then(|s| s.mode.as_ref()) else {
            debug!(service = %self.service_id, "tick: service has no mode spec, aborting");
            return;
        };
        let Some(replicated) = mode.replicated.as_ref() else {
            debug!(service = %self.service_id, "tick: service is not in replicated mode, aborting");
            return;
        };
        let current = replicated.replicas.unwrap_or(0) as u64;
        if current == 0 {
            debug!(service = %self.service_id, "tick: service has zero replicas, aborting");
            return;
        }

        let mut desired = self.replicas_min;
        let mut satisfied = false;
        for goal in &self.goals {
            let aggregate = match goal.observer.aggregated_value().await {
                Ok(v) => v,
                Err(_) => {
                    debug!(
                        service = %self.service_id, goal = %goal.name,
                        "tick: observer window empty, aborting"
                    );
                    return;
                }
            };

            if goal.target.is_satisfied(aggregate, current) {
                satisfied = true;
                break;
            }
            desired = desired.max(goal.target.desired_replicas(aggregate));
        }
        if satisfied {
            return;
        }

        let new_scale = desired.min(self.replicas_max);
        if new_scale == current {
            return;
        }

        let Some(version) = service.version.as_ref().and_then(|v| v.index) else {
            warn!(service = %self.service_id, "tick: service has no version, aborting");
            return;
        };
        let mut spec = service.spec.clone().unwrap_or_default();
        if let Some(m) = spec.mode.as_mut().and_then(|m| m.replicated.as_mut()) {
            m.replicas = Some(new_scale as i64);
        }

        if let Err(e) = self
            .docker
            .update_service(&self.service_id, spec, version as u64)
            .await
        {
            warn!(service = %self.service_id, error = %e, "tick: update_service failed, aborting");
            return;
        }
        self.last_scale_call_version
            .store(version as u64, Ordering::SeqCst);

        if new_scale > current {
            self.metrics.scale_ups_total.inc();
        } else {
            self.metrics.scale_downs_total.inc();
        }

        info!(
            service = %self.service_id, from = current, to = new_scale,
            "scaled service"
        );

        if let Ok(refreshed) = self.docker.inspect_service(&self.service_id).await {
            let snapshot = ServiceSnapshot {
                id: self.service_id.clone(),
                name: refreshed
                    .spec
                    .as_ref()
                    .and_then(|s| s.name.clone())
                    .unwrap_or_default(),
                version_index: refreshed.version.as_ref().and_then(|v| v.index).unwrap_or(0) as u64,
                replicas: Some(new_scale),
                labels: self.snapshot.read().await.labels.clone(),
            };
            self.refresh_snapshot_from(snapshot).await;
        }

        let cooldown = if new_scale > current {
            self.cooldowns.scaled_up
        } else {
            self.cooldowns.scaled_down
        };
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(cooldown) => {}
        }
    }

    /// Runs until `cancel` fires: start observers, wait out the initial
    /// cooldown, then tick forever at `period`. The initial cooldown and
    /// every inter-tick sleep are preemptible by `cancel`.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        if let Err(errs) = self.observer_group.start().await {
            warn!(service = %self.service_id, errors = ?errs, "failed to start one or more observers");
        }

        let initial_cooldown = if self.update_flag {
            self.cooldowns.service_updated
        } else {
            self.cooldowns.service_added
        };
        tokio::select! {
            _ = cancel.cancelled() => { let _ = self.observer_group.stop().await; return; }
            _ = tokio::time::sleep(initial_cooldown) => {}
        }

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = self.observer_group.stop().await;
                    return;
                }
                _ = interval.tick() => {
                    self.tick(&cancel).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::fake::FakeOrchestrator;
    use crate::metric::{AggregationMethod, Metric, Spec, Target};
    use bollard::models::{
        ObjectVersion, Service, ServiceSpec, ServiceSpecMode, ServiceSpecModeReplicated,
    };
    use std::collections::HashMap;

    fn seeded_service(id: &str, replicas: i64, version: i64) -> Service {
        Service {
            id: Some(id.to_string()),
            version: Some(ObjectVersion {
                index: Some(version),
            }),
            spec: Some(ServiceSpec {
                name: Some("svc".to_string()),
                mode: Some(ServiceSpecMode {
                    replicated: Some(ServiceSpecModeReplicated {
                        replicas: Some(replicas),
                    }),
                    ..Default::default()
                }),
                labels: Some(HashMap::new()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn snapshot(id: &str, version: u64, replicas: u64) -> ServiceSnapshot {
        ServiceSnapshot {
            id: id.to_string(),
            name: "svc".to_string(),
            version_index: version,
            replicas: Some(replicas),
            labels: HashMap::new(),
        }
    }

    fn single_goal_config(target_value: f64) -> AutoscalerConfig {
        AutoscalerConfig {
            period: Duration::from_secs(3600),
            cooldowns: Cooldowns {
                service_added: Duration::ZERO,
                service_updated: Duration::ZERO,
                scaled_up: Duration::ZERO,
                scaled_down: Duration::ZERO,
            },
            replicas_min: 1,
            replicas_max: 10,
            goals: vec![GoalConfig {
                observer_period: Duration::from_secs(3600),
                aggregation_method: AggregationMethod::Avg,
                aggregation_amount: 1,
                metric: Metric {
                    id: uuid::Uuid::new_v4(),
                    name: "cpu".to_string(),
                    spec: Spec::Cpu,
                },
                target: Target {
                    value: target_value,
                    deviation_lower: 0.0,
                    deviation_upper: 0.0,
                },
            }],
        }
    }

    #[tokio::test]
    async fn tick_scales_up_when_goal_unsatisfied() {
        let docker = Arc::new(FakeOrchestrator::new());
        docker.seed_service(seeded_service("svc1", 2, 1)).await;

        let autoscaler = Autoscaler::build(
            docker.clone(),
            snapshot("svc1", 1, 2),
            single_goal_config(0.5),
            false,
            Arc::new(Metrics::new()),
        )
        .unwrap();
        // 1.8 aggregate / 2 replicas = 0.9, above the 0.5 target -> scale up.
        autoscaler.goals[0].observer.seed(1.8).await;

        let cancel = CancellationToken::new();
        autoscaler.tick(&cancel).await;

        assert_eq!(docker.replicas_of("svc1").await, Some(4));
    }

    #[tokio::test]
    async fn tick_is_a_noop_when_goal_already_satisfied() {
        let docker = Arc::new(FakeOrchestrator::new());
        docker.seed_service(seeded_service("svc1", 2, 1)).await;

        let autoscaler = Autoscaler::build(
            docker.clone(),
            snapshot("svc1", 1, 2),
            single_goal_config(0.5),
            false,
            Arc::new(Metrics::new()),
        )
        .unwrap();
        // 1.0 aggregate / 2 replicas = 0.5, exactly the target -> satisfied.
        autoscaler.goals[0].observer.seed(1.0).await;

        let cancel = CancellationToken::new();
        autoscaler.tick(&cancel).await;

        assert_eq!(docker.replicas_of("svc1").await, Some(2));
    }

    #[test]
    fn goal_short_circuits_on_first_satisfied() {
        // Mirrors scenario 3 from spec §8: CPU satisfied, memory would
        // demand more but must never be consulted.
        let cpu = Target {
            value: 0.8,
            deviation_lower: 0.0,
            deviation_upper: 0.0,
        };
        assert!(cpu.is_satisfied(3.2, 4)); // 3.2/4 - 0.8 == 0
    }

    #[test]
    fn bounded_by_min_replicas() {
        let t = Target {
            value: 10.0,
            deviation_lower: 0.0,
            deviation_upper: 0.0,
        };
        // A goal demanding only 1 replica never drags the scale below min;
        // min-application happens in `tick`'s `desired = replicas_min.max(..)`.
        assert_eq!(t.desired_replicas(1.0), 1);
    }
}
