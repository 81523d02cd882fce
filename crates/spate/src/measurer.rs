//! One-shot metric sampling. Grounded on `metric.Measurer`/`NewMeasurer`'s
//! three-way dispatch (CPU/Memory/Prometheus); the Go stubs themselves were
//! unimplemented (`panic("not implemented")`), so the sampling bodies here
//! are derived directly from spec §4.3 and from the teacher's
//! `docker/container.rs` stats-snapshot method.

use crate::docker::{DockerError, Orchestrator};
use crate::metric::{Kind, Metric, Spec};
use std::sync::Arc;
use thiserror::Error;

/// Fraction of expected samples that may fail before a Prometheus
/// measurement is abandoned outright (spec §4.3).
const CRITICAL_FAILURE_FRACTION: f64 = 0.5;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown metric type")]
    UnknownType,
    #[error("service has no running replicas to measure")]
    ContainerNotFound,
    #[error("prometheus series {0:?} not found in scrape response")]
    MetricNotFound(String),
    #[error("too many failed measurements: {failed}/{expected} requests failed")]
    TooManyFailedMeasurements { failed: usize, expected: usize },
    #[error(transparent)]
    Docker(#[from] DockerError),
}

pub struct Measurer {
    docker: Arc<dyn Orchestrator>,
    http: reqwest::Client,
    service_id: String,
    metric: Metric,
}

impl Measurer {
    pub fn new(docker: Arc<dyn Orchestrator>, service_id: String, metric: Metric) -> Self {
        Self {
            docker,
            http: reqwest::Client::new(),
            service_id,
            metric,
        }
    }

    pub async fn measure(&self) -> Result<f64, Error> {
        match &self.metric.spec {
            Spec::Cpu => self.measure_replica_utilization(cpu_utilization).await,
            Spec::Memory => self.measure_replica_utilization(memory_utilization).await,
            Spec::Prometheus {
                kind,
                endpoint,
                name,
            } => self.measure_prometheus(kind, endpoint, name).await,
        }
    }

    async fn measure_replica_utilization(
        &self,
        extract: fn(&bollard::models::ContainerStatsResponse) -> f64,
    ) -> Result<f64, Error> {
        let tasks = self.docker.list_tasks_for_service(&self.service_id).await?;
        let container_ids: Vec<String> = tasks
            .into_iter()
            .filter_map(|t| {
                t.status
                    .and_then(|s| s.container_status)
                    .and_then(|cs| cs.container_id)
            })
            .collect();
        if container_ids.is_empty() {
            return Err(Error::ContainerNotFound);
        }

        let mut total = 0.0;
        for id in container_ids {
            let stats = self.docker.stats_once(&id).await?;
            total += extract(&stats);
        }
        Ok(total)
    }

    async fn measure_prometheus(
        &self,
        kind: &Kind,
        endpoint: &url::Url,
        name: &str,
    ) -> Result<f64, Error> {
        let addresses = self.resolve_prometheus_targets(kind, endpoint).await?;
        let expected = addresses.len();

        let requests = addresses.into_iter().map(|addr| {
            let http = self.http.clone();
            let name = name.to_string();
            async move { scrape_one(&http, &addr, &name).await }
        });
        let results = futures_util::future::join_all(requests).await;

        let successes: Vec<f64> = results.into_iter().flatten().collect();
        let failed = expected - successes.len();
        if (failed as f64) > expected as f64 * CRITICAL_FAILURE_FRACTION {
            return Err(Error::TooManyFailedMeasurements {
                failed,
                expected,
            });
        }

        if successes.is_empty() {
            return Err(Error::MetricNotFound(name.to_string()));
        }

        let mean = crate::reducer::avg(&successes).expect("non-empty checked above");
        let imputed = failed as f64 * mean;
        Ok(crate::reducer::sum(&successes).expect("non-empty checked above") + imputed)
    }

    /// Resolve scrape target URLs. `system` kind scrapes the endpoint once;
    /// `replica` kind scrapes once per running task, substituting each
    /// replica's address when the configured host is `localhost`.
    async fn resolve_prometheus_targets(
        &self,
        kind: &Kind,
        endpoint: &url::Url,
    ) -> Result<Vec<url::Url>, Error> {
        match kind {
            Kind::System => Ok(vec![endpoint.clone()]),
            Kind::Replica => {
                let tasks = self.docker.list_tasks_for_service(&self.service_id).await?;
                let task_count = tasks.len();
                if task_count == 0 {
                    return Err(Error::ContainerNotFound);
                }

                if endpoint.host_str() == Some("localhost") {
                    let replica_ips: Vec<String> = tasks
                        .into_iter()
                        .filter_map(|t| t.network_attachments)
                        .flatten()
                        .filter_map(|na| na.addresses)
                        .flatten()
                        .filter_map(|addr| addr.split('/').next().map(str::to_string))
                        .collect();
                    if replica_ips.is_empty() {
                        return Err(Error::ContainerNotFound);
                    }
                    Ok(replica_ips
                        .iter()
                        .filter_map(|ip| {
                            let mut u = endpoint.clone();
                            u.set_host(Some(ip)).ok()?;
                            Some(u)
                        })
                        .collect())
                } else {
                    // M is the number of running tasks, not how many yielded a
                    // resolvable address — a task without network_attachments
                    // (host-mode networking) still counts once here.
                    Ok(std::iter::repeat(endpoint.clone()).take(task_count).collect())
                }
            }
        }
    }
}

async fn scrape_one(http: &reqwest::Client, url: &url::Url, name: &str) -> Option<f64> {
    let body = http.get(url.clone()).send().await.ok()?.text().await.ok()?;
    let lines = body.lines().map(|l| Ok(l.to_string()));
    let scrape = prometheus_parse::Scrape::parse(lines).ok()?;
    scrape
        .samples
        .into_iter()
        .find(|s| s.metric == name)
        .map(|s| match s.value {
            prometheus_parse::Value::Counter(v) => v,
            prometheus_parse::Value::Gauge(v) => v,
            prometheus_parse::Value::Untyped(v) => v,
            _ => 0.0,
        })
}

fn cpu_utilization(stats: &bollard::models::ContainerStatsResponse) -> f64 {
    let cpu = match &stats.cpu_stats {
        Some(c) => c,
        None => return 0.0,
    };
    let precpu = match &stats.precpu_stats {
        Some(c) => c,
        None => return 0.0,
    };
    let cpu_delta = cpu
        .cpu_usage
        .as_ref()
        .and_then(|u| u.total_usage)
        .unwrap_or(0) as f64
        - precpu
            .cpu_usage
            .as_ref()
            .and_then(|u| u.total_usage)
            .unwrap_or(0) as f64;
    let system_delta =
        cpu.system_cpu_usage.unwrap_or(0) as f64 - precpu.system_cpu_usage.unwrap_or(0) as f64;
    if system_delta <= 0.0 {
        return 0.0;
    }
    let online_cpus = cpu.online_cpus.unwrap_or(1).max(1) as f64;
    (cpu_delta / system_delta) * online_cpus
}

fn memory_utilization(stats: &bollard::models::ContainerStatsResponse) -> f64 {
    let mem = match &stats.memory_stats {
        Some(m) => m,
        None => return 0.0,
    };
    let usage = mem.usage.unwrap_or(0) as f64;
    let limit = mem.limit.unwrap_or(0) as f64;
    if limit <= 0.0 {
        0.0
    } else {
        usage / limit
    }
}
