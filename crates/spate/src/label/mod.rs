//! Label decoder: service labels → fully populated autoscaler
//! configuration (spec §4.9). Grounded on `label/service.go`'s
//! `ExtractSpateLabels` (namespace stripping + `metric.<name>.<suffix>`
//! grouping) and `label/constructor.go`'s `ConstructAutoscaler` (the full
//! decode pipeline tying per-metric and autoscaler-level parsing together).

mod autoscaler;
mod error;
mod metric;

pub use autoscaler::{AutoscalerDefaults, Cooldowns};
pub use error::DecodeError;
pub use metric::MetricDefaults;

use crate::metric::Target;
use std::collections::HashMap;
use std::time::Duration;

const NAMESPACE: &str = "de.mtneug.spate.";
const ENABLE_SUFFIX: &str = "enable";

#[derive(Debug, Clone)]
pub struct ServiceSnapshot {
    pub id: String,
    pub name: String,
    pub version_index: u64,
    /// `None` if the service is not in replicated mode.
    pub replicas: Option<u64>,
    pub labels: HashMap<String, String>,
}

impl ServiceSnapshot {
    pub fn is_enabled(&self) -> bool {
        self.labels
            .get(&format!("{NAMESPACE}{ENABLE_SUFFIX}"))
            .is_some()
    }
}

pub struct GoalConfig {
    pub observer_period: Duration,
    pub aggregation_method: crate::metric::AggregationMethod,
    pub aggregation_amount: u8,
    pub metric: crate::metric::Metric,
    pub target: Target,
}

pub struct AutoscalerConfig {
    pub period: Duration,
    pub cooldowns: Cooldowns,
    pub replicas_min: u64,
    pub replicas_max: u64,
    pub goals: Vec<GoalConfig>,
}

pub struct Defaults {
    pub autoscaler: AutoscalerDefaults,
    pub metric: MetricDefaults,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            autoscaler: AutoscalerDefaults::default(),
            metric: MetricDefaults::default(),
        }
    }
}

/// Strip the spate namespace and split `metric.<name>.<suffix>` labels into
/// per-metric suffix maps; everything else is kept flat for
/// `autoscaler::parse_autoscaler`.
struct ExtractedLabels {
    autoscaler: HashMap<String, String>,
    metrics: HashMap<String, HashMap<String, String>>,
}

fn extract(labels: &HashMap<String, String>) -> Result<ExtractedLabels, DecodeError> {
    let mut autoscaler = HashMap::new();
    let mut metrics: HashMap<String, HashMap<String, String>> = HashMap::new();

    for (key, value) in labels {
        let Some(rest) = key.strip_prefix(NAMESPACE) else {
            continue;
        };
        if rest == ENABLE_SUFFIX {
            continue;
        }
        if let Some(metric_rest) = rest.strip_prefix("metric.") {
            let parts: Vec<&str> = metric_rest.splitn(2, '.').collect();
            if parts.len() != 2 {
                return Err(DecodeError::InvalidMetricLabel);
            }
            let name = parts[0].to_string();
            let suffix = parts[1].to_string();
            metrics.entry(name).or_default().insert(suffix, value.clone());
        } else {
            autoscaler.insert(rest.to_string(), value.clone());
        }
    }

    Ok(ExtractedLabels { autoscaler, metrics })
}

/// Decode a complete autoscaler configuration from a service's labels.
pub fn decode(
    service: &ServiceSnapshot,
    defaults: &Defaults,
) -> Result<AutoscalerConfig, DecodeError> {
    let extracted = extract(&service.labels)?;

    if extracted.metrics.is_empty() {
        return Err(DecodeError::NoMetrics);
    }

    let autoscaler_labels =
        autoscaler::parse_autoscaler(&extracted.autoscaler, &defaults.autoscaler)?;

    let mut goals = Vec::with_capacity(extracted.metrics.len());
    for (name, suffixes) in &extracted.metrics {
        let decoded = metric::parse_metric(name, suffixes, &defaults.metric)?;

        if goals
            .iter()
            .any(|g: &GoalConfig| g.metric.duplicate_of(&decoded.metric))
        {
            return Err(DecodeError::DuplicateMetric(name.clone()));
        }

        goals.push(GoalConfig {
            observer_period: decoded.observer_period,
            aggregation_method: decoded.aggregation_method,
            aggregation_amount: decoded.aggregation_amount,
            metric: decoded.metric,
            target: decoded.target,
        });
    }

    Ok(AutoscalerConfig {
        period: autoscaler_labels.period,
        cooldowns: autoscaler_labels.cooldowns,
        replicas_min: autoscaler_labels.replicas_min,
        replicas_max: autoscaler_labels.replicas_max,
        goals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_with(labels: &[(&str, &str)]) -> ServiceSnapshot {
        ServiceSnapshot {
            id: "svc1".into(),
            name: "svc".into(),
            version_index: 1,
            replicas: Some(2),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn no_metrics_fails() {
        let svc = service_with(&[("de.mtneug.spate.enable", "enable")]);
        let err = decode(&svc, &Defaults::default()).unwrap_err();
        assert_eq!(err, DecodeError::NoMetrics);
    }

    #[test]
    fn single_cpu_goal_decodes_with_defaults() {
        let svc = service_with(&[
            ("de.mtneug.spate.enable", "enable"),
            ("de.mtneug.spate.metric.cpu.type", "cpu"),
        ]);
        let config = decode(&svc, &Defaults::default()).unwrap();
        assert_eq!(config.goals.len(), 1);
        assert_eq!(config.replicas_min, 1);
        assert_eq!(config.goals[0].target.value, 0.8);
    }

    #[test]
    fn invalid_metric_label_shape_fails() {
        let svc = service_with(&[("de.mtneug.spate.metric.cpu", "oops")]);
        let err = decode(&svc, &Defaults::default()).unwrap_err();
        assert_eq!(err, DecodeError::InvalidMetricLabel);
    }

    #[test]
    fn duplicate_metrics_by_structural_equality_are_rejected() {
        let svc = service_with(&[
            ("de.mtneug.spate.metric.cpu_a.type", "cpu"),
            ("de.mtneug.spate.metric.cpu_b.type", "cpu"),
        ]);
        let err = decode(&svc, &Defaults::default()).unwrap_err();
        assert!(matches!(err, DecodeError::DuplicateMetric(_)));
    }
}
