//! Per-metric label parsing. Grounded on `label/metric.go`'s
//! `ParseMetric`/`parseCPUMetric`/`parseMemoryMetric`/`parsePrometheusMetric`,
//! extended with the aggregation/observer/target suffixes from
//! `label/observer.go` and `labels/target.go` (spec pulls these into the
//! same per-metric namespace, §4.9).

use super::error::DecodeError;
use crate::metric::{AggregationMethod, Kind, Metric, Spec, Target};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

pub struct MetricDefaults {
    pub aggregation_amount: u8,
    pub observer_period: Duration,
    pub aggregation_method: AggregationMethod,
}

impl Default for MetricDefaults {
    fn default() -> Self {
        Self {
            aggregation_amount: 5,
            observer_period: Duration::from_secs(30),
            aggregation_method: AggregationMethod::Avg,
        }
    }
}

pub struct DecodedMetric {
    pub metric: Metric,
    pub aggregation_method: AggregationMethod,
    pub aggregation_amount: u8,
    pub observer_period: Duration,
    pub target: Target,
}

/// `suffixes` maps the part of the label key after `metric.<name>.` to its
/// value, for exactly one metric named `name`.
pub fn parse_metric(
    name: &str,
    suffixes: &HashMap<String, String>,
    defaults: &MetricDefaults,
) -> Result<DecodedMetric, DecodeError> {
    let type_str = suffixes
        .get("type")
        .ok_or_else(|| DecodeError::NoType(name.to_string()))?;

    let (spec, default_target) = match type_str.as_str() {
        "cpu" => (parse_cpu_or_memory(name, suffixes, Spec::Cpu)?, Some(0.8)),
        "memory" => (
            parse_cpu_or_memory(name, suffixes, Spec::Memory)?,
            Some(0.8),
        ),
        "prometheus" => (parse_prometheus(name, suffixes)?, None),
        other => {
            return Err(DecodeError::UnknownType(name.to_string(), other.to_string()))
        }
    };

    let aggregation_method = match suffixes.get("aggregation.method").map(String::as_str) {
        None => defaults.aggregation_method,
        Some("max") => AggregationMethod::Max,
        Some("min") => AggregationMethod::Min,
        Some("avg") => AggregationMethod::Avg,
        Some("sum") => AggregationMethod::Sum,
        Some(other) => {
            return Err(DecodeError::UnknownAggregationMethod(
                name.to_string(),
                other.to_string(),
            ))
        }
    };

    let aggregation_amount = match suffixes.get("aggregation.amount") {
        None => defaults.aggregation_amount,
        Some(s) => s
            .parse()
            .map_err(|_| DecodeError::InvalidUnsignedInteger(name.to_string(), s.clone()))?,
    };

    let observer_period = match suffixes.get("observer.period") {
        None => defaults.observer_period,
        Some(s) => humantime::parse_duration(s)
            .map_err(|_| DecodeError::InvalidDuration(name.to_string(), s.clone()))?,
    };

    let target = parse_target(name, suffixes, default_target)?;

    Ok(DecodedMetric {
        metric: Metric {
            id: uuid::Uuid::new_v4(),
            name: name.to_string(),
            spec,
        },
        aggregation_method,
        aggregation_amount,
        observer_period,
        target,
    })
}

fn parse_cpu_or_memory(
    name: &str,
    suffixes: &HashMap<String, String>,
    spec: Spec,
) -> Result<Spec, DecodeError> {
    if let Some(kind_str) = suffixes.get("kind") {
        if kind_str != "replica" {
            return Err(DecodeError::WrongKind(name.to_string()));
        }
    }
    Ok(spec)
}

fn parse_prometheus(name: &str, suffixes: &HashMap<String, String>) -> Result<Spec, DecodeError> {
    let kind_str = suffixes
        .get("kind")
        .ok_or_else(|| DecodeError::NoKind(name.to_string()))?;
    let kind = match kind_str.as_str() {
        "replica" => Kind::Replica,
        "system" => Kind::System,
        other => {
            return Err(DecodeError::UnknownKind(name.to_string(), other.to_string()))
        }
    };

    let endpoint_str = suffixes
        .get("prometheus.endpoint")
        .ok_or_else(|| DecodeError::NoPrometheusEndpoint(name.to_string()))?;
    let endpoint = Url::parse(endpoint_str)
        .ok()
        .filter(|u| u.scheme() == "http")
        .ok_or_else(|| DecodeError::InvalidHttpUrl(name.to_string(), endpoint_str.clone()))?;

    let prom_name = suffixes
        .get("prometheus.name")
        .ok_or_else(|| DecodeError::NoPrometheusMetricName(name.to_string()))?;

    Ok(Spec::Prometheus {
        kind,
        endpoint,
        name: prom_name.clone(),
    })
}

/// Parses `target`, `target.deviation.lower`, `target.deviation.upper`.
/// Deviations may be given as a bare float or as a `N%` string, interpreted
/// as `(N/100) * |value|` (spec §3; not present in the Go source, which
/// never parses a percentage deviation).
fn parse_target(
    name: &str,
    suffixes: &HashMap<String, String>,
    default_value: Option<f64>,
) -> Result<Target, DecodeError> {
    let value = match suffixes.get("target") {
        Some(s) => {
            let value: f64 = s
                .parse()
                .map_err(|_| DecodeError::InvalidFloat(name.to_string(), s.clone()))?;
            if !value.is_finite() {
                return Err(DecodeError::InvalidFloat(name.to_string(), s.clone()));
            }
            value
        }
        None => default_value.ok_or_else(|| DecodeError::NoValue(name.to_string()))?,
    };

    let deviation_lower = parse_deviation(name, suffixes.get("target.deviation.lower"), value)?;
    let deviation_upper = parse_deviation(name, suffixes.get("target.deviation.upper"), value)?;

    Ok(Target {
        value,
        deviation_lower,
        deviation_upper,
    })
}

fn parse_deviation(
    name: &str,
    raw: Option<&String>,
    value: f64,
) -> Result<f64, DecodeError> {
    let Some(raw) = raw else {
        return Ok(0.0);
    };
    let deviation = if let Some(pct) = raw.strip_suffix('%') {
        let pct: f64 = pct
            .parse()
            .map_err(|_| DecodeError::InvalidDeviation(name.to_string(), raw.clone()))?;
        (pct / 100.0) * value.abs()
    } else {
        raw.parse()
            .map_err(|_| DecodeError::InvalidDeviation(name.to_string(), raw.clone()))?
    };
    if deviation.is_nan() || deviation < 0.0 {
        return Err(DecodeError::InvalidDeviation(name.to_string(), raw.clone()));
    }
    Ok(deviation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suffixes(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn cpu_metric_defaults_to_replica_kind_and_0_8_target() {
        let decoded = parse_metric("cpu", &suffixes(&[("type", "cpu")]), &MetricDefaults::default())
            .unwrap();
        assert_eq!(decoded.metric.spec, Spec::Cpu);
        assert_eq!(decoded.target.value, 0.8);
    }

    #[test]
    fn cpu_metric_with_explicit_non_replica_kind_fails() {
        let err = parse_metric(
            "cpu",
            &suffixes(&[("type", "cpu"), ("kind", "system")]),
            &MetricDefaults::default(),
        )
        .unwrap_err();
        assert_eq!(err, DecodeError::WrongKind("cpu".to_string()));
    }

    #[test]
    fn prometheus_requires_kind_endpoint_and_name() {
        let err = parse_metric(
            "p",
            &suffixes(&[("type", "prometheus")]),
            &MetricDefaults::default(),
        )
        .unwrap_err();
        assert_eq!(err, DecodeError::NoKind("p".to_string()));
    }

    #[test]
    fn prometheus_rejects_non_http_scheme() {
        let err = parse_metric(
            "p",
            &suffixes(&[
                ("type", "prometheus"),
                ("kind", "system"),
                ("prometheus.endpoint", "https://example.com/metrics"),
                ("prometheus.name", "foo"),
            ]),
            &MetricDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidHttpUrl(_, _)));
    }

    #[test]
    fn percentage_deviation_scales_by_target_value() {
        let decoded = parse_metric(
            "cpu",
            &suffixes(&[("type", "cpu"), ("target", "0.5"), ("target.deviation.upper", "10%")]),
            &MetricDefaults::default(),
        )
        .unwrap();
        assert_eq!(decoded.target.deviation_upper, 0.05);
    }

    #[test]
    fn non_finite_target_is_invalid() {
        let err = parse_metric(
            "cpu",
            &suffixes(&[("type", "cpu"), ("target", "NaN")]),
            &MetricDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidFloat(_, _)));
    }

    #[test]
    fn negative_deviation_is_invalid() {
        let err = parse_metric(
            "cpu",
            &suffixes(&[("type", "cpu"), ("target.deviation.lower", "-0.1")]),
            &MetricDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidDeviation(_, _)));
    }
}
