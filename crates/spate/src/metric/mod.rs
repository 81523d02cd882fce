//! Core metric/target/goal data model (spec §3). Grounded on
//! `model`/`api/types`'s `Metric`/`MetricType`/`MetricKind` in the original
//! source, collapsed into a single tagged enum idiomatic for Rust instead
//! of a struct with optional sub-specs.

use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Replica,
    System,
}

/// A metric's type-specific configuration. CPU/Memory carry no extra data
/// (they are always `Kind::Replica`); Prometheus carries an endpoint, a
/// series name, and an explicit kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Spec {
    Cpu,
    Memory,
    Prometheus {
        kind: Kind,
        endpoint: Url,
        name: String,
    },
}

impl Spec {
    pub fn kind(&self) -> Kind {
        match self {
            Spec::Cpu | Spec::Memory => Kind::Replica,
            Spec::Prometheus { kind, .. } => kind.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub id: uuid::Uuid,
    pub name: String,
    pub spec: Spec,
}

impl Metric {
    /// Structural equality used by the label decoder's duplicate check:
    /// two metrics are duplicates if they agree on everything but id/name.
    pub fn duplicate_of(&self, other: &Metric) -> bool {
        self.spec == other.spec
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub value: f64,
    pub deviation_lower: f64,
    pub deviation_upper: f64,
}

impl Target {
    /// `true` if `aggregate / current_replicas` falls within the deviation
    /// band around `value` — the autoscaler's per-goal satisfaction check.
    pub fn is_satisfied(&self, aggregate: f64, current_replicas: u64) -> bool {
        let deviation = (aggregate / current_replicas as f64) - self.value;
        deviation >= -self.deviation_lower && deviation <= self.deviation_upper
    }

    /// `ceil(aggregate / value)`, the scale this goal alone would demand.
    pub fn desired_replicas(&self, aggregate: f64) -> u64 {
        (aggregate / self.value).ceil().max(0.0) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMethod {
    Max,
    Min,
    Avg,
    Sum,
}

impl From<AggregationMethod> for crate::reducer::Method {
    fn from(m: AggregationMethod) -> Self {
        match m {
            AggregationMethod::Max => crate::reducer::Method::Max,
            AggregationMethod::Min => crate::reducer::Method::Min,
            AggregationMethod::Avg => crate::reducer::Method::Avg,
            AggregationMethod::Sum => crate::reducer::Method::Sum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_satisfied_within_band() {
        let t = Target {
            value: 0.8,
            deviation_lower: 0.0,
            deviation_upper: 0.0,
        };
        assert!(t.is_satisfied(1.6, 2));
        assert!(!t.is_satisfied(2.4, 2));
    }

    #[test]
    fn desired_replicas_rounds_up() {
        let t = Target {
            value: 0.8,
            deviation_lower: 0.0,
            deviation_upper: 0.0,
        };
        assert_eq!(t.desired_replicas(2.4), 3);
    }

    #[test]
    fn duplicate_detection_ignores_id_and_name() {
        let a = Metric {
            id: uuid::Uuid::new_v4(),
            name: "cpu".into(),
            spec: Spec::Cpu,
        };
        let b = Metric {
            id: uuid::Uuid::new_v4(),
            name: "cpu2".into(),
            spec: Spec::Cpu,
        };
        assert!(a.duplicate_of(&b));
    }
}
