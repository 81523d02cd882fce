//! Full label-decode error taxonomy. Grounded verbatim on
//! `label/const_errors.go`'s sixteen sentinel errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid metric label: expected `metric.<name>.<suffix>`")]
    InvalidMetricLabel,
    #[error("metric {0:?} has no type label")]
    NoType(String),
    #[error("metric {0:?} has unknown type {1:?}")]
    UnknownType(String, String),
    #[error("metric {0:?} has no kind label")]
    NoKind(String),
    #[error("metric {0:?} has unknown kind {1:?}")]
    UnknownKind(String, String),
    #[error("metric {0:?} has the wrong kind for its type")]
    WrongKind(String),
    #[error("prometheus metric {0:?} has no endpoint label")]
    NoPrometheusEndpoint(String),
    #[error("metric {0:?} has an invalid http URL: {1:?}")]
    InvalidHttpUrl(String, String),
    #[error("prometheus metric {0:?} has no metric name label")]
    NoPrometheusMetricName(String),
    #[error("metric {0:?} has an unknown aggregation method {1:?}")]
    UnknownAggregationMethod(String, String),
    #[error("metric {0:?} has no target value")]
    NoValue(String),
    #[error("metric {0:?} has an invalid float value {1:?}")]
    InvalidFloat(String, String),
    #[error("metric {0:?} has an invalid deviation {1:?}")]
    InvalidDeviation(String, String),
    #[error("label {0:?} has an invalid duration {1:?}")]
    InvalidDuration(String, String),
    #[error("label {0:?} has an invalid unsigned integer {1:?}")]
    InvalidUnsignedInteger(String, String),
    #[error("metric {0:?} duplicates an earlier metric")]
    DuplicateMetric(String),
    #[error("service declares no metrics")]
    NoMetrics,
}
