//! Process-wide metrics surface (component 10, external collaborator).
//! Grounded on `api/api.go`'s `prometheus.Handler()` mount and the
//! `other_examples` Kubernetes-operator pattern of serving a `Registry`'s
//! `TextEncoder` output behind a thin HTTP handler — here via `axum`
//! instead of `actix-web`/`warp`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

pub struct Metrics {
    pub registry: Registry,
    pub reconciles_total: IntCounter,
    pub scale_ups_total: IntCounter,
    pub scale_downs_total: IntCounter,
    pub measurement_failures_total: IntCounter,
    pub managed_services: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let reconciles_total =
            IntCounter::new("spate_reconciles_total", "Total reconcile ticks run").unwrap();
        let scale_ups_total =
            IntCounter::new("spate_scale_ups_total", "Total scale-up operations").unwrap();
        let scale_downs_total =
            IntCounter::new("spate_scale_downs_total", "Total scale-down operations").unwrap();
        let measurement_failures_total = IntCounter::new(
            "spate_measurement_failures_total",
            "Total failed metric measurements",
        )
        .unwrap();
        let managed_services = IntGauge::new(
            "spate_managed_services",
            "Number of services currently managed by an autoscaler",
        )
        .unwrap();

        registry
            .register(Box::new(reconciles_total.clone()))
            .unwrap();
        registry
            .register(Box::new(scale_ups_total.clone()))
            .unwrap();
        registry
            .register(Box::new(scale_downs_total.clone()))
            .unwrap();
        registry
            .register(Box::new(measurement_failures_total.clone()))
            .unwrap();
        registry
            .register(Box::new(managed_services.clone()))
            .unwrap();

        Self {
            registry,
            reconciles_total,
            scale_ups_total,
            scale_downs_total,
            measurement_failures_total,
            managed_services,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = metrics.registry.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    (
        StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_registers_without_panicking() {
        let m = Metrics::new();
        m.reconciles_total.inc();
        let families = m.registry.gather();
        assert!(!families.is_empty());
    }
}
