//! Métricas de despacho
//!
//! Contadores Prometheus propios del motor, registrados en un `Registry`
//! aislado para que varios motores (p.ej. en tests) no colisionen.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::utils::errors::{AppError, AppResult};

pub const OUTCOME_DISPATCHED: &str = "dispatched";
pub const OUTCOME_NO_VEHICLE: &str = "no_vehicle";
pub const OUTCOME_REJECTED: &str = "rejected";
pub const OUTCOME_ERROR: &str = "error";

#[derive(Clone)]
pub struct DispatchMetrics {
    registry: Registry,
    dispatch_outcomes: IntCounterVec,
    claim_conflicts: IntCounter,
    compensating_releases: IntCounter,
    reconciled_releases: IntCounter,
    notification_failures: IntCounter,
}

impl DispatchMetrics {
    pub fn new() -> AppResult<Self> {
        let registry = Registry::new_custom(Some("dispatch".to_string()), None)
            .map_err(metrics_error)?;

        let dispatch_outcomes = IntCounterVec::new(
            Opts::new("outcomes_total", "Dispatch attempts by final outcome"),
            &["outcome"],
        )
        .map_err(metrics_error)?;
        let claim_conflicts = IntCounter::new(
            "claim_conflicts_total",
            "Claims lost to a concurrent dispatch or an unavailable vehicle",
        )
        .map_err(metrics_error)?;
        let compensating_releases = IntCounter::new(
            "compensating_releases_total",
            "Vehicles released because the request could not be dispatched after the claim",
        )
        .map_err(metrics_error)?;
        let reconciled_releases = IntCounter::new(
            "reconciled_releases_total",
            "Unavailable vehicles with no active request returned to the fleet",
        )
        .map_err(metrics_error)?;
        let notification_failures = IntCounter::new(
            "notification_failures_total",
            "Notifications the gateway failed to deliver",
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(dispatch_outcomes.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(claim_conflicts.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(compensating_releases.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(reconciled_releases.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(notification_failures.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            dispatch_outcomes,
            claim_conflicts,
            compensating_releases,
            reconciled_releases,
            notification_failures,
        })
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.dispatch_outcomes.with_label_values(&[outcome]).inc();
    }

    pub fn outcome_count(&self, outcome: &str) -> u64 {
        self.dispatch_outcomes.with_label_values(&[outcome]).get()
    }

    pub fn record_claim_conflict(&self) {
        self.claim_conflicts.inc();
    }

    pub fn claim_conflicts(&self) -> u64 {
        self.claim_conflicts.get()
    }

    pub fn record_compensating_release(&self) {
        self.compensating_releases.inc();
    }

    pub fn compensating_releases(&self) -> u64 {
        self.compensating_releases.get()
    }

    pub fn record_reconciled_release(&self) {
        self.reconciled_releases.inc();
    }

    pub fn reconciled_releases(&self) -> u64 {
        self.reconciled_releases.get()
    }

    pub fn record_notification_failure(&self) {
        self.notification_failures.inc();
    }

    pub fn notification_failures(&self) -> u64 {
        self.notification_failures.get()
    }

    /// Formato de exposición de texto de Prometheus
    pub fn render(&self) -> AppResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| AppError::Internal(e.to_string()))
    }
}

fn metrics_error(e: prometheus::Error) -> AppError {
    AppError::Internal(format!("metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counters() {
        let metrics = DispatchMetrics::new().unwrap();
        metrics.record_outcome(OUTCOME_DISPATCHED);
        metrics.record_claim_conflict();

        let text = metrics.render().unwrap();
        assert!(text.contains("dispatch_outcomes_total{outcome=\"dispatched\"} 1"));
        assert!(text.contains("dispatch_claim_conflicts_total 1"));
        assert_eq!(metrics.outcome_count(OUTCOME_DISPATCHED), 1);
        assert_eq!(metrics.outcome_count(OUTCOME_NO_VEHICLE), 0);
    }

    #[test]
    fn test_independent_registries() {
        let a = DispatchMetrics::new().unwrap();
        let b = DispatchMetrics::new().unwrap();
        a.record_notification_failure();
        assert_eq!(a.notification_failures(), 1);
        assert_eq!(b.notification_failures(), 0);
    }
}
