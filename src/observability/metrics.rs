//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `cloudsecret_reconciliations_total` - Total number of reconciliations
//! - `cloudsecret_reconciliation_errors_total` - Reconciliations that ended with a store error
//! - `cloudsecret_reconciliation_duration_seconds` - Duration of reconciliations
//! - `cloudsecret_child_secret_operations_total` - Managed Secret writes by operation
//! - `cloudsecret_references_resolved_total` - References resolved successfully
//! - `cloudsecret_reference_failures_total` - Reference resolution failures by error kind
//! - `cloudsecret_requeues_total` - Requeues by reason
//! - `cloudsecret_provider_operations_total` - Provider API calls by provider
//! - `cloudsecret_provider_operation_duration_seconds` - Provider API call duration by provider
//! - `cloudsecret_provider_retries_total` - Provider retries after transient failures

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cloudsecret_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cloudsecret_reconciliation_errors_total",
        "Total number of reconciliations that failed with a store error",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "cloudsecret_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static CHILD_SECRET_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloudsecret_child_secret_operations_total",
            "Total number of managed Secret writes by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create CHILD_SECRET_OPERATIONS_TOTAL metric - this should never happen")
});

static REFERENCES_RESOLVED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cloudsecret_references_resolved_total",
        "Total number of references resolved successfully",
    )
    .expect("Failed to create REFERENCES_RESOLVED_TOTAL metric - this should never happen")
});

static REFERENCE_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloudsecret_reference_failures_total",
            "Total number of reference resolution failures by error kind",
        ),
        &["kind"],
    )
    .expect("Failed to create REFERENCE_FAILURES_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloudsecret_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static PROVIDER_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloudsecret_provider_operations_total",
            "Total number of provider operations by provider type",
        ),
        &["provider"],
    )
    .expect("Failed to create PROVIDER_OPERATIONS_TOTAL metric - this should never happen")
});

static PROVIDER_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "cloudsecret_provider_operation_duration_seconds",
            "Duration of provider operations in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["provider"],
    )
    .expect("Failed to create PROVIDER_OPERATION_DURATION metric - this should never happen")
});

static PROVIDER_RETRIES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloudsecret_provider_retries_total",
            "Total number of provider retries after transient failures",
        ),
        &["provider"],
    )
    .expect("Failed to create PROVIDER_RETRIES_TOTAL metric - this should never happen")
});

/// Register all metrics with the global registry
///
/// # Errors
/// Fails if a metric is registered twice.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(CHILD_SECRET_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REFERENCES_RESOLVED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REFERENCE_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_RETRIES_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

/// Record a write to a managed Secret (`create`, `update` or `delete`)
pub fn increment_child_secret_operation(operation: &str) {
    CHILD_SECRET_OPERATIONS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn increment_references_resolved(count: u64) {
    REFERENCES_RESOLVED_TOTAL.inc_by(count);
}

pub fn increment_reference_failures(kind: &str) {
    REFERENCE_FAILURES_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a provider API call and its duration
pub fn record_provider_operation(provider: &str, duration: f64) {
    PROVIDER_OPERATIONS_TOTAL
        .with_label_values(&[provider])
        .inc();
    PROVIDER_OPERATION_DURATION
        .with_label_values(&[provider])
        .observe(duration);
}

pub fn increment_provider_retries(provider: &str) {
    PROVIDER_RETRIES_TOTAL.with_label_values(&[provider]).inc();
}
