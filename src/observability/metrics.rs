//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `splunk_operator_reconciliations_total` - Total number of reconciliations
//! - `splunk_operator_reconciliation_errors_total` - Reconciliation errors by failing phase
//! - `splunk_operator_reconciliation_duration_seconds` - Duration of reconciliations
//! - `splunk_operator_deletions_total` - Deletions whose finalizers were all discharged
//! - `splunk_operator_finalizers_removed_total` - Finalizer tokens removed and persisted
//! - `splunk_operator_storage_claims_deleted_total` - PersistentVolumeClaims deleted during cleanup
//! - `splunk_operator_validation_failures_total` - Specs rejected by validation
//! - `splunk_operator_requeues_total` - Requeues by reason

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "splunk_operator_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "splunk_operator_reconciliation_errors_total",
            "Total number of reconciliation errors",
        ),
        &["phase"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "splunk_operator_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static DELETIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "splunk_operator_deletions_total",
        "Total number of SplunkEnterprise deletions completed",
    )
    .expect("Failed to create DELETIONS_TOTAL metric - this should never happen")
});

static FINALIZERS_REMOVED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "splunk_operator_finalizers_removed_total",
        "Total number of finalizer tokens removed",
    )
    .expect("Failed to create FINALIZERS_REMOVED_TOTAL metric - this should never happen")
});

static STORAGE_CLAIMS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "splunk_operator_storage_claims_deleted_total",
        "Total number of PersistentVolumeClaims deleted",
    )
    .expect("Failed to create STORAGE_CLAIMS_DELETED_TOTAL metric - this should never happen")
});

static VALIDATION_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "splunk_operator_validation_failures_total",
        "Total number of specs rejected by validation",
    )
    .expect("Failed to create VALIDATION_FAILURES_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("splunk_operator_requeues_total", "Total number of requeues"),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

/// Register every metric with the shared registry. Call once at startup.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(DELETIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FINALIZERS_REMOVED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORAGE_CLAIMS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VALIDATION_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

/// Text exposition of everything registered
pub fn gather_text() -> Result<String> {
    let encoder = prometheus::TextEncoder::new();
    Ok(encoder.encode_to_string(&REGISTRY.gather())?)
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors(phase: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[phase]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_deletions() {
    DELETIONS_TOTAL.inc();
}

pub fn increment_finalizers_removed() {
    FINALIZERS_REMOVED_TOTAL.inc();
}

pub fn increment_storage_claims_deleted() {
    STORAGE_CLAIMS_DELETED_TOTAL.inc();
}

pub fn increment_validation_failures() {
    VALIDATION_FAILURES_TOTAL.inc();
}

pub fn increment_requeues(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
