//! Prometheus metrics for dispatch-service.

use once_cell::sync::Lazy;
use prometheus::{
    CounterVec, Encoder, HistogramVec, IntCounter, TextEncoder, register_counter_vec,
    register_histogram_vec, register_int_counter,
};

/// Counter for sync cycles by outcome.
pub static SYNC_CYCLES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dispatch_sync_cycles_total",
        "Total number of sync cycles",
        &["outcome"]
    )
    .expect("Failed to register SYNC_CYCLES")
});

/// Counter for vouchers upserted per cycle, by entity type.
pub static VOUCHERS_SYNCED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dispatch_vouchers_synced_total",
        "Total number of vouchers upserted from the upstream source",
        &["entity"]
    )
    .expect("Failed to register VOUCHERS_SYNCED")
});

/// Counter for malformed upstream records dropped during normalization.
pub static VOUCHERS_SKIPPED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dispatch_vouchers_skipped_total",
        "Total number of malformed upstream records skipped",
        &["entity"]
    )
    .expect("Failed to register VOUCHERS_SKIPPED")
});

/// Counter for receipts linked to bills, by mapping method.
pub static RECEIPTS_MAPPED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dispatch_receipts_mapped_total",
        "Total number of receipts linked to bills",
        &["method"]
    )
    .expect("Failed to register RECEIPTS_MAPPED")
});

/// Counter for voucher dates that fell back to the current date.
pub static DATE_FALLBACKS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "dispatch_date_fallbacks_total",
        "Total number of unparsable voucher dates replaced with the current date"
    )
    .expect("Failed to register DATE_FALLBACKS")
});

/// Counter for release attempts by variant and outcome.
pub static RELEASES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dispatch_releases_total",
        "Total number of release attempts",
        &["variant", "outcome"]
    )
    .expect("Failed to register RELEASES")
});

/// Counter for source probes by resulting connection method.
pub static SOURCE_PROBES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dispatch_source_probes_total",
        "Total number of upstream probes",
        &["method"]
    )
    .expect("Failed to register SOURCE_PROBES")
});

/// Histogram for database query duration.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "dispatch_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dispatch_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&SYNC_CYCLES);
    Lazy::force(&VOUCHERS_SYNCED);
    Lazy::force(&VOUCHERS_SKIPPED);
    Lazy::force(&RECEIPTS_MAPPED);
    Lazy::force(&DATE_FALLBACKS);
    Lazy::force(&RELEASES);
    Lazy::force(&SOURCE_PROBES);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Record a completed, skipped, or failed sync cycle.
pub fn record_sync_cycle(outcome: &str) {
    SYNC_CYCLES.with_label_values(&[outcome]).inc();
}

/// Record upserted vouchers for one entity type.
pub fn record_vouchers_synced(entity: &str, count: u64) {
    VOUCHERS_SYNCED
        .with_label_values(&[entity])
        .inc_by(count as f64);
}

/// Record skipped malformed records for one entity type.
pub fn record_vouchers_skipped(entity: &str, count: u64) {
    VOUCHERS_SKIPPED
        .with_label_values(&[entity])
        .inc_by(count as f64);
}

/// Record a receipt-to-bill link.
pub fn record_receipt_mapped(method: &str) {
    RECEIPTS_MAPPED.with_label_values(&[method]).inc();
}

/// Record a voucher date that fell back to the current date.
pub fn record_date_fallback() {
    DATE_FALLBACKS.inc();
}

/// Record a release attempt.
pub fn record_release(variant: &str, outcome: &str) {
    RELEASES.with_label_values(&[variant, outcome]).inc();
}

/// Record an upstream probe outcome.
pub fn record_source_probe(method: &str) {
    SOURCE_PROBES.with_label_values(&[method]).inc();
}

/// Record an error.
pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
