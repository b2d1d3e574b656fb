use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::metrics::consts::{MEMOIZED_CACHE_HIT_COUNTER, MEMOIZED_INVALIDATIONS_COUNTER};

// Shorthand for common metric types
pub fn inc(name: &'static str, labels: &[(String, String)], value: u64) {
    metrics::counter!(name, labels).increment(value);
}

pub fn histogram(name: &'static str, labels: &[(String, String)], value: f64) {
    metrics::histogram!(name, labels).record(value);
}

/// Counts a memoized read, labelled by operation and whether the store answered it.
pub fn track_cache_access(op: &'static str, cache_hit: bool) {
    inc(
        MEMOIZED_CACHE_HIT_COUNTER,
        &[
            ("op".to_string(), op.to_string()),
            ("cache_hit".to_string(), cache_hit.to_string()),
        ],
        1,
    );
}

/// Counts an entry dropped from the store after a write.
pub fn track_invalidation(op: &'static str, entry: &'static str) {
    inc(
        MEMOIZED_INVALIDATIONS_COUNTER,
        &[
            ("op".to_string(), op.to_string()),
            ("entry".to_string(), entry.to_string()),
        ],
        1,
    );
}

pub fn setup_metrics_recorder() -> Result<PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(EXPONENTIAL_SECONDS)?
        .install_recorder()
}
