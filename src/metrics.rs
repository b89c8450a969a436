//! Prometheus metrics shared by the cluster and search layers.
//!
//! All metrics are registered in the default registry on first use and
//! exported in text format by [`gather_text`].

use prometheus::{
    Counter, CounterVec, Encoder, Histogram, TextEncoder, register_counter, register_counter_vec,
    register_histogram,
};

lazy_static::lazy_static! {
    /// Prometheus [`Counter`] for the number of times this process became leader.
    pub static ref LEADERSHIP_COUNTER: Counter = register_counter!(
        "waypoint_leadership_acquired_total",
        "Total number of times this node was elected leader"
    ).unwrap();

    /// Prometheus [`Counter`] for service registry address refreshes.
    pub static ref REGISTRY_REFRESH_COUNTER: Counter = register_counter!(
        "waypoint_registry_refresh_total",
        "Total number of service registry address refreshes"
    ).unwrap();

    /// Prometheus [`CounterVec`] for coordination errors, labelled by category.
    pub static ref COORDINATION_ERROR_COUNTER: CounterVec = register_counter_vec!(
        "waypoint_coordination_errors_total",
        "Number of coordination errors by category",
        &["category"]
    ).unwrap();

    /// Prometheus [`Counter`] for search requests answered by the coordinator.
    pub static ref SEARCH_COUNTER: Counter = register_counter!(
        "waypoint_searches_total",
        "Total number of search requests served"
    ).unwrap();

    /// Prometheus [`Counter`] for tasks processed by the worker.
    pub static ref TASK_COUNTER: Counter = register_counter!(
        "waypoint_tasks_total",
        "Total number of tasks processed"
    ).unwrap();

    /// Prometheus [`Counter`] for worker dispatches that failed.
    pub static ref WORKER_FAILURE_COUNTER: Counter = register_counter!(
        "waypoint_worker_failures_total",
        "Number of worker dispatches excluded from aggregation"
    ).unwrap();

    /// Prometheus [`Counter`] for request bodies that could not be decoded.
    pub static ref MALFORMED_PAYLOAD_COUNTER: Counter = register_counter!(
        "waypoint_malformed_payloads_total",
        "Number of request payloads that failed to decode"
    ).unwrap();

    /// Prometheus [`Histogram`] for HTTP request handling time.
    pub static ref REQUEST_HISTOGRAM: Histogram = register_histogram!(
        "waypoint_request_duration_seconds",
        "Request duration in seconds"
    ).unwrap();
}

/// Encodes every registered metric in the Prometheus text format.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        log::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
