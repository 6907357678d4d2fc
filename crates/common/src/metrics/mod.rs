//! Metrics helpers
//!
//! Records through the `metrics` facade. Nothing here installs an
//! exporter; without a recorder every call is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ragdesk metrics
pub const METRICS_PREFIX: &str = "ragdesk";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_remote_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Total calls to the remote file-search service"
    );

    describe_histogram!(
        format!("{}_remote_call_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Remote call latency in seconds"
    );

    describe_counter!(
        format!("{}_retries_total", METRICS_PREFIX),
        Unit::Count,
        "Total retries after transient failures"
    );

    describe_counter!(
        format!("{}_files_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Files uploaded and registered with a store, by outcome"
    );

    describe_counter!(
        format!("{}_bytes_ingested_total", METRICS_PREFIX),
        Unit::Bytes,
        "Bytes of successfully ingested files"
    );

    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Grounded queries, by outcome"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Grounded query latency in seconds"
    );

    tracing::debug!("Metrics registered");
}

/// Helper to record one remote call
pub struct RemoteCallMetrics {
    start: Instant,
    operation: &'static str,
}

impl RemoteCallMetrics {
    /// Start tracking a remote call
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    /// Record call completion with the HTTP status (0 when no response arrived)
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_remote_calls_total", METRICS_PREFIX),
            "operation" => self.operation,
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_remote_call_duration_seconds", METRICS_PREFIX),
            "operation" => self.operation
        )
        .record(duration);
    }
}

pub fn record_retry(operation: &str) {
    counter!(
        format!("{}_retries_total", METRICS_PREFIX),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Helper to record ingestion metrics
pub fn record_ingestion(success: bool, size_bytes: u64) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_files_ingested_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    if success {
        counter!(format!("{}_bytes_ingested_total", METRICS_PREFIX)).increment(size_bytes);
    }
}

/// Helper to record query metrics
pub fn record_query(duration_secs: f64, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(format!("{}_query_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}
