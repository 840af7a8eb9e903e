//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_total` (counter): requests by endpoint, status
//! - `gate_request_duration_seconds` (histogram): latency distribution
//! - `gate_admission_denied_total` (counter): denials by reason
//! - `gate_rejections_total` (counter): upload rejections by class and reason
//! - `gate_tracked_identifiers` (gauge): identifiers held per shared map
//! - `gate_files_processed_total` (counter): files converted
//! - `gate_bytes_saved_total` (counter): bytes saved by conversion
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus exporter on `addr`. Must be called inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(endpoint: &str, status: u16, start: Instant) {
    counter!(
        "gate_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "gate_request_duration_seconds",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_admission_denied(reason: &'static str) {
    counter!("gate_admission_denied_total", "reason" => reason).increment(1);
}

pub fn record_rejection(code: &'static str, reason: &'static str) {
    counter!("gate_rejections_total", "code" => code, "reason" => reason).increment(1);
}

pub fn record_tracked_identifiers(map: &'static str, count: usize) {
    gauge!("gate_tracked_identifiers", "map" => map).set(count as f64);
}

pub fn record_file_processed(format: &'static str, original_size: u64, compressed_size: u64) {
    counter!("gate_files_processed_total", "format" => format).increment(1);
    counter!("gate_bytes_saved_total").increment(original_size.saturating_sub(compressed_size));
}
