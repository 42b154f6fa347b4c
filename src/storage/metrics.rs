//! Shared metrics recording for storage operations.

use std::time::Instant;

/// Records operation metrics for storage operations.
///
/// Two metrics per operation: `storage_operations_total` (counter by
/// operation and status) and `storage_operation_duration_ms` (latency
/// histogram).
pub(crate) fn record_operation_metrics(
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}
