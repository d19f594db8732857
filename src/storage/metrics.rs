//! Metrics for bit store commands.

use std::time::Instant;

/// Records one store command.
///
/// Emits `storage_operations_total` (counter) and
/// `storage_operation_duration_ms` (histogram), both labelled by backend,
/// command and status (`"success"` or `"error"`).
///
/// ```ignore
/// let start = Instant::now();
/// let result = conn.setbit(key, offset, true);
/// let status = if result.is_ok() { "success" } else { "error" };
/// record_operation_metrics("redis", "setbit", start, status);
/// ```
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}
