//! Shared metrics recording for `SQLite` backends.

use std::time::Instant;

/// Records operation metrics for storage operations.
///
/// Emits `storage_operations_total` (by status) and
/// `storage_operation_duration_ms`.
///
/// # Examples
///
/// ```ignore
/// use std::time::Instant;
/// use chatlevels::storage::sqlite::record_operation_metrics;
///
/// let start = Instant::now();
/// let status = if result.is_ok() { "success" } else { "error" };
/// record_operation_metrics("sqlite", "add_experience", start, status);
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
