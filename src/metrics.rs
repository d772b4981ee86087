// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for skew-store.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `skew_store_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `operation`: save, load, sync, query, query_once
//! - `status`: success, error
//! - `direction`: outbound, inbound

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a provider operation outcome
pub fn record_operation(operation: &str, status: &str) {
    counter!(
        "skew_store_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(operation: &str, duration: Duration) {
    histogram!(
        "skew_store_operation_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record how many instants a transform rewrote
pub fn record_instants(direction: &str, count: usize) {
    counter!(
        "skew_store_instants_rewritten_total",
        "direction" => direction.to_string()
    )
    .increment(count as u64);
}

/// Set the clock offset observed by the last operation
pub fn set_clock_offset(offset_ms: i64) {
    gauge!("skew_store_clock_offset_ms").set(offset_ms as f64);
}

/// Set number of live `sync()` subscriptions
pub fn set_active_subscriptions(count: usize) {
    gauge!("skew_store_active_subscriptions").set(count as f64);
}

/// Record a subscription delivery (value or key) reaching a callback
pub fn record_delivery(kind: &str, status: &str) {
    counter!(
        "skew_store_deliveries_total",
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// ERROR TRACKING - Categorized error counters for alerting
// ═══════════════════════════════════════════════════════════════════════════

/// Record an error with category for alerting
pub fn record_error(operation: &str, error_type: &str) {
    counter!(
        "skew_store_errors_total",
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.operation, self.start.elapsed());
    }
}

/// Convenience macro for timing operations
#[macro_export]
macro_rules! time_operation {
    ($op:expr) => {
        $crate::metrics::LatencyTimer::new($op)
    };
}
