//! Operator metrics exposed through the `metrics` crate facade.
//!
//! ## Metric Naming Conventions
//!
//! All metrics follow the pattern: `conductor_operator_{name}_{unit}`
//!
//! - Counters: `_total` suffix
//! - Histograms: `_seconds` suffix

use std::time::Instant;

use conductor_types::OperationKind;
use metrics::{counter, histogram};

use crate::error::ErrorKind;

// =============================================================================
// Metric Names
// =============================================================================

const REQUESTS_TOTAL: &str = "conductor_operator_requests_total";
const REQUEST_LATENCY: &str = "conductor_operator_request_latency_seconds";
const FAILURES_TOTAL: &str = "conductor_operator_failures_total";
const DURABLE_OPERATIONS_TOTAL: &str = "conductor_operator_durable_operations_total";
const DURABLE_OPERATION_DURATION: &str = "conductor_operator_durable_operation_duration_seconds";

// =============================================================================
// Request Metrics
// =============================================================================

/// Records an inbound request.
#[inline]
pub fn record_request(operation: &'static str) {
    counter!(REQUESTS_TOTAL, "operation" => operation).increment(1);
}

/// Records request latency.
#[inline]
pub fn record_request_latency(operation: &'static str, latency_secs: f64) {
    histogram!(REQUEST_LATENCY, "operation" => operation).record(latency_secs);
}

/// Records a failed request with its error kind.
#[inline]
pub fn record_failure(operation: &'static str, kind: ErrorKind) {
    counter!(FAILURES_TOTAL, "operation" => operation, "kind" => kind.as_str()).increment(1);
}

// =============================================================================
// Durable Operation Metrics
// =============================================================================

/// Records the terminal status of a durable operation.
///
/// `status` is one of `succeeded`, `failed`, `submit_failed`, or `timed_out`.
#[inline]
pub fn record_durable_operation(kind: OperationKind, status: &'static str) {
    counter!(DURABLE_OPERATIONS_TOTAL, "kind" => kind.as_str(), "status" => status).increment(1);
}

/// Records the time from submission to a terminal outcome.
#[inline]
pub fn record_durable_operation_duration(kind: OperationKind, duration_secs: f64) {
    histogram!(DURABLE_OPERATION_DURATION, "kind" => kind.as_str()).record(duration_secs);
}

// =============================================================================
// Timer Helper
// =============================================================================

/// Request timer that records latency on drop.
///
/// The request counter is incremented when the timer starts, so every
/// started request is counted even if its future is dropped.
pub struct RequestTimer {
    operation: &'static str,
    start: Instant,
}

impl RequestTimer {
    /// Counts the request and starts timing it.
    pub fn start(operation: &'static str) -> Self {
        record_request(operation);
        Self { operation, start: Instant::now() }
    }

    /// Returns elapsed time in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        record_request_latency(self.operation, self.elapsed_secs());
    }
}
