//! Generation metrics collection.
//!
//! Provides standardized metrics for monitoring generation requests:
//! - Request counters by operation and status
//! - Latency histograms
//! - Poll attempt counters by transport and outcome
//! - Endpoint and transport fallback counters

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Total API requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "vgen_requests_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "vgen_request_latency_seconds";

    /// Status reads by transport and outcome.
    pub const POLL_ATTEMPTS_TOTAL: &str = "vgen_poll_attempts_total";

    /// Status endpoint candidates abandoned after a 404.
    pub const ENDPOINT_FALLBACKS_TOTAL: &str = "vgen_endpoint_fallbacks_total";

    /// Requests moved from the typed client to raw HTTP.
    pub const TRANSPORT_FALLBACKS_TOTAL: &str = "vgen_transport_fallbacks_total";

    /// Finished generations by outcome.
    pub const GENERATIONS_TOTAL: &str = "vgen_generations_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record metrics for a completed API request.
pub fn record_request(operation: &str, status: &str, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record one status read.
pub fn record_poll_attempt(transport: &str, outcome: &str) {
    counter!(
        names::POLL_ATTEMPTS_TOTAL,
        "transport" => transport.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a move to the next status endpoint candidate.
pub fn record_endpoint_fallback(candidate: usize) {
    counter!(
        names::ENDPOINT_FALLBACKS_TOTAL,
        "candidate" => candidate.to_string()
    )
    .increment(1);
}

/// Record a fallback from the typed client to raw HTTP.
pub fn record_transport_fallback(stage: &str) {
    counter!(
        names::TRANSPORT_FALLBACKS_TOTAL,
        "stage" => stage.to_string()
    )
    .increment(1);
}

/// Record the outcome of a whole generation.
pub fn record_generation(outcome: &str) {
    counter!(
        names::GENERATIONS_TOTAL,
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================
