//! Telemetry metric name constants.
//!
//! Centralised metric names for muninn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! These are process-level counters and are independent of the persisted
//! [`MetricsLog`](crate::metrics_log::MetricsLog), which is an in-app
//! record of individual operations.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation` — client operation (e.g. "list", "create", "delete")
//! - `status` — outcome: "ok" or "error"

/// Total HTTP requests dispatched by the API client.
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "muninn_requests_total";

/// Request duration in seconds.
///
/// Labels: `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "muninn_request_duration_seconds";

/// Total response cache hits.
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Total response cache misses (absent or expired).
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Total batched invalidation passes executed by the response cache.
pub const CACHE_INVALIDATION_PASSES_TOTAL: &str = "muninn_cache_invalidation_passes_total";

/// Total metrics-log persistence failures (load or save).
///
/// Labels: `phase` ("load" | "save").
pub const PERSISTENCE_FAILURES_TOTAL: &str = "muninn_persistence_failures_total";
