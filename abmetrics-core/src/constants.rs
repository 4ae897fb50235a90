//! Constants for abmetrics
//!
//! Metric naming pieces, label names and bucket ladders shared by every
//! crate in the workspace.

// ============================================================================
// NAMING
// ============================================================================

/// Namespace prepended to every generated metric name.
pub const METRIC_NAMESPACE: &str = "ab";

/// Service segment used for metrics that are not owned by one service
/// (HTTP latency, runtime statistics).
pub const GENERIC_SERVICE_NAME: &str = "service";

/// Metric segment of the shared HTTP latency histogram.
pub const HTTP_METRIC_NAME: &str = "request_http";

/// Metric segment of the build-info gauge.
pub const BUILD_INFO_METRIC_NAME: &str = "build_info";

/// Suffix of every call-lifecycle latency histogram.
pub const DB_LATENCY_SUFFIX: &str = "db_latency_seconds";

// ============================================================================
// LABELS
// ============================================================================

/// Default path parameter that carries the namespace of an HTTP request.
pub const DEFAULT_NAMESPACE_PATH_PARAMETER: &str = "namespace";

pub const LABEL_NAMESPACE: &str = "namespace";
pub const LABEL_PATH: &str = "path";
pub const LABEL_METHOD: &str = "method";
pub const LABEL_RESPONSE_CODE: &str = "response_code";

pub const LABEL_ACTION: &str = "action";
pub const LABEL_RESULT: &str = "result";
pub const LABEL_INSTANCE: &str = "instance";

pub const RESULT_SUCCESS: &str = "success";
pub const RESULT_ERROR: &str = "error";

// ============================================================================
// BUCKETS
// ============================================================================

/// Default histogram buckets (seconds), used when a caller supplies none.
pub const DEFAULT_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 10ms, 100ms, 500ms, 1s .. 20s
pub const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.01, 0.1, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 7.5, 10.0, 15.0, 20.0,
];

// ============================================================================
// RUNTIME BRIDGE
// ============================================================================

/// Default period between two runtime statistic samples.
pub const DEFAULT_RUNTIME_METRICS_INTERVAL_MS: u64 = 2_000;
