//! Initialization options
//!
//! Options recognized by [`MetricsContext::initialize`](crate::MetricsContext::initialize)
//! and the global [`initialize`](crate::initialize).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use abmetrics_core::constants::{
    DEFAULT_NAMESPACE_PATH_PARAMETER, DEFAULT_RUNTIME_METRICS_INTERVAL_MS,
};
use abmetrics_core::{RuntimeStatsSource, SharedObserverVec};

/// Options applied on initialization.
#[derive(Clone)]
pub struct MetricsOptions {
    /// Path parameter whose value labels HTTP samples with a namespace
    /// (default: "namespace")
    pub namespace_path_parameter: String,

    /// Start the runtime statistics bridge (default: true)
    pub enable_runtime_metrics: bool,

    /// Sampling period of the runtime statistics bridge (default: 2 seconds)
    pub runtime_metrics_interval: Duration,

    /// Replacement for the shared HTTP latency histogram. It must carry the
    /// `namespace`, `path`, `method` and `response_code` dimensions.
    pub custom_http_metrics: Option<SharedObserverVec>,

    /// Source sampled by the runtime statistics bridge. `None` samples the
    /// tokio runtime that is current at initialization.
    pub runtime_stats_source: Option<Arc<dyn RuntimeStatsSource>>,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            namespace_path_parameter: DEFAULT_NAMESPACE_PATH_PARAMETER.to_string(),
            enable_runtime_metrics: true,
            runtime_metrics_interval: Duration::from_millis(DEFAULT_RUNTIME_METRICS_INTERVAL_MS),
            custom_http_metrics: None,
            runtime_stats_source: None,
        }
    }
}

impl MetricsOptions {
    /// Create MetricsOptions from environment variables.
    ///
    /// # Environment Variables
    /// - `ABMETRICS_NAMESPACE_PATH_PARAMETER`: Namespace path parameter name (default: "namespace")
    /// - `ABMETRICS_ENABLE_RUNTIME_METRICS`: Start the runtime bridge (default: true)
    /// - `ABMETRICS_RUNTIME_METRICS_INTERVAL_MS`: Bridge sampling period (default: 2000)
    pub fn from_env() -> Self {
        let namespace_path_parameter = std::env::var("ABMETRICS_NAMESPACE_PATH_PARAMETER")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE_PATH_PARAMETER.to_string());

        let enable_runtime_metrics = std::env::var("ABMETRICS_ENABLE_RUNTIME_METRICS")
            .ok()
            .map(|s| parse_flag(&s))
            .unwrap_or(true);

        let runtime_metrics_interval = Duration::from_millis(
            std::env::var("ABMETRICS_RUNTIME_METRICS_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|ms: &u64| *ms > 0)
                .unwrap_or(DEFAULT_RUNTIME_METRICS_INTERVAL_MS),
        );

        Self {
            namespace_path_parameter,
            enable_runtime_metrics,
            runtime_metrics_interval,
            custom_http_metrics: None,
            runtime_stats_source: None,
        }
    }

    pub fn with_namespace_path_parameter(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        // An empty override keeps the default.
        if !name.is_empty() {
            self.namespace_path_parameter = name;
        }
        self
    }

    pub fn with_runtime_metrics(mut self, enabled: bool) -> Self {
        self.enable_runtime_metrics = enabled;
        self
    }

    pub fn with_runtime_metrics_interval(mut self, interval: Duration) -> Self {
        self.runtime_metrics_interval = interval;
        self
    }

    pub fn with_custom_http_metrics(mut self, metrics: SharedObserverVec) -> Self {
        self.custom_http_metrics = Some(metrics);
        self
    }

    pub fn with_runtime_stats_source(mut self, source: Arc<dyn RuntimeStatsSource>) -> Self {
        self.runtime_stats_source = Some(source);
        self
    }
}

impl fmt::Debug for MetricsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsOptions")
            .field("namespace_path_parameter", &self.namespace_path_parameter)
            .field("enable_runtime_metrics", &self.enable_runtime_metrics)
            .field("runtime_metrics_interval", &self.runtime_metrics_interval)
            .field("custom_http_metrics", &self.custom_http_metrics.is_some())
            .field("runtime_stats_source", &self.runtime_stats_source.is_some())
            .finish()
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(value.trim().to_lowercase().as_str(), "false" | "0" | "no" | "off")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = MetricsOptions::default();
        assert_eq!(opts.namespace_path_parameter, "namespace");
        assert!(opts.enable_runtime_metrics);
        assert_eq!(opts.runtime_metrics_interval, Duration::from_secs(2));
        assert!(opts.custom_http_metrics.is_none());
        assert!(opts.runtime_stats_source.is_none());
    }

    #[test]
    fn test_empty_namespace_override_keeps_default() {
        let opts = MetricsOptions::default().with_namespace_path_parameter("");
        assert_eq!(opts.namespace_path_parameter, "namespace");

        let opts = MetricsOptions::default().with_namespace_path_parameter("tenant");
        assert_eq!(opts.namespace_path_parameter, "tenant");
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("FALSE"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(" off "));
    }

    #[test]
    fn test_debug_hides_handles() {
        let rendered = format!("{:?}", MetricsOptions::default().with_runtime_metrics(false));
        assert!(rendered.contains("enable_runtime_metrics: false"));
        assert!(rendered.contains("custom_http_metrics: false"));
    }
}
