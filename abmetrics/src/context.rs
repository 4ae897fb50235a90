//! Explicit metrics context
//!
//! [`MetricsContext`] carries everything initialization derives (provider,
//! service name, namespace path parameter, shared HTTP histogram, runtime
//! bridge) and is passed by reference to whatever needs it. The global API
//! in [`crate::registry`] is a thin layer that keeps one of these in a
//! process-wide slot.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use abmetrics_core::constants::BUILD_INFO_METRIC_NAME;
use abmetrics_core::{
    metric_name, BuildInfo, Labels, MetricsResult, Provider, RuntimeStatsSource, SharedCounter,
    SharedCounterVec, SharedGauge, SharedGaugeVec, SharedObserver, SharedObserverVec,
};

use crate::bridge::{BridgeSnapshot, RuntimeBridge, RuntimeMetricSet, TokioRuntimeSource};
use crate::config::MetricsOptions;
use crate::db::{DbMetrics, PoolMetrics};
use crate::http::HttpMetrics;

/// Initialized metrics state for one service.
pub struct MetricsContext {
    provider: Arc<dyn Provider>,
    service_name: String,
    namespace_path_parameter: String,
    http: HttpMetrics,
    /// The `ab_service_request_http` histogram once registered on
    /// `provider`, kept while a custom histogram is active.
    default_http: Option<HttpMetrics>,
    /// Runtime statistic metrics registered on `provider` so far.
    runtime_metrics: RuntimeMetricSet,
    bridge: Mutex<Option<RuntimeBridge>>,
}

impl MetricsContext {
    /// Initialize metrics for `service_name` against `provider`.
    ///
    /// Registers the shared HTTP histogram (unless a custom one is supplied),
    /// the build-info gauge when `build_info` is given, and starts the
    /// runtime statistics bridge when enabled.
    ///
    /// # Errors
    ///
    /// - any registration error from `provider`
    /// - [`MetricsError::RuntimeUnavailable`](abmetrics_core::MetricsError::RuntimeUnavailable)
    ///   when runtime metrics are enabled outside of a tokio runtime
    pub fn initialize(
        provider: Arc<dyn Provider>,
        service_name: impl Into<String>,
        build_info: Option<&BuildInfo>,
        options: MetricsOptions,
    ) -> MetricsResult<Self> {
        Self::assemble(provider, service_name.into(), build_info, options, None)
    }

    /// Initialize, reusing the registrations `previous` made on the same
    /// provider.
    ///
    /// `previous` is only read. A new runtime bridge is started with the
    /// options given here; stopping the previous one is left to the caller
    /// once this returns `Ok`.
    pub(crate) fn assemble(
        provider: Arc<dyn Provider>,
        service_name: String,
        build_info: Option<&BuildInfo>,
        options: MetricsOptions,
        previous: Option<&MetricsContext>,
    ) -> MetricsResult<Self> {
        let carried_http = previous.and_then(|p| p.default_http.clone());
        let (http, default_http) = match options.custom_http_metrics {
            Some(custom) => (HttpMetrics::from_vec(custom), carried_http),
            None => {
                let default = match carried_http {
                    Some(default) => default,
                    None => HttpMetrics::new(provider.as_ref())?,
                };
                (default.clone(), Some(default))
            }
        };

        if let Some(info) = build_info {
            let name = metric_name(&service_name, BUILD_INFO_METRIC_NAME);
            provider.init_build_info(&name, info)?;
        }

        let known = previous
            .map(|p| p.runtime_metrics.clone())
            .unwrap_or_default();
        let bridge = if options.enable_runtime_metrics {
            let source: Arc<dyn RuntimeStatsSource> = match options.runtime_stats_source {
                Some(source) => source,
                None => Arc::new(TokioRuntimeSource::current()?),
            };
            Some(RuntimeBridge::start_reusing(
                provider.as_ref(),
                source,
                options.runtime_metrics_interval,
                &known,
            )?)
        } else {
            None
        };
        let runtime_metrics = match &bridge {
            Some(bridge) => bridge.registered().clone(),
            None => known,
        };

        tracing::info!(
            service = %service_name,
            namespace_path_parameter = %options.namespace_path_parameter,
            runtime_metrics = bridge.is_some(),
            build_info = build_info.is_some(),
            "Metrics initialized"
        );

        Ok(Self {
            provider,
            service_name,
            namespace_path_parameter: options.namespace_path_parameter,
            http,
            default_http,
            runtime_metrics,
            bridge: Mutex::new(bridge),
        })
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn namespace_path_parameter(&self) -> &str {
        &self.namespace_path_parameter
    }

    pub fn http_metrics(&self) -> &HttpMetrics {
        &self.http
    }

    /// `metric_name(service_name, metric)`.
    pub fn metric_name(&self, metric: &str) -> String {
        metric_name(&self.service_name, metric)
    }

    /// Whether the runtime statistics bridge is running.
    pub fn runtime_metrics_running(&self) -> bool {
        self.lock_bridge()
            .as_ref()
            .map(RuntimeBridge::is_running)
            .unwrap_or(false)
    }

    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================
    //
    // Names are namespaced: "db_latency_seconds" on service "orders" is
    // registered as ab_orders_db_latency_seconds.

    pub fn counter(&self, name: &str, help: &str) -> MetricsResult<SharedCounter> {
        Ok(self.counter_vec(name, help, &[])?.with(&Labels::new()))
    }

    pub fn counter_vec(&self, name: &str, help: &str, labels: &[&str]) -> MetricsResult<SharedCounterVec> {
        self.provider.new_counter(&self.metric_name(name), help, labels)
    }

    pub fn gauge(&self, name: &str, help: &str) -> MetricsResult<SharedGauge> {
        Ok(self.gauge_vec(name, help, &[])?.with(&Labels::new()))
    }

    pub fn gauge_vec(&self, name: &str, help: &str, labels: &[&str]) -> MetricsResult<SharedGaugeVec> {
        self.provider.new_gauge(&self.metric_name(name), help, labels)
    }

    /// Histogram over the default bucket ladder.
    pub fn histogram(&self, name: &str, help: &str) -> MetricsResult<SharedObserver> {
        self.histogram_with_buckets(name, help, &[])
    }

    pub fn histogram_with_buckets(
        &self,
        name: &str,
        help: &str,
        buckets: &[f64],
    ) -> MetricsResult<SharedObserver> {
        Ok(self
            .histogram_vec_with_buckets(name, help, buckets, &[])?
            .with(&Labels::new()))
    }

    pub fn histogram_vec(&self, name: &str, help: &str, labels: &[&str]) -> MetricsResult<SharedObserverVec> {
        self.histogram_vec_with_buckets(name, help, &[], labels)
    }

    pub fn histogram_vec_with_buckets(
        &self,
        name: &str,
        help: &str,
        buckets: &[f64],
        labels: &[&str],
    ) -> MetricsResult<SharedObserverVec> {
        self.provider
            .new_histogram(&self.metric_name(name), help, buckets, labels)
    }

    pub fn summary(&self, name: &str, help: &str) -> MetricsResult<SharedObserver> {
        Ok(self.summary_vec(name, help, &[])?.with(&Labels::new()))
    }

    pub fn summary_vec(&self, name: &str, help: &str, labels: &[&str]) -> MetricsResult<SharedObserverVec> {
        self.provider.new_summary(&self.metric_name(name), help, labels)
    }

    /// Call-lifecycle timing group for `resource`.
    pub fn db_metrics(&self, resource: &str, extra_labels: &[&str]) -> MetricsResult<DbMetrics> {
        DbMetrics::new(self.provider.as_ref(), &self.service_name, resource, extra_labels)
    }

    /// Connection-pool statistics for `database`.
    pub fn pool_metrics(&self, database: &str) -> MetricsResult<PoolMetrics> {
        PoolMetrics::new(self.provider.as_ref(), database)
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Signal the runtime statistics bridge to stop without waiting.
    pub fn stop_runtime_metrics(&self) {
        if let Some(bridge) = self.lock_bridge().take() {
            bridge.stop();
        }
    }

    /// Stop the runtime statistics bridge and wait for it to exit.
    ///
    /// Returns the bridge's final counters, `None` when it was not running.
    pub async fn shutdown(&self) -> Option<BridgeSnapshot> {
        let bridge = self.lock_bridge().take();
        match bridge {
            Some(bridge) => Some(bridge.shutdown().await),
            None => None,
        }
    }

    /// Period of the running bridge, if any.
    pub fn runtime_metrics_interval(&self) -> Option<Duration> {
        self.lock_bridge().as_ref().map(RuntimeBridge::interval)
    }

    fn lock_bridge(&self) -> std::sync::MutexGuard<'_, Option<RuntimeBridge>> {
        self.bridge.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for MetricsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsContext")
            .field("service_name", &self.service_name)
            .field("namespace_path_parameter", &self.namespace_path_parameter)
            .field("runtime_metrics", &self.runtime_metrics_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abmetrics_core::MetricsError;
    use abmetrics_test_utils::{RecordingProvider, StaticStatsSource};

    fn quiet() -> MetricsOptions {
        MetricsOptions::default().with_runtime_metrics(false)
    }

    #[test]
    fn test_initialize_without_runtime() {
        let provider = RecordingProvider::new();
        let ctx = MetricsContext::initialize(provider.shared(), "orders", None, quiet()).unwrap();

        assert_eq!(ctx.service_name(), "orders");
        assert_eq!(ctx.namespace_path_parameter(), "namespace");
        assert!(!ctx.runtime_metrics_running());
        assert!(provider.registered("ab_service_request_http").is_some());
        assert!(provider.build_infos().is_empty());
    }

    #[test]
    fn test_namespaced_constructors() {
        let provider = RecordingProvider::new();
        let ctx = MetricsContext::initialize(provider.shared(), "orders", None, quiet()).unwrap();

        ctx.histogram("db_latency_seconds", "Latency").unwrap().observe(0.3);
        ctx.counter("requests_total", "Requests").unwrap().inc();
        ctx.gauge_vec("queue_depth", "Depth", &["queue"]).unwrap();
        ctx.summary("payload_bytes", "Payload").unwrap();

        assert_eq!(provider.observations("ab_orders_db_latency_seconds").len(), 1);
        assert_eq!(provider.operations_for("ab_orders_requests_total").len(), 1);
        assert!(provider.registered("ab_orders_queue_depth").is_some());
        assert!(provider.registered("ab_orders_payload_bytes").is_some());
    }

    #[test]
    fn test_build_info_is_forwarded() {
        let provider = RecordingProvider::new();
        let info = BuildInfo {
            version: "1.1.0".to_string(),
            ..BuildInfo::default()
        };
        MetricsContext::initialize(provider.shared(), "orders", Some(&info), quiet()).unwrap();

        let infos = provider.build_infos();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].0, "ab_orders_build_info");
        assert_eq!(infos[0].1.version, "1.1.0");
    }

    #[test]
    fn test_custom_http_metrics_replace_default() {
        let provider = RecordingProvider::new();
        let custom = provider
            .new_histogram("custom_http", "Custom", &[], &["namespace", "path", "method", "response_code"])
            .unwrap();
        let ctx = MetricsContext::initialize(
            provider.shared(),
            "orders",
            None,
            quiet().with_custom_http_metrics(custom),
        )
        .unwrap();

        assert!(provider.registered("ab_service_request_http").is_none());
        ctx.http_metrics()
            .observe(&crate::HttpRequestLabels::default(), Duration::ZERO);
        assert_eq!(provider.observations("custom_http").len(), 1);
    }

    #[test]
    fn test_runtime_metrics_need_a_runtime() {
        let provider = RecordingProvider::new();
        let err = MetricsContext::initialize(
            provider.shared(),
            "orders",
            None,
            MetricsOptions::default(),
        )
        .err()
        .unwrap();
        assert_eq!(err, MetricsError::RuntimeUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_bridge() {
        let provider = RecordingProvider::new();
        let source = StaticStatsSource::new();
        let ctx = MetricsContext::initialize(
            provider.shared(),
            "orders",
            None,
            MetricsOptions::default().with_runtime_stats_source(Arc::new(source)),
        )
        .unwrap();

        assert!(ctx.runtime_metrics_running());
        assert_eq!(ctx.runtime_metrics_interval(), Some(Duration::from_secs(2)));

        tokio::time::sleep(Duration::from_secs(5)).await;
        let snapshot = ctx.shutdown().await.unwrap();
        assert!(snapshot.ticks >= 1);
        assert!(!ctx.runtime_metrics_running());
        assert!(ctx.shutdown().await.is_none());
    }
}
