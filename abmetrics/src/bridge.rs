//! Runtime Statistics Bridge
//!
//! Mirrors async-runtime statistics into provider gauges and histograms on a
//! fixed period, without the embedding application polling anything.
//!
//! The catalog of statistics is enumerated exactly once, when the bridge
//! starts. Every scalar statistic gets one gauge and every distribution gets
//! one histogram, named `metric_name("service", <statistic name>)`. On each
//! tick:
//!
//! - scalar values are `set` on their gauge (runtime counters may reset, so
//!   gauges rather than counters)
//! - every bucket value of a distribution snapshot is `observe`d once, which
//!   re-observes the whole current shape every tick
//!
//! A statistic that cannot be read, or whose value kind has no metric under
//! that name, is skipped for that tick. Sampling never fails.
//!
//! The bridge runs as a tokio task until [`RuntimeBridge::stop`],
//! [`RuntimeBridge::shutdown`] or until the bridge handle is dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use abmetrics_core::constants::{DEFAULT_RUNTIME_METRICS_INTERVAL_MS, GENERIC_SERVICE_NAME};
use abmetrics_core::{
    metric_name, Labels, MetricsError, MetricsResult, Provider, RuntimeStatsSource, SharedGauge,
    SharedObserver, StatDescriptor, StatKind, StatValue,
};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

// ============================================================================
// METRICS
// ============================================================================

/// Counters describing the bridge's own activity.
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    /// Sampling ticks completed
    pub ticks: AtomicU64,

    /// Gauge `set` calls issued
    pub gauges_set: AtomicU64,

    /// Histogram `observe` calls issued
    pub histogram_observations: AtomicU64,

    /// Statistics skipped because they were unreadable or mis-typed
    pub samples_skipped: AtomicU64,
}

impl BridgeMetrics {
    pub fn snapshot(&self) -> BridgeSnapshot {
        BridgeSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            gauges_set: self.gauges_set.load(Ordering::Relaxed),
            histogram_observations: self.histogram_observations.load(Ordering::Relaxed),
            samples_skipped: self.samples_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of bridge metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSnapshot {
    pub ticks: u64,
    pub gauges_set: u64,
    pub histogram_observations: u64,
    pub samples_skipped: u64,
}

// ============================================================================
// LOOKUP TABLES
// ============================================================================

/// Runtime statistic metrics already registered with a provider, keyed by
/// statistic name.
///
/// Registration is irreversible, so a bridge restarted on the same provider
/// reuses these handles instead of registering again.
#[derive(Clone, Default)]
pub(crate) struct RuntimeMetricSet {
    gauges: HashMap<String, SharedGauge>,
    histograms: HashMap<String, SharedObserver>,
}

/// Metrics for the statistics found at start.
struct RuntimeTables {
    /// Names of statistics that have a metric, in catalog order.
    tracked: Vec<String>,
    metrics: RuntimeMetricSet,
}

impl RuntimeTables {
    /// Tables for `descriptors`, reusing handles from `known` and registering
    /// the rest with `provider`.
    fn build(
        provider: &dyn Provider,
        descriptors: &[StatDescriptor],
        known: &RuntimeMetricSet,
    ) -> MetricsResult<Self> {
        let mut tables = Self {
            tracked: Vec::with_capacity(descriptors.len()),
            metrics: known.clone(),
        };
        let no_labels = Labels::new();

        for desc in descriptors {
            let name = metric_name(GENERIC_SERVICE_NAME, &desc.name);
            if desc.kind.is_scalar() {
                if !tables.metrics.gauges.contains_key(&desc.name) {
                    let gauge = provider.new_gauge(&name, &desc.description, &[])?;
                    tables
                        .metrics
                        .gauges
                        .insert(desc.name.clone(), gauge.with(&no_labels));
                }
            } else if desc.kind == StatKind::Float64Histogram {
                if !tables.metrics.histograms.contains_key(&desc.name) {
                    let histogram = provider.new_histogram(&name, &desc.description, &[], &[])?;
                    tables
                        .metrics
                        .histograms
                        .insert(desc.name.clone(), histogram.with(&no_labels));
                }
            } else {
                tracing::trace!(statistic = %desc.name, "Skipping unsupported runtime statistic");
                continue;
            }
            tables.tracked.push(desc.name.clone());
        }

        Ok(tables)
    }
}

/// Read every tracked statistic once and push it into its metric.
fn sample_once(source: &dyn RuntimeStatsSource, tables: &RuntimeTables, metrics: &BridgeMetrics) {
    let mut set = 0u64;
    let mut observed = 0u64;
    let mut skipped = 0u64;

    for name in &tables.tracked {
        let Some(value) = source.read(name) else {
            skipped += 1;
            continue;
        };

        let recorded = match (&value, value.as_f64()) {
            (_, Some(v)) => tables.metrics.gauges.get(name).map(|gauge| {
                gauge.set(v);
                set += 1;
            }),
            (StatValue::Float64Histogram { buckets }, None) => {
                tables.metrics.histograms.get(name).map(|histogram| {
                    for bucket in buckets {
                        histogram.observe(*bucket);
                    }
                    observed += buckets.len() as u64;
                })
            }
            _ => None,
        };

        if recorded.is_none() {
            tracing::trace!(statistic = %name, kind = ?value.kind(), "Runtime statistic has no metric of its kind");
            skipped += 1;
        }
    }

    metrics.ticks.fetch_add(1, Ordering::Relaxed);
    metrics.gauges_set.fetch_add(set, Ordering::Relaxed);
    metrics
        .histogram_observations
        .fetch_add(observed, Ordering::Relaxed);
    metrics.samples_skipped.fetch_add(skipped, Ordering::Relaxed);

    tracing::trace!(set, observed, skipped, "Runtime statistics sampled");
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Handle to a running runtime statistics bridge.
pub struct RuntimeBridge {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
    metrics: Arc<BridgeMetrics>,
    registered: RuntimeMetricSet,
    tracked: usize,
    interval: Duration,
}

impl RuntimeBridge {
    /// Enumerate `source`, register one metric per supported statistic with
    /// `provider` and spawn the sampling task on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`MetricsError::RuntimeUnavailable`] outside of a tokio runtime
    /// - any registration error from `provider`
    pub fn start(
        provider: &dyn Provider,
        source: Arc<dyn RuntimeStatsSource>,
        period: Duration,
    ) -> MetricsResult<Self> {
        Self::start_reusing(provider, source, period, &RuntimeMetricSet::default())
    }

    /// Like [`RuntimeBridge::start`], reusing the metrics in `known` for
    /// statistics registered by an earlier bridge on the same provider.
    pub(crate) fn start_reusing(
        provider: &dyn Provider,
        source: Arc<dyn RuntimeStatsSource>,
        period: Duration,
        known: &RuntimeMetricSet,
    ) -> MetricsResult<Self> {
        let runtime = Handle::try_current().map_err(|_| MetricsError::RuntimeUnavailable)?;

        let period = if period.is_zero() {
            tracing::warn!("Zero runtime metrics interval, using the default");
            Duration::from_millis(DEFAULT_RUNTIME_METRICS_INTERVAL_MS)
        } else {
            period
        };

        let descriptors = source.describe();
        let tables = RuntimeTables::build(provider, &descriptors, known)?;
        let tracked = tables.tracked.len();
        let registered = tables.metrics.clone();

        let metrics = Arc::new(BridgeMetrics::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tracing::info!(
            descriptors = descriptors.len(),
            tracked,
            interval_ms = period.as_millis() as u64,
            "Runtime statistics bridge started"
        );

        let handle = runtime.spawn(run_bridge(
            source,
            tables,
            Arc::clone(&metrics),
            period,
            shutdown_rx,
        ));

        Ok(Self {
            shutdown_tx,
            handle,
            metrics,
            registered,
            tracked,
            interval: period,
        })
    }

    /// Every runtime metric registered so far on this bridge's provider.
    pub(crate) fn registered(&self) -> &RuntimeMetricSet {
        &self.registered
    }

    /// Signal the sampling task to stop without waiting for it.
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Signal the sampling task to stop and wait until it has exited.
    pub async fn shutdown(self) -> BridgeSnapshot {
        self.stop();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Runtime statistics bridge task failed");
        }
        self.metrics.snapshot()
    }

    /// Whether the sampling task is still running.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Number of statistics that received a metric.
    pub fn tracked(&self) -> usize {
        self.tracked
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn metrics(&self) -> BridgeSnapshot {
        self.metrics.snapshot()
    }
}

impl fmt::Debug for RuntimeBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeBridge")
            .field("tracked", &self.tracked)
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

async fn run_bridge(
    source: Arc<dyn RuntimeStatsSource>,
    tables: RuntimeTables,
    metrics: Arc<BridgeMetrics>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender means the bridge handle is gone.
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }

            _ = ticker.tick() => {
                sample_once(source.as_ref(), &tables, &metrics);
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        ticks = snapshot.ticks,
        gauges_set = snapshot.gauges_set,
        histogram_observations = snapshot.histogram_observations,
        samples_skipped = snapshot.samples_skipped,
        "Runtime statistics bridge stopped"
    );
}

// ============================================================================
// TOKIO RUNTIME SOURCE
// ============================================================================

const TOKIO_WORKERS: &str = "/tokio/runtime/workers:threads";
const TOKIO_ALIVE_TASKS: &str = "/tokio/runtime/alive_tasks:tasks";
const TOKIO_GLOBAL_QUEUE_DEPTH: &str = "/tokio/runtime/global_queue_depth:tasks";

/// [`RuntimeStatsSource`] reading the stable metrics of a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioRuntimeSource {
    handle: Handle,
}

impl TokioRuntimeSource {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Source for the runtime the caller is running on.
    pub fn current() -> MetricsResult<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| MetricsError::RuntimeUnavailable)
    }
}

impl RuntimeStatsSource for TokioRuntimeSource {
    fn describe(&self) -> Vec<StatDescriptor> {
        vec![
            StatDescriptor::new(
                TOKIO_WORKERS,
                "Number of worker threads used by the runtime",
                StatKind::Uint64,
            ),
            StatDescriptor::new(
                TOKIO_ALIVE_TASKS,
                "Number of tasks that are alive in the runtime",
                StatKind::Uint64,
            ),
            StatDescriptor::new(
                TOKIO_GLOBAL_QUEUE_DEPTH,
                "Number of tasks currently scheduled in the runtime's global queue",
                StatKind::Uint64,
            ),
        ]
    }

    fn read(&self, name: &str) -> Option<StatValue> {
        let metrics = self.handle.metrics();
        let value = match name {
            TOKIO_WORKERS => metrics.num_workers(),
            TOKIO_ALIVE_TASKS => metrics.num_alive_tasks(),
            TOKIO_GLOBAL_QUEUE_DEPTH => metrics.global_queue_depth(),
            _ => return None,
        };
        Some(StatValue::Uint64(value as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abmetrics_test_utils::{Operation, RecordingProvider, StaticStatsSource};

    fn scripted_source() -> StaticStatsSource {
        StaticStatsSource::new()
            .with_stat(
                StatDescriptor::new("/sched/goroutines:goroutines", "Live tasks", StatKind::Uint64),
                Some(StatValue::Uint64(12)),
            )
            .with_stat(
                StatDescriptor::new("/gc/heap/goal:bytes", "Heap goal", StatKind::Float64),
                Some(StatValue::Float64(4096.0)),
            )
            .with_stat(
                StatDescriptor::new(
                    "/sched/latencies:seconds",
                    "Scheduling latency",
                    StatKind::Float64Histogram,
                ),
                Some(StatValue::Float64Histogram {
                    buckets: vec![0.0, 3.0, 1.0],
                }),
            )
            .with_stat(
                StatDescriptor::new("/opaque:things", "Unsupported", StatKind::Unsupported),
                None,
            )
    }

    #[test]
    fn test_tables_one_metric_per_supported_descriptor() {
        let provider = RecordingProvider::new();
        let source = scripted_source();
        let tables = RuntimeTables::build(&provider, &source.describe(), &RuntimeMetricSet::default()).unwrap();

        assert_eq!(tables.tracked.len(), 3);
        assert_eq!(tables.metrics.gauges.len(), 2);
        assert_eq!(tables.metrics.histograms.len(), 1);
        assert_eq!(
            provider.registered_names(),
            vec![
                "ab_service__gc_heap_goal:bytes".to_string(),
                "ab_service__sched_goroutines:goroutines".to_string(),
                "ab_service__sched_latencies:seconds".to_string(),
            ]
        );
    }

    #[test]
    fn test_sample_once_sets_and_observes() {
        let provider = RecordingProvider::new();
        let source = scripted_source();
        let tables = RuntimeTables::build(&provider, &source.describe(), &RuntimeMetricSet::default()).unwrap();
        let metrics = BridgeMetrics::default();

        sample_once(&source, &tables, &metrics);

        let gauge_ops = provider.operations_for("ab_service__sched_goroutines:goroutines");
        assert_eq!(gauge_ops.len(), 1);
        assert_eq!(gauge_ops[0].op, Operation::Set(12.0));

        let observed: Vec<f64> = provider
            .observations("ab_service__sched_latencies:seconds")
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        assert_eq!(observed, vec![0.0, 3.0, 1.0]);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.ticks, 1);
        assert_eq!(snapshot.gauges_set, 2);
        assert_eq!(snapshot.histogram_observations, 3);
        assert_eq!(snapshot.samples_skipped, 0);
        // Unsupported statistics are never read.
        assert_eq!(source.read_count("/opaque:things"), 0);
    }

    #[test]
    fn test_sample_skips_unreadable_and_mistyped() {
        let provider = RecordingProvider::new();
        let source = scripted_source();
        let tables = RuntimeTables::build(&provider, &source.describe(), &RuntimeMetricSet::default()).unwrap();
        let metrics = BridgeMetrics::default();

        source.remove_value("/gc/heap/goal:bytes");
        source.set_value(
            "/sched/goroutines:goroutines",
            StatValue::Float64Histogram { buckets: vec![1.0] },
        );
        sample_once(&source, &tables, &metrics);

        assert_eq!(metrics.snapshot().samples_skipped, 2);
        assert!(provider
            .operations_for("ab_service__sched_goroutines:goroutines")
            .is_empty());
    }

    #[test]
    fn test_tables_reuse_known_metrics() {
        let provider = RecordingProvider::new();
        let source = scripted_source();
        let first =
            RuntimeTables::build(&provider, &source.describe(), &RuntimeMetricSet::default())
                .unwrap();

        source.add_stat(
            StatDescriptor::new("/gc/cycles:cycles", "GC cycles", StatKind::Uint64),
            Some(StatValue::Uint64(3)),
        );
        let second = RuntimeTables::build(&provider, &source.describe(), &first.metrics).unwrap();

        // Only the new statistic is registered; a second registration of the
        // others would have failed.
        assert_eq!(second.tracked.len(), 4);
        assert_eq!(provider.registered_names().len(), 4);
        assert!(provider.registered("ab_service__gc_cycles:cycles").is_some());

        let metrics = BridgeMetrics::default();
        sample_once(&source, &second, &metrics);
        assert_eq!(
            provider.operations_for("ab_service__sched_goroutines:goroutines")[0].op,
            Operation::Set(12.0)
        );
        assert_eq!(metrics.snapshot().gauges_set, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_on_same_provider_keeps_registrations() {
        let provider = RecordingProvider::new();
        let source = Arc::new(scripted_source());
        let first = RuntimeBridge::start(&provider, source.clone(), Duration::from_secs(2)).unwrap();
        let known = first.registered().clone();
        first.shutdown().await;

        let second =
            RuntimeBridge::start_reusing(&provider, source, Duration::from_millis(500), &known)
                .unwrap();
        assert_eq!(second.tracked(), 3);
        assert_eq!(second.interval(), Duration::from_millis(500));
        assert_eq!(provider.registered_names().len(), 3);
        second.shutdown().await;
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let provider = RecordingProvider::new();
        let err = RuntimeBridge::start(
            &provider,
            Arc::new(scripted_source()),
            Duration::from_secs(2),
        )
        .err()
        .unwrap();
        assert_eq!(err, MetricsError::RuntimeUnavailable);
    }

    #[tokio::test]
    async fn test_tokio_source_reads_current_runtime() {
        let source = TokioRuntimeSource::current().unwrap();
        assert_eq!(source.describe().len(), 3);
        for desc in source.describe() {
            assert!(matches!(source.read(&desc.name), Some(StatValue::Uint64(_))));
        }
        assert_eq!(source.read("/unknown"), None);
    }
}
