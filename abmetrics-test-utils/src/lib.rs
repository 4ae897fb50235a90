//! abmetrics Test Utilities
//!
//! Centralized test infrastructure for the abmetrics workspace:
//! - `RecordingProvider`: in-memory backend that records every registration
//!   and every `with(labels).op(value)` call
//! - `StaticStatsSource`: scripted runtime statistics
//! - Proptest generators for labels, actions and metric names

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use abmetrics_core::{
    labels, sanitize_name, BuildInfo, CounterMetric, CounterVecMetric, GaugeMetric,
    GaugeVecMetric, Labels, MetricsError, MetricsResult, ObserverKind, ObserverMetric,
    ObserverVecMetric, Provider, RuntimeStatsSource, SharedCounter, SharedCounterVec, SharedGauge,
    SharedGaugeVec, SharedObserver, SharedObserverVec, StatDescriptor, StatKind, StatValue,
};

use proptest::prelude::*;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// RECORDING PROVIDER
// ============================================================================

/// Shape a metric was registered with.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricShape {
    Counter,
    Gauge,
    Histogram { buckets: Vec<f64> },
    Summary,
}

/// A metric registered with the [`RecordingProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredMetric {
    pub name: String,
    pub help: String,
    pub shape: MetricShape,
    pub label_names: Vec<String>,
}

/// A single operation on a time series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    Inc,
    Dec,
    Add(f64),
    Sub(f64),
    Set(f64),
    SetToCurrentTime,
    Observe(f64),
}

/// An operation together with the series it was applied to.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedOp {
    /// Sanitized metric name.
    pub metric: String,
    /// Declared label names mapped to the values used (missing ones as `""`).
    pub labels: BTreeMap<String, String>,
    pub op: Operation,
}

#[derive(Debug, Default)]
struct Recorder {
    registered: Mutex<BTreeMap<String, RegisteredMetric>>,
    operations: Mutex<Vec<RecordedOp>>,
    build_infos: Mutex<Vec<(String, BuildInfo)>>,
}

/// In-memory [`Provider`] for tests.
///
/// Names are sanitized and duplicates rejected the same way a real registry
/// does. Clones share the same recording, so a test can keep one clone and
/// hand another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct RecordingProvider {
    recorder: Arc<Recorder>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The provider as a trait object sharing this recording.
    pub fn shared(&self) -> Arc<dyn Provider> {
        Arc::new(self.clone())
    }

    /// Registration record for a sanitized metric name.
    pub fn registered(&self, name: &str) -> Option<RegisteredMetric> {
        lock(&self.recorder.registered).get(name).cloned()
    }

    /// All registered sanitized names, sorted.
    pub fn registered_names(&self) -> Vec<String> {
        lock(&self.recorder.registered).keys().cloned().collect()
    }

    /// Every recorded operation, in order.
    pub fn operations(&self) -> Vec<RecordedOp> {
        lock(&self.recorder.operations).clone()
    }

    /// Recorded operations on one metric, in order.
    pub fn operations_for(&self, metric: &str) -> Vec<RecordedOp> {
        lock(&self.recorder.operations)
            .iter()
            .filter(|op| op.metric == metric)
            .cloned()
            .collect()
    }

    /// Observed values on one metric with their labels, in order.
    pub fn observations(&self, metric: &str) -> Vec<(BTreeMap<String, String>, f64)> {
        self.operations_for(metric)
            .into_iter()
            .filter_map(|op| match op.op {
                Operation::Observe(v) => Some((op.labels, v)),
                _ => None,
            })
            .collect()
    }

    /// Build-info initializations, in order.
    pub fn build_infos(&self) -> Vec<(String, BuildInfo)> {
        lock(&self.recorder.build_infos).clone()
    }

    /// Forget recorded operations; registrations are kept.
    pub fn clear_operations(&self) {
        lock(&self.recorder.operations).clear();
    }

    fn register(
        &self,
        name: &str,
        help: &str,
        shape: MetricShape,
        labels: &[&str],
    ) -> MetricsResult<RecordingVec> {
        let name = sanitize_name(name);
        if name.is_empty() {
            return Err(MetricsError::invalid(name, "metric name is empty"));
        }

        let mut registered = lock(&self.recorder.registered);
        if registered.contains_key(&name) {
            return Err(MetricsError::AlreadyRegistered { name });
        }

        let label_names: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        registered.insert(
            name.clone(),
            RegisteredMetric {
                name: name.clone(),
                help: help.to_string(),
                shape,
                label_names: label_names.clone(),
            },
        );

        Ok(RecordingVec {
            recorder: Arc::clone(&self.recorder),
            metric: name,
            label_names,
        })
    }
}

impl Provider for RecordingProvider {
    fn new_counter(&self, name: &str, help: &str, labels: &[&str]) -> MetricsResult<SharedCounterVec> {
        Ok(Arc::new(self.register(name, help, MetricShape::Counter, labels)?))
    }

    fn new_gauge(&self, name: &str, help: &str, labels: &[&str]) -> MetricsResult<SharedGaugeVec> {
        Ok(Arc::new(self.register(name, help, MetricShape::Gauge, labels)?))
    }

    fn new_observer(
        &self,
        name: &str,
        help: &str,
        kind: ObserverKind,
        labels: &[&str],
    ) -> MetricsResult<SharedObserverVec> {
        let shape = match kind.effective_buckets() {
            Some(buckets) => MetricShape::Histogram {
                buckets: buckets.to_vec(),
            },
            None => MetricShape::Summary,
        };
        Ok(Arc::new(self.register(name, help, shape, labels)?))
    }

    fn init_build_info(&self, name: &str, info: &BuildInfo) -> MetricsResult<()> {
        lock(&self.recorder.build_infos).push((sanitize_name(name), info.clone()));
        Ok(())
    }
}

struct RecordingVec {
    recorder: Arc<Recorder>,
    metric: String,
    label_names: Vec<String>,
}

impl RecordingVec {
    fn series(&self, labels: &Labels) -> Arc<RecordingSeries> {
        let labels = self
            .label_names
            .iter()
            .map(|name| (name.clone(), labels.get(name).cloned().unwrap_or_default()))
            .collect();
        Arc::new(RecordingSeries {
            recorder: Arc::clone(&self.recorder),
            metric: self.metric.clone(),
            labels,
        })
    }
}

impl CounterVecMetric for RecordingVec {
    fn with(&self, labels: &Labels) -> SharedCounter {
        self.series(labels)
    }
}

impl GaugeVecMetric for RecordingVec {
    fn with(&self, labels: &Labels) -> SharedGauge {
        self.series(labels)
    }
}

impl ObserverVecMetric for RecordingVec {
    fn with(&self, labels: &Labels) -> SharedObserver {
        self.series(labels)
    }
}

struct RecordingSeries {
    recorder: Arc<Recorder>,
    metric: String,
    labels: BTreeMap<String, String>,
}

impl RecordingSeries {
    fn record(&self, op: Operation) {
        lock(&self.recorder.operations).push(RecordedOp {
            metric: self.metric.clone(),
            labels: self.labels.clone(),
            op,
        });
    }
}

impl CounterMetric for RecordingSeries {
    fn inc(&self) {
        self.record(Operation::Inc);
    }

    fn add(&self, value: f64) {
        self.record(Operation::Add(value));
    }
}

impl GaugeMetric for RecordingSeries {
    fn set(&self, value: f64) {
        self.record(Operation::Set(value));
    }

    fn inc(&self) {
        self.record(Operation::Inc);
    }

    fn dec(&self) {
        self.record(Operation::Dec);
    }

    fn add(&self, value: f64) {
        self.record(Operation::Add(value));
    }

    fn sub(&self, value: f64) {
        self.record(Operation::Sub(value));
    }

    fn set_to_current_time(&self) {
        self.record(Operation::SetToCurrentTime);
    }
}

impl ObserverMetric for RecordingSeries {
    fn observe(&self, value: f64) {
        self.record(Operation::Observe(value));
    }
}

// ============================================================================
// STATIC STATS SOURCE
// ============================================================================

/// Scripted [`RuntimeStatsSource`].
///
/// Descriptors and values can be changed at any time; reads are counted per
/// statistic name.
#[derive(Debug, Default)]
pub struct StaticStatsSource {
    descriptors: Mutex<Vec<StatDescriptor>>,
    values: Mutex<HashMap<String, StatValue>>,
    reads: Mutex<HashMap<String, usize>>,
}

impl StaticStatsSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor together with its initial value.
    pub fn with_stat(self, descriptor: StatDescriptor, value: Option<StatValue>) -> Self {
        self.add_stat(descriptor, value);
        self
    }

    /// Add a descriptor together with its initial value.
    pub fn add_stat(&self, descriptor: StatDescriptor, value: Option<StatValue>) {
        if let Some(value) = value {
            lock(&self.values).insert(descriptor.name.clone(), value);
        }
        lock(&self.descriptors).push(descriptor);
    }

    /// Replace the current value of a statistic.
    pub fn set_value(&self, name: &str, value: StatValue) {
        lock(&self.values).insert(name.to_string(), value);
    }

    /// Make a statistic unreadable.
    pub fn remove_value(&self, name: &str) {
        lock(&self.values).remove(name);
    }

    /// How many times `name` has been read.
    pub fn read_count(&self, name: &str) -> usize {
        lock(&self.reads).get(name).copied().unwrap_or(0)
    }
}

impl RuntimeStatsSource for StaticStatsSource {
    fn describe(&self) -> Vec<StatDescriptor> {
        lock(&self.descriptors).clone()
    }

    fn read(&self, name: &str) -> Option<StatValue> {
        *lock(&self.reads).entry(name.to_string()).or_insert(0) += 1;
        lock(&self.values).get(name).cloned()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

/// Label names accepted by every backend.
pub fn arb_label_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,12}"
}

/// Short free-form label values, including the empty string.
pub fn arb_label_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_./-]{0,16}"
}

/// Label maps of up to four entries.
pub fn arb_labels() -> impl Strategy<Value = Labels> {
    prop::collection::hash_map(arb_label_name(), arb_label_value(), 0..4)
}

/// Action identifiers for timed calls.
pub fn arb_action() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,16}"
}

/// Raw metric names, possibly needing sanitization.
pub fn arb_metric_name() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_./:-]{0,30}"
}

// ============================================================================
// TESTS
// ============================================================================
