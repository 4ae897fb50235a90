//! Adapters from `prometheus` vectors to the capability model

use std::sync::Arc;

use abmetrics_core::{
    resolve_label_values, undeclared_labels, CounterMetric, CounterVecMetric, GaugeMetric,
    GaugeVecMetric, Labels, ObserverMetric, ObserverVecMetric, SharedCounter, SharedGauge,
    SharedObserver,
};
use prometheus::{Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramVec};

/// Label names and registered name shared by every vector adapter.
#[derive(Debug, Clone)]
pub(crate) struct Dimensions {
    name: String,
    label_names: Vec<String>,
}

impl Dimensions {
    pub(crate) fn new(name: &str, labels: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            label_names: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Label values in declaration order; undeclared labels are dropped.
    fn values<'a>(&'a self, labels: &'a Labels) -> Vec<&'a str> {
        let extra = undeclared_labels(&self.label_names, labels);
        if !extra.is_empty() {
            tracing::debug!(
                metric = %self.name,
                dropped = ?extra,
                "Dropping labels that are not declared dimensions"
            );
        }
        resolve_label_values(&self.label_names, labels)
    }
}

// ============================================================================
// COUNTER
// ============================================================================

pub(crate) struct PrometheusCounterVec {
    pub(crate) dims: Dimensions,
    pub(crate) vec: CounterVec,
}

impl CounterVecMetric for PrometheusCounterVec {
    fn with(&self, labels: &Labels) -> SharedCounter {
        let values = self.dims.values(labels);
        Arc::new(PrometheusCounter(self.vec.with_label_values(values.as_slice())))
    }
}

struct PrometheusCounter(Counter);

impl CounterMetric for PrometheusCounter {
    fn inc(&self) {
        self.0.inc();
    }

    fn add(&self, value: f64) {
        self.0.inc_by(value);
    }
}

// ============================================================================
// GAUGE
// ============================================================================

pub(crate) struct PrometheusGaugeVec {
    pub(crate) dims: Dimensions,
    pub(crate) vec: GaugeVec,
}

impl GaugeVecMetric for PrometheusGaugeVec {
    fn with(&self, labels: &Labels) -> SharedGauge {
        let values = self.dims.values(labels);
        Arc::new(PrometheusGauge(self.vec.with_label_values(values.as_slice())))
    }
}

struct PrometheusGauge(Gauge);

impl GaugeMetric for PrometheusGauge {
    fn set(&self, value: f64) {
        self.0.set(value);
    }

    fn inc(&self) {
        self.0.inc();
    }

    fn dec(&self) {
        self.0.dec();
    }

    fn add(&self, value: f64) {
        self.0.add(value);
    }

    fn sub(&self, value: f64) {
        self.0.sub(value);
    }
}

// ============================================================================
// OBSERVER
// ============================================================================

pub(crate) struct PrometheusObserverVec {
    pub(crate) dims: Dimensions,
    pub(crate) vec: HistogramVec,
}

impl ObserverVecMetric for PrometheusObserverVec {
    fn with(&self, labels: &Labels) -> SharedObserver {
        let values = self.dims.values(labels);
        Arc::new(PrometheusObserver(self.vec.with_label_values(values.as_slice())))
    }
}

struct PrometheusObserver(Histogram);

impl ObserverMetric for PrometheusObserver {
    fn observe(&self, value: f64) {
        self.0.observe(value);
    }
}
