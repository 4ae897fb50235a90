//! Metric Capability Model
//!
//! The shapes every backend must satisfy. A *vector* metric is bound to a
//! fixed, ordered list of label names at creation time; calling `with` on it
//! with concrete label values yields a single time series handle.
//!
//! Labelling is permissive: a declared label that receives no value is
//! recorded under the empty string, and a supplied label that was never
//! declared is dropped by the backend rather than failing the call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Label values keyed by label name.
pub type Labels = HashMap<String, String>;

// ============================================================================
// SINGLE SERIES
// ============================================================================

/// A monotonically increasing counter.
pub trait CounterMetric: Send + Sync {
    fn inc(&self);

    /// Add a non-negative amount.
    fn add(&self, value: f64);
}

/// A single numerical value that can go up and down.
pub trait GaugeMetric: Send + Sync {
    fn set(&self, value: f64);
    fn inc(&self);
    fn dec(&self);
    fn add(&self, value: f64);
    fn sub(&self, value: f64);

    /// Set the gauge to the current Unix time in seconds.
    fn set_to_current_time(&self) {
        self.set(unix_time_secs());
    }
}

/// A histogram or summary: records individual samples.
pub trait ObserverMetric: Send + Sync {
    fn observe(&self, value: f64);
}

pub type SharedCounter = Arc<dyn CounterMetric>;
pub type SharedGauge = Arc<dyn GaugeMetric>;
pub type SharedObserver = Arc<dyn ObserverMetric>;

// ============================================================================
// VECTORS
// ============================================================================

/// A counter fanned out by label combination.
pub trait CounterVecMetric: Send + Sync {
    fn with(&self, labels: &Labels) -> SharedCounter;
}

/// A gauge fanned out by label combination.
pub trait GaugeVecMetric: Send + Sync {
    fn with(&self, labels: &Labels) -> SharedGauge;
}

/// A histogram or summary fanned out by label combination.
pub trait ObserverVecMetric: Send + Sync {
    fn with(&self, labels: &Labels) -> SharedObserver;
}

pub type SharedCounterVec = Arc<dyn CounterVecMetric>;
pub type SharedGaugeVec = Arc<dyn GaugeVecMetric>;
pub type SharedObserverVec = Arc<dyn ObserverVecMetric>;

// ============================================================================
// LABEL RESOLUTION
// ============================================================================

/// Resolve label values in declaration order.
///
/// Declared names without a supplied value resolve to `""`.
pub fn resolve_label_values<'a>(label_names: &'a [String], labels: &'a Labels) -> Vec<&'a str> {
    label_names
        .iter()
        .map(|name| labels.get(name).map(String::as_str).unwrap_or(""))
        .collect()
}

/// Supplied label names that are not declared dimensions, sorted.
pub fn undeclared_labels<'a>(label_names: &[String], labels: &'a Labels) -> Vec<&'a str> {
    let mut extra: Vec<&str> = labels
        .keys()
        .filter(|key| !label_names.iter().any(|name| name == *key))
        .map(String::as_str)
        .collect();
    extra.sort_unstable();
    extra
}

fn unix_time_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
