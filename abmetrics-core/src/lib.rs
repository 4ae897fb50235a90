//! abmetrics Core - Metric Capability Model
//!
//! Backend-independent shapes for counters, gauges and observers, the
//! `Provider` trait that manufactures them, metric naming rules and the
//! runtime statistic model. No backend and no async runtime live here.

pub mod build_info;
pub mod constants;
pub mod error;
mod macros;
pub mod model;
pub mod naming;
pub mod provider;
pub mod runtime;

pub use build_info::BuildInfo;
pub use error::{MetricsError, MetricsResult};
pub use model::{
    resolve_label_values, undeclared_labels, CounterMetric, CounterVecMetric, GaugeMetric,
    GaugeVecMetric, Labels, ObserverMetric, ObserverVecMetric, SharedCounter, SharedCounterVec,
    SharedGauge, SharedGaugeVec, SharedObserver, SharedObserverVec,
};
pub use naming::{is_sanitized, metric_name, sanitize_name};
pub use provider::{ObserverKind, Provider};
pub use runtime::{RuntimeStatsSource, StatDescriptor, StatKind, StatValue};
