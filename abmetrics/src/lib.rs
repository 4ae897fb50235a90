//! abmetrics - Metrics Abstraction Layer
//!
//! Lets a service emit counters, gauges and histograms without binding call
//! sites to a metrics backend, and times individual operations.
//!
//! - [`MetricsContext`]: explicit, initialized state for one service
//! - [`initialize`], [`set_provider`] and the convenience constructors:
//!   process-wide default provider and context
//! - [`RuntimeBridge`]: periodic mirroring of async-runtime statistics
//! - [`DbMetrics`] / [`DbCall`]: call-lifecycle timing
//! - [`HttpMetrics`] and, with the `axum` feature, `http_metrics_middleware`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use abmetrics::{labels, MetricsContext, MetricsOptions, PrometheusProvider};
//!
//! let ctx = MetricsContext::initialize(
//!     Arc::new(PrometheusProvider::default()),
//!     "orders",
//!     None,
//!     MetricsOptions::from_env(),
//! )?;
//!
//! let bans = ctx.db_metrics("bans", &["table"])?;
//! let mut call = bans.new_call("get_ban");
//! call.with_label(&labels! { "table" => "bans" });
//! call.call_ended();
//! ```

pub mod bridge;
pub mod config;
pub mod context;
pub mod db;
pub mod http;
pub mod registry;

pub use bridge::{BridgeSnapshot, RuntimeBridge, TokioRuntimeSource};
pub use config::MetricsOptions;
pub use context::MetricsContext;
pub use db::{result_label, DbCall, DbMetrics, PoolMetrics, PoolStats};
#[cfg(feature = "axum")]
pub use http::http_metrics_middleware;
pub use http::{HttpMetrics, HttpRequestLabels};
pub use registry::{
    context, counter, counter_vec, default_provider, gauge, gauge_vec, histogram, histogram_vec,
    histogram_vec_with_buckets, histogram_with_buckets, initialize, new_db_metrics, service_name,
    set_provider, summary, summary_vec,
};

pub use abmetrics_core::{
    constants, labels, metric_name, sanitize_name, BuildInfo, CounterMetric, CounterVecMetric,
    GaugeMetric, GaugeVecMetric, Labels, MetricsError, MetricsResult, ObserverKind,
    ObserverMetric, ObserverVecMetric, Provider, RuntimeStatsSource, SharedCounter,
    SharedCounterVec, SharedGauge, SharedGaugeVec, SharedObserver, SharedObserverVec,
    StatDescriptor, StatKind, StatValue,
};
pub use abmetrics_prometheus::{PrometheusProvider, PrometheusProviderOpts};
