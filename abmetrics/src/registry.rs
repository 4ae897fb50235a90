//! Default provider registry and global initialization
//!
//! Process-wide state for call sites that do not carry a
//! [`MetricsContext`]:
//!
//! - the default [`Provider`], initially a [`PrometheusProvider`] bound to
//!   the process-wide default registry, replaceable with [`set_provider`]
//! - the context built by the last global [`initialize`]
//!
//! # Swapping the default provider
//!
//! The convenience constructors resolve the default provider when they are
//! called. Metrics created before a [`set_provider`] stay bound to the old
//! provider; only metrics created afterwards use the new one. Swap the
//! provider before creating any metric.
//!
//! # Initialization
//!
//! [`initialize`] replaces the global context. Concurrent calls are
//! serialized by the context slot's lock but the embedding application
//! should still initialize once, at startup.

use std::sync::{Arc, PoisonError, RwLock};

use abmetrics_core::constants::GENERIC_SERVICE_NAME;
use abmetrics_core::{
    BuildInfo, Labels, MetricsResult, Provider, SharedCounter, SharedCounterVec, SharedGauge,
    SharedGaugeVec, SharedObserver, SharedObserverVec,
};
use abmetrics_prometheus::PrometheusProvider;
use once_cell::sync::Lazy;

use crate::config::MetricsOptions;
use crate::context::MetricsContext;
use crate::db::DbMetrics;

static DEFAULT_PROVIDER: Lazy<RwLock<Arc<dyn Provider>>> =
    Lazy::new(|| RwLock::new(Arc::new(PrometheusProvider::default())));

static CONTEXT: Lazy<RwLock<Option<Arc<MetricsContext>>>> = Lazy::new(|| RwLock::new(None));

// ============================================================================
// DEFAULT PROVIDER
// ============================================================================

/// Replace the default provider.
pub fn set_provider(provider: Arc<dyn Provider>) {
    *DEFAULT_PROVIDER
        .write()
        .unwrap_or_else(PoisonError::into_inner) = provider;
    tracing::debug!("Default metrics provider replaced");
}

/// The current default provider.
pub fn default_provider() -> Arc<dyn Provider> {
    DEFAULT_PROVIDER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn same_provider(a: &Arc<dyn Provider>, b: &Arc<dyn Provider>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

// ============================================================================
// GLOBAL CONTEXT
// ============================================================================

/// Initialize metrics for `service_name` on the default provider and make
/// the result the global context.
///
/// Re-initializing on an unchanged default provider reuses what the previous
/// context registered: the `ab_service_request_http` histogram (also when a
/// custom one was active in between) and the runtime statistic metrics. The
/// runtime bridge is restarted with the interval and source from `options`.
///
/// The previous runtime bridge is stopped only once the new context is
/// built. On failure the previous context stays installed and keeps
/// running.
///
/// "Unchanged" means the same `Arc`: a second `Arc` wrapping the same
/// backend, such as two [`PrometheusProvider::with_registry`] over one
/// registry, is a different provider. Its registrations collide with the
/// previous ones and this fails with
/// [`MetricsError::AlreadyRegistered`](abmetrics_core::MetricsError::AlreadyRegistered).
pub fn initialize(
    service_name: impl Into<String>,
    build_info: Option<&BuildInfo>,
    options: MetricsOptions,
) -> MetricsResult<Arc<MetricsContext>> {
    let provider = default_provider();
    let mut slot = CONTEXT.write().unwrap_or_else(PoisonError::into_inner);

    let previous = slot.as_ref().map(Arc::clone);
    let reusable = previous
        .as_deref()
        .filter(|previous| same_provider(previous.provider(), &provider));

    let ctx = Arc::new(MetricsContext::assemble(
        provider,
        service_name.into(),
        build_info,
        options,
        reusable,
    )?);

    if let Some(previous) = previous {
        previous.stop_runtime_metrics();
    }
    *slot = Some(Arc::clone(&ctx));
    Ok(ctx)
}

/// The context built by the last successful [`initialize`].
pub fn context() -> Option<Arc<MetricsContext>> {
    CONTEXT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Service name of the global context, `"service"` before initialization.
pub fn service_name() -> String {
    context()
        .map(|ctx| ctx.service_name().to_string())
        .unwrap_or_else(|| GENERIC_SERVICE_NAME.to_string())
}

// ============================================================================
// CONVENIENCE CONSTRUCTORS
// ============================================================================
//
// These register `name` as given (sanitized by the provider) on the default
// provider. Use `MetricsContext` for service-namespaced names.

/// Counter without dynamic labels.
pub fn counter(name: &str, help: &str) -> MetricsResult<SharedCounter> {
    Ok(counter_vec(name, help, &[])?.with(&Labels::new()))
}

/// Counter vector; call `with(labels)` to reach a series.
pub fn counter_vec(name: &str, help: &str, labels: &[&str]) -> MetricsResult<SharedCounterVec> {
    default_provider().new_counter(name, help, labels)
}

/// Gauge without dynamic labels.
pub fn gauge(name: &str, help: &str) -> MetricsResult<SharedGauge> {
    Ok(gauge_vec(name, help, &[])?.with(&Labels::new()))
}

pub fn gauge_vec(name: &str, help: &str, labels: &[&str]) -> MetricsResult<SharedGaugeVec> {
    default_provider().new_gauge(name, help, labels)
}

/// Histogram over the default bucket ladder.
pub fn histogram(name: &str, help: &str) -> MetricsResult<SharedObserver> {
    histogram_with_buckets(name, help, &[])
}

pub fn histogram_with_buckets(name: &str, help: &str, buckets: &[f64]) -> MetricsResult<SharedObserver> {
    Ok(histogram_vec_with_buckets(name, help, buckets, &[])?.with(&Labels::new()))
}

pub fn histogram_vec(name: &str, help: &str, labels: &[&str]) -> MetricsResult<SharedObserverVec> {
    histogram_vec_with_buckets(name, help, &[], labels)
}

pub fn histogram_vec_with_buckets(
    name: &str,
    help: &str,
    buckets: &[f64],
    labels: &[&str],
) -> MetricsResult<SharedObserverVec> {
    default_provider().new_histogram(name, help, buckets, labels)
}

pub fn summary(name: &str, help: &str) -> MetricsResult<SharedObserver> {
    Ok(summary_vec(name, help, &[])?.with(&Labels::new()))
}

pub fn summary_vec(name: &str, help: &str, labels: &[&str]) -> MetricsResult<SharedObserverVec> {
    default_provider().new_summary(name, help, labels)
}

/// Call-lifecycle timing group for `resource` on `provider`, named after
/// the global service name.
pub fn new_db_metrics(
    provider: &dyn Provider,
    resource: &str,
    extra_labels: &[&str],
) -> MetricsResult<DbMetrics> {
    DbMetrics::new(provider, &service_name(), resource, extra_labels)
}
