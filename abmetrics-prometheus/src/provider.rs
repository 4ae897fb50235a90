//! Prometheus provider
//!
//! Implements [`Provider`] on top of a `prometheus::Registry`. Every factory
//! call sanitizes the name, builds the vector and registers it; a duplicate
//! sanitized name comes back as [`MetricsError::AlreadyRegistered`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use abmetrics_core::{
    sanitize_name, BuildInfo, MetricsError, MetricsResult, ObserverKind, Provider,
    SharedCounterVec, SharedGaugeVec, SharedObserverVec,
};
use prometheus::core::Collector;
use prometheus::{CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};

use crate::vec::{Dimensions, PrometheusCounterVec, PrometheusGaugeVec, PrometheusObserverVec};

const BUILD_INFO_HELP: &str = "A metric with a constant '1' value labeled by version, revision, \
    build date, git hash and role seeding version from which the service was built";

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Prometheus provider configuration.
#[derive(Clone, Default)]
pub struct PrometheusProviderOpts {
    /// Registry to register metrics with. `None` selects the process-wide
    /// default registry.
    pub registry: Option<Registry>,

    /// Register a process collector (CPU, memory, file descriptors) with the
    /// registry. The default registry already carries one when the
    /// `process` feature is enabled, so only set this for custom registries.
    pub register_process_collector: bool,
}

impl fmt::Debug for PrometheusProviderOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusProviderOpts")
            .field("custom_registry", &self.registry.is_some())
            .field("register_process_collector", &self.register_process_collector)
            .finish()
    }
}

// ============================================================================
// PROVIDER
// ============================================================================

/// [`Provider`] backed by a Prometheus registry.
#[derive(Clone)]
pub struct PrometheusProvider {
    registry: Registry,
}

impl PrometheusProvider {
    /// Create a provider from options.
    pub fn new(opts: PrometheusProviderOpts) -> MetricsResult<Self> {
        let registry = opts
            .registry
            .unwrap_or_else(|| prometheus::default_registry().clone());
        let provider = Self { registry };

        if opts.register_process_collector {
            provider.register_process_collector()?;
        }

        Ok(provider)
    }

    /// Create a provider bound to `registry`.
    pub fn with_registry(registry: Registry) -> Self {
        Self { registry }
    }

    /// The registry this provider registers metrics with.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[cfg(all(feature = "process", target_os = "linux"))]
    fn register_process_collector(&self) -> MetricsResult<()> {
        let collector = prometheus::process_collector::ProcessCollector::for_self();
        self.register("process_collector", collector)
    }

    #[cfg(not(all(feature = "process", target_os = "linux")))]
    fn register_process_collector(&self) -> MetricsResult<()> {
        tracing::warn!("Process collector requested but not supported on this build");
        Ok(())
    }

    fn register<C: Collector + 'static>(&self, name: &str, collector: C) -> MetricsResult<()> {
        self.registry
            .register(Box::new(collector))
            .map_err(|e| registration_error(name, e))
    }
}

impl Default for PrometheusProvider {
    /// A provider bound to the process-wide default registry.
    fn default() -> Self {
        Self::with_registry(prometheus::default_registry().clone())
    }
}

impl fmt::Debug for PrometheusProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusProvider").finish_non_exhaustive()
    }
}

impl Provider for PrometheusProvider {
    fn new_counter(&self, name: &str, help: &str, labels: &[&str]) -> MetricsResult<SharedCounterVec> {
        let name = sanitize_name(name);
        let vec = CounterVec::new(Opts::new(name.clone(), help_or_name(help, &name)), labels)
            .map_err(|e| registration_error(&name, e))?;
        self.register(&name, vec.clone())?;

        tracing::debug!(metric = %name, kind = "counter", labels = ?labels, "Registered metric");
        Ok(Arc::new(PrometheusCounterVec {
            dims: Dimensions::new(&name, labels),
            vec,
        }))
    }

    fn new_gauge(&self, name: &str, help: &str, labels: &[&str]) -> MetricsResult<SharedGaugeVec> {
        let name = sanitize_name(name);
        let vec = GaugeVec::new(Opts::new(name.clone(), help_or_name(help, &name)), labels)
            .map_err(|e| registration_error(&name, e))?;
        self.register(&name, vec.clone())?;

        tracing::debug!(metric = %name, kind = "gauge", labels = ?labels, "Registered metric");
        Ok(Arc::new(PrometheusGaugeVec {
            dims: Dimensions::new(&name, labels),
            vec,
        }))
    }

    fn new_observer(
        &self,
        name: &str,
        help: &str,
        kind: ObserverKind,
        labels: &[&str],
    ) -> MetricsResult<SharedObserverVec> {
        let name = sanitize_name(name);

        // The prometheus crate has no summary type; summaries are recorded
        // as histograms over the default ladder.
        let buckets = kind
            .effective_buckets()
            .unwrap_or(abmetrics_core::constants::DEFAULT_BUCKETS)
            .to_vec();
        let opts = HistogramOpts::new(name.clone(), help_or_name(help, &name)).buckets(buckets);
        let vec = HistogramVec::new(opts, labels).map_err(|e| registration_error(&name, e))?;
        self.register(&name, vec.clone())?;

        tracing::debug!(metric = %name, kind = ?kind, labels = ?labels, "Registered metric");
        Ok(Arc::new(PrometheusObserverVec {
            dims: Dimensions::new(&name, labels),
            vec,
        }))
    }

    fn init_build_info(&self, name: &str, info: &BuildInfo) -> MetricsResult<()> {
        let name = sanitize_name(name);
        let const_labels: HashMap<String, String> = info
            .const_labels()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let gauge = Gauge::with_opts(Opts::new(name.clone(), BUILD_INFO_HELP).const_labels(const_labels))
            .map_err(|e| registration_error(&name, e))?;

        match self.registry.register(Box::new(gauge.clone())) {
            Ok(()) => {}
            // Identical constant gauge from an earlier initialization.
            Err(prometheus::Error::AlreadyReg) => {
                tracing::debug!(metric = %name, "Build info already registered");
            }
            Err(e) => return Err(registration_error(&name, e)),
        }

        gauge.set(1.0);
        tracing::debug!(metric = %name, version = %info.version, "Registered build info");
        Ok(())
    }
}

fn help_or_name<'a>(help: &'a str, name: &'a str) -> &'a str {
    if help.is_empty() {
        name
    } else {
        help
    }
}

/// Map a registration failure from the prometheus crate.
pub(crate) fn registration_error(name: &str, err: prometheus::Error) -> MetricsError {
    match err {
        prometheus::Error::AlreadyReg => MetricsError::AlreadyRegistered {
            name: name.to_string(),
        },
        prometheus::Error::Msg(reason) => MetricsError::invalid(name, reason),
        other => MetricsError::backend(other.to_string()),
    }
}
