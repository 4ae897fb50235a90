//! Provider capability
//!
//! A `Provider` manufactures vector metrics of each shape and registers them
//! with whatever backend it is bound to. Registration is irreversible: the
//! returned vector stays bound to its name, help text and label names for
//! the life of the process.
//!
//! # Preconditions
//!
//! - `name` must be non-empty after sanitization
//! - `labels` must be distinct; duplicates are a caller bug and are left to
//!   the backend to reject
//!
//! A name that collides with an already registered metric after
//! sanitization is reported as [`MetricsError::AlreadyRegistered`] and must
//! be propagated by the caller.
//!
//! [`MetricsError::AlreadyRegistered`]: crate::MetricsError::AlreadyRegistered

use crate::build_info::BuildInfo;
use crate::constants::DEFAULT_BUCKETS;
use crate::error::MetricsResult;
use crate::model::{SharedCounterVec, SharedGaugeVec, SharedObserverVec};

/// The distribution shape of an observer metric.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverKind {
    /// Cumulative buckets. An empty bucket list means [`DEFAULT_BUCKETS`].
    Histogram { buckets: Vec<f64> },
    /// Streaming quantiles.
    Summary,
}

impl ObserverKind {
    /// A histogram with the given buckets.
    pub fn histogram(buckets: &[f64]) -> Self {
        Self::Histogram {
            buckets: buckets.to_vec(),
        }
    }

    /// Buckets with the default ladder substituted for an empty list.
    /// `None` for summaries.
    pub fn effective_buckets(&self) -> Option<&[f64]> {
        match self {
            Self::Histogram { buckets } if buckets.is_empty() => Some(DEFAULT_BUCKETS),
            Self::Histogram { buckets } => Some(buckets),
            Self::Summary => None,
        }
    }
}

/// A metrics backend.
///
/// Implementations must make every handle they return safe for concurrent
/// use from many threads.
pub trait Provider: Send + Sync {
    /// Create and register a counter vector.
    fn new_counter(&self, name: &str, help: &str, labels: &[&str]) -> MetricsResult<SharedCounterVec>;

    /// Create and register a gauge vector.
    fn new_gauge(&self, name: &str, help: &str, labels: &[&str]) -> MetricsResult<SharedGaugeVec>;

    /// Create and register a histogram or summary vector.
    fn new_observer(
        &self,
        name: &str,
        help: &str,
        kind: ObserverKind,
        labels: &[&str],
    ) -> MetricsResult<SharedObserverVec>;

    /// Register the constant build-info gauge under `name` and set it to 1.
    ///
    /// Invoked once per initialization; not intended for application code.
    fn init_build_info(&self, name: &str, info: &BuildInfo) -> MetricsResult<()>;

    /// Create and register a histogram vector. Empty `buckets` selects the
    /// default ladder.
    fn new_histogram(
        &self,
        name: &str,
        help: &str,
        buckets: &[f64],
        labels: &[&str],
    ) -> MetricsResult<SharedObserverVec> {
        self.new_observer(name, help, ObserverKind::histogram(buckets), labels)
    }

    /// Create and register a summary vector.
    fn new_summary(&self, name: &str, help: &str, labels: &[&str]) -> MetricsResult<SharedObserverVec> {
        self.new_observer(name, help, ObserverKind::Summary, labels)
    }
}
