//! Error types for abmetrics operations

use thiserror::Error;

/// Errors surfaced while creating or registering metrics.
///
/// Per-series operations (`inc`, `set`, `observe`) never fail; everything
/// that can go wrong happens when a metric is registered with a backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetricsError {
    #[error("Metric already registered: {name}")]
    AlreadyRegistered { name: String },

    #[error("Invalid metric {name}: {reason}")]
    InvalidMetric { name: String, reason: String },

    #[error("Metrics backend error: {reason}")]
    Backend { reason: String },

    #[error("Runtime metrics requested outside of a tokio runtime")]
    RuntimeUnavailable,
}

impl MetricsError {
    /// Shorthand for [`MetricsError::InvalidMetric`].
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMetric {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`MetricsError::Backend`].
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }

    /// Whether this error is a duplicate-name registration conflict.
    pub fn is_already_registered(&self) -> bool {
        matches!(self, Self::AlreadyRegistered { .. })
    }
}

/// Result type alias for abmetrics operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_registered_display() {
        let err = MetricsError::AlreadyRegistered {
            name: "ab_orders_build_info".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Metric already registered: ab_orders_build_info"
        );
        assert!(err.is_already_registered());
    }

    #[test]
    fn test_invalid_metric_display() {
        let err = MetricsError::invalid("", "name is empty");
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid metric"));
        assert!(msg.contains("name is empty"));
        assert!(!err.is_already_registered());
    }

    #[test]
    fn test_backend_error_display() {
        let err = MetricsError::backend("inconsistent cardinality");
        assert_eq!(
            err.to_string(),
            "Metrics backend error: inconsistent cardinality"
        );
    }
}
