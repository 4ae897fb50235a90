//! HTTP request latency
//!
//! One shared histogram, `ab_service_request_http`, labelled by namespace,
//! route template, method and response code. With the `axum` feature,
//! [`http_metrics_middleware`] fills it for every routed request.

use std::fmt;
use std::time::Duration;

use abmetrics_core::constants::{
    GENERIC_SERVICE_NAME, HTTP_LATENCY_BUCKETS, HTTP_METRIC_NAME, LABEL_METHOD, LABEL_NAMESPACE,
    LABEL_PATH, LABEL_RESPONSE_CODE,
};
use abmetrics_core::{labels, metric_name, MetricsResult, Provider, SharedObserverVec};

/// Label values of one HTTP sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequestLabels {
    pub namespace: String,
    /// Route template, not the concrete request path
    pub path: String,
    pub method: String,
    pub response_code: u16,
}

/// The shared HTTP request latency histogram.
#[derive(Clone)]
pub struct HttpMetrics {
    latency: SharedObserverVec,
}

impl HttpMetrics {
    /// Register the default histogram with `provider`.
    pub fn new(provider: &dyn Provider) -> MetricsResult<Self> {
        let latency = provider.new_histogram(
            &metric_name(GENERIC_SERVICE_NAME, HTTP_METRIC_NAME),
            "HTTP request in histogram",
            HTTP_LATENCY_BUCKETS,
            &[LABEL_NAMESPACE, LABEL_PATH, LABEL_METHOD, LABEL_RESPONSE_CODE],
        )?;
        Ok(Self { latency })
    }

    /// Wrap a caller-supplied histogram with the same four dimensions.
    pub fn from_vec(latency: SharedObserverVec) -> Self {
        Self { latency }
    }

    pub fn latency(&self) -> &SharedObserverVec {
        &self.latency
    }

    pub fn observe(&self, request: &HttpRequestLabels, elapsed: Duration) {
        let labels = labels! {
            LABEL_NAMESPACE => &request.namespace,
            LABEL_PATH => &request.path,
            LABEL_METHOD => &request.method,
            LABEL_RESPONSE_CODE => request.response_code.to_string(),
        };
        self.latency.with(&labels).observe(elapsed.as_secs_f64());
    }
}

impl fmt::Debug for HttpMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpMetrics").finish_non_exhaustive()
    }
}

// ============================================================================
// AXUM MIDDLEWARE
// ============================================================================

#[cfg(feature = "axum")]
mod middleware {
    use std::sync::Arc;
    use std::time::Instant;

    use axum::extract::{MatchedPath, RawPathParams, Request, State};
    use axum::middleware::Next;
    use axum::response::Response;

    use super::HttpRequestLabels;
    use crate::MetricsContext;

    /// Record request latency into the context's HTTP histogram.
    ///
    /// Install with `route_layer` so the route is matched before the
    /// middleware runs:
    ///
    /// ```ignore
    /// let app = Router::new()
    ///     .route("/ns/:namespace/bans", get(list_bans))
    ///     .route_layer(axum::middleware::from_fn_with_state(
    ///         ctx.clone(),
    ///         abmetrics::http_metrics_middleware,
    ///     ));
    /// ```
    ///
    /// Requests without a matched route are not recorded. The namespace
    /// label is the value of the path parameter named by
    /// [`MetricsContext::namespace_path_parameter`], empty when absent.
    pub async fn http_metrics_middleware(
        State(ctx): State<Arc<MetricsContext>>,
        matched: Option<MatchedPath>,
        params: Option<RawPathParams>,
        request: Request,
        next: Next,
    ) -> Response {
        let start = Instant::now();
        let method = request.method().to_string();

        let namespace = params
            .as_ref()
            .and_then(|params| {
                params
                    .iter()
                    .find(|(key, _)| *key == ctx.namespace_path_parameter())
                    .map(|(_, value)| value.to_string())
            })
            .unwrap_or_default();

        let response = next.run(request).await;

        if let Some(matched) = matched {
            let labels = HttpRequestLabels {
                namespace,
                path: matched.as_str().to_string(),
                method,
                response_code: response.status().as_u16(),
            };
            ctx.http_metrics().observe(&labels, start.elapsed());
        }

        response
    }
}

#[cfg(feature = "axum")]
pub use middleware::http_metrics_middleware;
