//! Call-lifecycle timing for database access
//!
//! A [`DbMetrics`] group owns one latency histogram per logical resource
//! (one DAO, one table, one repository). Every timed operation opens a
//! [`DbCall`] from the group, optionally decorates it with labels and an
//! error outcome, and ends it exactly once:
//!
//! ```text
//! Created -> (with_label)* -> (error)? -> Ended
//! ```
//!
//! Ending the call records one sample labelled with `action` and `result`
//! (`success` or `error`). A call that is dropped without being ended
//! records nothing.
//!
//! # Example
//!
//! ```ignore
//! let bans = ctx.db_metrics("bans", &["table"])?;
//!
//! let mut call = bans.new_call("get_ban");
//! call.with_label(&labels! { "table" => "bans" });
//! let result = dao.get_ban(id).await;
//! call.finish(&result);
//! ```

use std::fmt;
use std::time::Duration;

use abmetrics_core::constants::{
    DB_LATENCY_SUFFIX, LABEL_ACTION, LABEL_INSTANCE, LABEL_RESULT, RESULT_ERROR, RESULT_SUCCESS,
};
use abmetrics_core::{
    labels, metric_name, Labels, MetricsResult, ObserverVecMetric, Provider, SharedObserverVec,
};
use chrono::{DateTime, Utc};

// ============================================================================
// METRICS GROUP
// ============================================================================

/// Latency histogram shared by every call on one resource.
#[derive(Clone)]
pub struct DbMetrics {
    resource: String,
    latency: SharedObserverVec,
}

impl DbMetrics {
    /// Register the latency histogram for `resource`.
    ///
    /// The histogram is named `metric_name(service_name, "<resource>_db_latency_seconds")`
    /// and carries the dimensions `action`, `result` and `extra_labels`.
    pub fn new(
        provider: &dyn Provider,
        service_name: &str,
        resource: &str,
        extra_labels: &[&str],
    ) -> MetricsResult<Self> {
        let mut label_names = vec![LABEL_ACTION, LABEL_RESULT];
        label_names.extend_from_slice(extra_labels);

        let name = metric_name(service_name, &format!("{}_{}", resource, DB_LATENCY_SUFFIX));
        let latency = provider.new_histogram(
            &name,
            &format!("Latency of {} in seconds", resource),
            &[],
            &label_names,
        )?;

        Ok(Self {
            resource: resource.to_string(),
            latency,
        })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Open a timed call. The start time is captured immediately.
    pub fn new_call(&self, action: impl Into<String>) -> DbCall<'_> {
        DbCall {
            latency: self.latency.as_ref(),
            action: action.into(),
            labels: Labels::new(),
            started_at: Some(Utc::now()),
            ended_at: None,
            failed: false,
        }
    }
}

impl fmt::Debug for DbMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbMetrics")
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TIMED CALL
// ============================================================================

/// One timed operation.
///
/// `with_label` merges into the label map; a later value for the same key
/// overwrites an earlier one. `action` and `result` are written last when
/// the call ends and override any caller value under those keys.
#[must_use = "a call records nothing unless `call_ended` or `finish` is invoked"]
pub struct DbCall<'a> {
    latency: &'a dyn ObserverVecMetric,
    action: String,
    labels: Labels,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    failed: bool,
}

impl<'a> DbCall<'a> {
    /// Merge `labels` into the call's labels.
    pub fn with_label(&mut self, labels: &Labels) -> &mut Self {
        self.labels
            .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Mark the call as failed.
    pub fn error(&mut self) -> &mut Self {
        self.failed = true;
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn is_error(&self) -> bool {
        self.failed
    }

    /// End the call and record one latency sample. Returns the elapsed time.
    pub fn call_ended(mut self) -> Duration {
        self.ended_at = Some(Utc::now());

        let elapsed = self.elapsed();
        let mut labels = std::mem::take(&mut self.labels);
        labels.insert(LABEL_ACTION.to_string(), self.action.clone());
        labels.insert(LABEL_RESULT.to_string(), result_label(self.failed).to_string());

        self.latency.with(&labels).observe(elapsed.as_secs_f64());
        elapsed
    }

    /// Mark the call failed when `result` is an error, then end it.
    pub fn finish<T, E>(mut self, result: &Result<T, E>) -> Duration {
        if result.is_err() {
            self.error();
        }
        self.call_ended()
    }

    /// `end - start`, zero when either is unset or the clock went backwards.
    fn elapsed(&self) -> Duration {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => (end - start).to_std().unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }
}

impl fmt::Debug for DbCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbCall")
            .field("action", &self.action)
            .field("labels", &self.labels)
            .field("started_at", &self.started_at)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

/// Value of the `result` label.
pub fn result_label(failed: bool) -> &'static str {
    if failed {
        RESULT_ERROR
    } else {
        RESULT_SUCCESS
    }
}

// ============================================================================
// CONNECTION POOL STATISTICS
// ============================================================================

/// Point-in-time statistics of a database connection pool.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolStats {
    pub max_open_connections: u64,
    /// Established connections, both in use and idle
    pub open_connections: u64,
    pub in_use: u64,
    pub idle: u64,
    /// Total connections waited for
    pub wait_count: u64,
    /// Total time blocked waiting for a new connection
    pub wait_duration: Duration,
    pub max_idle_closed: u64,
    pub max_idle_time_closed: u64,
    pub max_lifetime_closed: u64,
}

/// Connection-pool histograms, one per [`PoolStats`] field, labelled by
/// `instance`.
#[derive(Clone)]
pub struct PoolMetrics {
    max_open_connections: SharedObserverVec,
    open_connections: SharedObserverVec,
    in_use: SharedObserverVec,
    idle: SharedObserverVec,
    wait_count: SharedObserverVec,
    wait_duration: SharedObserverVec,
    max_idle_closed: SharedObserverVec,
    max_idle_time_closed: SharedObserverVec,
    max_lifetime_closed: SharedObserverVec,
}

impl PoolMetrics {
    /// Register the nine `postgres_db_stat_*` histograms. `database` only
    /// appears in the help text.
    pub fn new(provider: &dyn Provider, database: &str) -> MetricsResult<Self> {
        let register = |suffix: &str, help: &str| {
            provider.new_histogram(
                &format!("postgres_db_stat_{}", suffix),
                &format!("{} on {}", help, database),
                &[],
                &[LABEL_INSTANCE],
            )
        };

        Ok(Self {
            max_open_connections: register("max_open_connections", "Maximum open connections")?,
            open_connections: register(
                "open_connections",
                "Established connections both in use and idle",
            )?,
            in_use: register("in_use", "Connections currently in use")?,
            idle: register("idle", "Idle connections")?,
            wait_count: register("wait_count", "Total connections waited for")?,
            wait_duration: register(
                "wait_duration",
                "Total time blocked waiting for a new connection",
            )?,
            max_idle_closed: register(
                "max_idle_closed",
                "Total connections closed due to the idle connection limit",
            )?,
            max_idle_time_closed: register(
                "max_idle_time_closed",
                "Total connections closed due to the idle time limit",
            )?,
            max_lifetime_closed: register(
                "max_lifetime_closed",
                "Total connections closed due to the connection lifetime limit",
            )?,
        })
    }

    /// Record one sample of every statistic for `instance`.
    pub fn observe(&self, instance: &str, stats: &PoolStats) {
        let labels = labels! { LABEL_INSTANCE => instance };
        let samples = [
            (&self.max_open_connections, stats.max_open_connections as f64),
            (&self.open_connections, stats.open_connections as f64),
            (&self.in_use, stats.in_use as f64),
            (&self.idle, stats.idle as f64),
            (&self.wait_count, stats.wait_count as f64),
            (&self.wait_duration, stats.wait_duration.as_secs_f64()),
            (&self.max_idle_closed, stats.max_idle_closed as f64),
            (&self.max_idle_time_closed, stats.max_idle_time_closed as f64),
            (&self.max_lifetime_closed, stats.max_lifetime_closed as f64),
        ];
        for (histogram, value) in samples {
            histogram.with(&labels).observe(value);
        }
    }
}

impl fmt::Debug for PoolMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolMetrics").finish_non_exhaustive()
    }
}
