//! Runtime statistic descriptors
//!
//! A `RuntimeStatsSource` exposes a catalog of named, typed statistics of
//! the process's async runtime. The catalog is enumerated once when the
//! runtime bridge starts; afterwards only values are read.

/// Kind of a runtime statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    /// Scalar unsigned integer (counter-like or gauge-like).
    Uint64,
    /// Scalar float.
    Float64,
    /// Distribution of float samples.
    Float64Histogram,
    /// Anything else. No metric is created for it.
    Unsupported,
}

impl StatKind {
    pub fn is_scalar(self) -> bool {
        matches!(self, Self::Uint64 | Self::Float64)
    }
}

/// A named runtime statistic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatDescriptor {
    pub name: String,
    pub description: String,
    pub kind: StatKind,
}

impl StatDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: StatKind) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
        }
    }
}

/// Current value of a runtime statistic.
#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    Uint64(u64),
    Float64(f64),
    /// Bucket values of the current distribution snapshot.
    Float64Histogram { buckets: Vec<f64> },
}

impl StatValue {
    pub fn kind(&self) -> StatKind {
        match self {
            Self::Uint64(_) => StatKind::Uint64,
            Self::Float64(_) => StatKind::Float64,
            Self::Float64Histogram { .. } => StatKind::Float64Histogram,
        }
    }

    /// Scalar value as `f64`, `None` for histograms.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Uint64(v) => Some(*v as f64),
            Self::Float64(v) => Some(*v),
            Self::Float64Histogram { .. } => None,
        }
    }
}

/// Source of runtime statistics.
pub trait RuntimeStatsSource: Send + Sync {
    /// The full catalog of statistics this source can report.
    fn describe(&self) -> Vec<StatDescriptor>;

    /// Read the current value of the statistic called `name`.
    ///
    /// `None` means the statistic is not available right now.
    fn read(&self, name: &str) -> Option<StatValue>;
}
