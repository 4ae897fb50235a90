//! abmetrics Prometheus - Concrete Backend
//!
//! Binds the abmetrics [`Provider`](abmetrics_core::Provider) interface to
//! the `prometheus` crate. Exposition (scrape endpoints, text encoding) is
//! left to the embedding application via [`PrometheusProvider::registry`].

mod provider;
mod vec;

pub use provider::{PrometheusProvider, PrometheusProviderOpts};
