//! Metric naming
//!
//! Generated names follow `ab.<service>_<metric>`; backends sanitize every
//! name to `[A-Za-z0-9_:]` before registration, which turns the namespace
//! separator into an underscore (`ab_orders_db_latency_seconds`).

use crate::constants::METRIC_NAMESPACE;

/// Compose the namespaced, unsanitized name for `metric` owned by `service`.
pub fn metric_name(service: &str, metric: &str) -> String {
    format!("{}.{}_{}", METRIC_NAMESPACE, service, metric)
}

/// Replace every character outside `[A-Za-z0-9_:]` with `_`.
///
/// A leading digit is replaced as well. The result is idempotent:
/// sanitizing a sanitized name returns it unchanged.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .enumerate()
        .map(|(i, c)| if is_name_char(c, i == 0) { c } else { '_' })
        .collect()
}

/// Whether `name` is already in sanitized form.
pub fn is_sanitized(name: &str) -> bool {
    name.chars().enumerate().all(|(i, c)| is_name_char(c, i == 0))
}

fn is_name_char(c: char, first: bool) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':' || (!first && c.is_ascii_digit())
}
