//! Utility macros for reducing boilerplate

/// Build a [`Labels`](crate::Labels) map from `key => value` pairs.
///
/// # Example
/// ```
/// let labels = abmetrics_core::labels! { "table" => "bans", "shard" => 3 };
/// assert_eq!(labels["table"], "bans");
/// assert_eq!(labels["shard"], "3");
/// ```
#[macro_export]
macro_rules! labels {
    () => {
        $crate::Labels::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut labels = $crate::Labels::new();
        $(
            labels.insert(::std::string::ToString::to_string(&$key), ::std::string::ToString::to_string(&$value));
        )+
        labels
    }};
}
