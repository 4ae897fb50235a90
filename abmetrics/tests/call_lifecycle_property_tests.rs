//! Property-Based Tests for Call-Lifecycle Timing
//!
//! **Property: Call Outcome**
//!
//! For any sequence of `with_label` and `error` calls followed by exactly one
//! `call_ended`, the call records exactly one sample whose labels carry the
//! action it was opened with and `result = "error"` iff `error` was invoked
//! at least once, and whose value is non-negative.

use abmetrics::{labels, DbMetrics, Labels};
use abmetrics_test_utils::{arb_action, arb_labels, RecordingProvider};
use proptest::prelude::*;

const LATENCY: &str = "ab_orders_bans_db_latency_seconds";

#[derive(Debug, Clone)]
enum Step {
    WithLabel(Labels),
    Error,
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => arb_labels().prop_map(Step::WithLabel),
        1 => Just(Step::Error),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_call_outcome_labels(
        action in arb_action(),
        steps in prop::collection::vec(arb_step(), 0..8),
    ) {
        let provider = RecordingProvider::new();
        let group = DbMetrics::new(&provider, "orders", "bans", &["table"]).unwrap();

        let mut call = group.new_call(action.clone());
        let mut expected_table = String::new();
        let mut errored = false;
        for step in &steps {
            match step {
                Step::WithLabel(labels) => {
                    if let Some(table) = labels.get("table") {
                        expected_table = table.clone();
                    }
                    call.with_label(labels);
                }
                Step::Error => {
                    errored = true;
                    call.error();
                }
            }
        }
        let elapsed = call.call_ended();

        let observations = provider.observations(LATENCY);
        prop_assert_eq!(observations.len(), 1);
        let (labels, value) = &observations[0];
        prop_assert_eq!(&labels["action"], &action);
        prop_assert_eq!(&labels["result"], if errored { "error" } else { "success" });
        prop_assert_eq!(&labels["table"], &expected_table);
        prop_assert!(*value >= 0.0);
        prop_assert!(elapsed.as_secs_f64() >= 0.0);
    }
}

#[test]
fn test_bans_call_with_error() {
    let provider = RecordingProvider::new();
    let group = DbMetrics::new(&provider, "orders", "bans", &["table"]).unwrap();

    let mut call = group.new_call("get_ban");
    call.with_label(&labels! { "table" => "bans" });
    call.error();
    call.call_ended();

    let observations = provider.observations(LATENCY);
    assert_eq!(observations.len(), 1);
    let (labels, value) = &observations[0];
    assert_eq!(labels.len(), 3);
    assert_eq!(labels["action"], "get_ban");
    assert_eq!(labels["result"], "error");
    assert_eq!(labels["table"], "bans");
    assert!(*value >= 0.0);
}

#[test]
fn test_concurrent_calls_share_histogram() {
    let provider = RecordingProvider::new();
    let group = DbMetrics::new(&provider, "orders", "bans", &[]).unwrap();

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let group = &group;
            scope.spawn(move || {
                for _ in 0..25 {
                    let mut call = group.new_call(format!("worker_{}", worker));
                    if worker % 2 == 1 {
                        call.error();
                    }
                    call.call_ended();
                }
            });
        }
    });

    let observations = provider.observations(LATENCY);
    assert_eq!(observations.len(), 100);
    let errors = observations
        .iter()
        .filter(|(labels, _)| labels["result"] == "error")
        .count();
    assert_eq!(errors, 50);
}
