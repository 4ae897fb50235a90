//! Runtime statistics bridge against scripted sources, on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use abmetrics::{MetricsContext, MetricsOptions, RuntimeBridge, StatDescriptor, StatKind, StatValue};
use abmetrics_test_utils::{Operation, RecordingProvider, StaticStatsSource};

const GOROUTINES: &str = "/sched/goroutines:goroutines";
const LATENCIES: &str = "/sched/latencies:seconds";

fn scripted() -> Arc<StaticStatsSource> {
    Arc::new(
        StaticStatsSource::new()
            .with_stat(
                StatDescriptor::new(GOROUTINES, "Live tasks", StatKind::Uint64),
                Some(StatValue::Uint64(8)),
            )
            .with_stat(
                StatDescriptor::new(LATENCIES, "Scheduling latency", StatKind::Float64Histogram),
                Some(StatValue::Float64Histogram {
                    buckets: vec![0.5, 2.0],
                }),
            ),
    )
}

#[tokio::test(start_paused = true)]
async fn test_every_descriptor_sampled_after_ticks() {
    let provider = RecordingProvider::new();
    let source = scripted();
    let bridge = RuntimeBridge::start(&provider, source.clone(), Duration::from_secs(2)).unwrap();
    assert_eq!(bridge.tracked(), 2);

    tokio::time::sleep(Duration::from_secs(7)).await;
    let snapshot = bridge.shutdown().await;

    assert!(snapshot.ticks >= 3);
    let sets = provider.operations_for("ab_service__sched_goroutines:goroutines");
    assert!(!sets.is_empty());
    assert!(sets.iter().all(|op| op.op == Operation::Set(8.0)));

    // Every tick re-observes the whole distribution.
    let observed = provider.observations("ab_service__sched_latencies:seconds");
    assert_eq!(observed.len() as u64, snapshot.histogram_observations);
    assert_eq!(observed.len() as u64, 2 * snapshot.ticks);
}

#[tokio::test(start_paused = true)]
async fn test_descriptor_added_after_start_is_ignored() {
    let provider = RecordingProvider::new();
    let source = scripted();
    let bridge = RuntimeBridge::start(&provider, source.clone(), Duration::from_secs(2)).unwrap();

    source.add_stat(
        StatDescriptor::new("/gc/cycles:cycles", "GC cycles", StatKind::Uint64),
        Some(StatValue::Uint64(3)),
    );
    tokio::time::sleep(Duration::from_secs(5)).await;
    bridge.shutdown().await;

    assert!(provider.registered("ab_service__gc_cycles:cycles").is_none());
    assert_eq!(source.read_count("/gc/cycles:cycles"), 0);
    assert!(source.read_count(GOROUTINES) >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_values_follow_the_source() {
    let provider = RecordingProvider::new();
    let source = scripted();
    let bridge = RuntimeBridge::start(&provider, source.clone(), Duration::from_secs(2)).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    source.set_value(GOROUTINES, StatValue::Uint64(20));
    tokio::time::sleep(Duration::from_secs(2)).await;
    bridge.shutdown().await;

    let values: Vec<Operation> = provider
        .operations_for("ab_service__sched_goroutines:goroutines")
        .into_iter()
        .map(|op| op.op)
        .collect();
    assert_eq!(values.first(), Some(&Operation::Set(8.0)));
    assert_eq!(values.last(), Some(&Operation::Set(20.0)));
}

#[tokio::test(start_paused = true)]
async fn test_stop_ends_sampling() {
    let provider = RecordingProvider::new();
    let bridge = RuntimeBridge::start(&provider, scripted(), Duration::from_secs(2)).unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    bridge.stop();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!bridge.is_running());

    let before = provider.operations().len();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(provider.operations().len(), before);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_bridge_ends_sampling() {
    let provider = RecordingProvider::new();
    let source = scripted();
    let bridge = RuntimeBridge::start(&provider, source.clone(), Duration::from_secs(2)).unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    drop(bridge);
    tokio::time::sleep(Duration::from_secs(1)).await;

    let reads = source.read_count(GOROUTINES);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(source.read_count(GOROUTINES), reads);
}

#[tokio::test(start_paused = true)]
async fn test_context_with_custom_interval() {
    let provider = RecordingProvider::new();
    let ctx = MetricsContext::initialize(
        provider.shared(),
        "orders",
        None,
        MetricsOptions::default()
            .with_runtime_stats_source(scripted())
            .with_runtime_metrics_interval(Duration::from_millis(500)),
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(1800)).await;
    let snapshot = ctx.shutdown().await.unwrap();
    assert!(snapshot.ticks >= 3);
    assert_eq!(snapshot.samples_skipped, 0);
}

#[tokio::test]
async fn test_default_source_is_the_tokio_runtime() {
    let provider = RecordingProvider::new();
    let ctx = MetricsContext::initialize(
        provider.shared(),
        "orders",
        None,
        MetricsOptions::default(),
    )
    .unwrap();

    assert!(ctx.runtime_metrics_running());
    assert!(provider
        .registered("ab_service__tokio_runtime_workers:threads")
        .is_some());
    ctx.shutdown().await;
}
