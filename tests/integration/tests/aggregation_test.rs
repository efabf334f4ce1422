//! Stream aggregation across instances

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use vistream::backend::{BackendKind, VideoBackend};
use vistream::stream::{QualityProfile, Resolution, Stream, StreamAggregator, StreamFormat};
use vistream::utils::LoadState;
use vistream_integration_tests::instance;
use vistream_integration_tests::mock_backend::MockBackend;

fn streams() -> Vec<Stream> {
    vec![
        Stream::single("https://cdn/360.mp4", Resolution::SD360, StreamFormat::Mp4),
        Stream::single("https://cdn/720.mp4", Resolution::HD720, StreamFormat::Mp4),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_failing_instance_does_not_block_others() {
    let good: Arc<dyn VideoBackend> = Arc::new(
        MockBackend::new(instance("piped", BackendKind::Piped), streams()).with_delay(Duration::from_millis(50)),
    );
    let bad: Arc<dyn VideoBackend> = Arc::new(
        MockBackend::new(instance("inv", BackendKind::Invidious), Vec::new())
            .failing("503 Service Unavailable")
            .with_delay(Duration::from_millis(10)),
    );
    let aggregator = StreamAggregator::new(vec![bad, good]);

    let mut seen = Vec::new();
    let result = aggregator
        .load_streams_with("abc", |report| seen.push(report.instance.id.clone()))
        .await;

    assert_eq!(seen, vec!["inv".to_string(), "piped".to_string()]);
    assert_eq!(result.streams.len(), 2);
    assert!(result
        .streams
        .iter()
        .all(|s| s.instance.as_ref().map(|i| i.id.as_str()) == Some("piped")));

    let failures: Vec<_> = result.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].instance.id, "inv");
    assert!(matches!(&failures[0].outcome, LoadState::Failed(m) if m.contains("503")));

    let selected = QualityProfile::default().select_stream(&result.streams).unwrap();
    assert_eq!(selected.resolution, Resolution::HD720);
}

#[tokio::test(start_paused = true)]
async fn test_instances_are_queried_concurrently() {
    let backends: Vec<Arc<dyn VideoBackend>> = ["a", "b", "c"]
        .iter()
        .map(|id| {
            Arc::new(
                MockBackend::new(instance(id, BackendKind::Piped), streams()).with_delay(Duration::from_millis(200)),
            ) as Arc<dyn VideoBackend>
        })
        .collect();
    let aggregator = StreamAggregator::new(backends);

    let started = Instant::now();
    let result = aggregator.load_streams("abc").await;

    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(result.streams.len(), 6);
    assert_eq!(result.reports.len(), 3);
    // Sorted by resolution descending, duplicates from other instances kept
    assert_eq!(result.streams[0].resolution, Resolution::HD720);
    assert_eq!(result.streams[5].resolution, Resolution::SD360);
}

#[tokio::test]
async fn test_no_instances_yields_nothing() {
    let aggregator = StreamAggregator::new(Vec::new());
    let result = aggregator.load_streams("abc").await;
    assert!(result.streams.is_empty());
    assert!(result.reports.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_two_instance_scenario_waits_for_failure() {
    let adaptive = Stream::split(
        "https://cdn/audio.m4a",
        "https://cdn/720.mp4",
        Resolution::HD720,
        StreamFormat::Avc1,
    );
    let first: Arc<dyn VideoBackend> = Arc::new(
        MockBackend::new(instance("one", BackendKind::Invidious), vec![adaptive.clone()])
            .with_delay(Duration::from_millis(10)),
    );
    let second: Arc<dyn VideoBackend> = Arc::new(
        MockBackend::new(instance("two", BackendKind::Piped), Vec::new())
            .failing("connection refused")
            .with_delay(Duration::from_millis(100)),
    );
    let aggregator = StreamAggregator::new(vec![first, second]);

    let started = Instant::now();
    let result = aggregator.load_streams("abc").await;

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(result.streams, vec![adaptive]);
    assert_eq!(result.streams[0].instance.as_ref().map(|i| i.id.as_str()), Some("one"));
    assert_eq!(result.reports.len(), 2);
}
