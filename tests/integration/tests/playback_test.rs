//! End-to-end playback sessions against scripted collaborators

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use vistream::backend::{BackendKind, VideoBackend};
use vistream::cache::{DirectoryCache, PersistentCache};
use vistream::media::Video;
use vistream::segments::SegmentService;
use vistream::player::{EventSubscription, PlayerEvent, PlayerModel, Renderer, SeekType, Timeline};
use vistream::stream::{Resolution, Stream, StreamFormat};
use vistream::utils::{Config, LoadState};
use vistream_integration_tests::mock_backend::MockBackend;
use vistream_integration_tests::mock_loader::LatencyLoader;
use vistream_integration_tests::mock_renderer::RecordingRenderer;
use vistream_integration_tests::mock_segments::FixedSegments;
use vistream_integration_tests::{instance, EventRecorder};

fn backend() -> Arc<MockBackend> {
    Arc::new(MockBackend::new(
        instance("piped", BackendKind::Piped),
        vec![
            Stream::single("https://cdn/720.mp4", Resolution::HD720, StreamFormat::Mp4),
            Stream::split(
                "https://cdn/slow-audio.m4a",
                "https://cdn/slow-1080.mp4",
                Resolution::HD1080,
                StreamFormat::Avc1,
            ),
        ],
    ))
}

struct Session {
    model: PlayerModel,
    _subscription: EventSubscription,
    renderer: Arc<RecordingRenderer>,
    backend: Arc<MockBackend>,
    segments: Arc<FixedSegments>,
    events: EventRecorder,
}

fn session(config: Config, cache: Option<Arc<dyn PersistentCache>>) -> Session {
    let renderer = RecordingRenderer::new();
    let backend = backend();
    let segments = FixedSegments::sponsor(&[(10.0, 20.0)]);
    let events = EventRecorder::new();

    let mut builder = PlayerModel::builder()
        .with_config(config)
        .with_backends(vec![Arc::clone(&backend) as Arc<dyn VideoBackend>])
        .with_renderer(Arc::clone(&renderer) as Arc<dyn Renderer>)
        .with_asset_loader(Arc::new(LatencyLoader))
        .with_segment_service(Arc::clone(&segments) as Arc<dyn SegmentService>);
    if let Some(cache) = cache {
        builder = builder.with_cache(cache);
    }
    let model = builder.build().unwrap();
    let subscription = model.subscribe_events(events.sink());

    Session {
        model,
        _subscription: subscription,
        renderer,
        backend,
        segments,
        events,
    }
}

fn split(tag: &str, resolution: Resolution) -> Stream {
    Stream::split(
        format!("https://cdn/{}-audio.m4a", tag),
        format!("https://cdn/{}-video.mp4", tag),
        resolution,
        StreamFormat::Avc1,
    )
}

#[tokio::test(start_paused = true)]
async fn test_latest_stream_selection_wins() {
    let s = session(Config::default(), None);
    let first = s.model.play_now(Video::from_id("abc")).await;
    assert!(first.loaded().is_some());
    s.renderer.set_position(Duration::from_secs(42));

    let (slow, fast) = tokio::join!(
        s.model.change_stream(split("slow", Resolution::HD1080)),
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            s.model.change_stream(split("fast", Resolution::SD480)).await
        }
    );

    assert!(matches!(slow, LoadState::Failed(_)));
    assert_eq!(fast.loaded().map(|s| s.resolution), Some(Resolution::SD480));
    assert_eq!(s.renderer.attach_count(), 2);

    let log = s.renderer.log.lock();
    assert!(matches!(
        log.attached.last(),
        Some(Timeline::Composed(c)) if c.video.source.contains("fast")
    ));
    // Position carried over with the asymmetric restore tolerance
    assert_eq!(
        log.seeks.last(),
        Some(&(Duration::from_secs(42), Duration::from_millis(500), Duration::from_secs(2)))
    );
    assert!(log.playing);
    drop(log);

    assert_eq!(s.model.current_stream().map(|s| s.resolution), Some(Resolution::SD480));
    assert_eq!(s.model.engine().last_seek_type(), Some(SeekType::Resync));
}

#[tokio::test(start_paused = true)]
async fn test_switch_back_reuses_composition() {
    let s = session(Config::default(), None);
    s.model.play_now(Video::from_id("abc")).await;

    let composed = split("fast", Resolution::SD480);
    assert!(s.model.change_stream(composed.clone()).await.loaded().is_some());
    let direct = Stream::single("https://cdn/720.mp4", Resolution::HD720, StreamFormat::Mp4);
    assert!(s.model.change_stream(direct).await.loaded().is_some());

    let item = s.model.queue().current().unwrap();
    assert!(s.model.queue().cached_composition(item.id, &composed.key()).is_some());

    let changes_before = s.events.count(|e| matches!(e, PlayerEvent::StreamChanged { .. }));
    assert!(s.model.change_stream(composed).await.loaded().is_some());
    assert_eq!(
        s.events.count(|e| matches!(e, PlayerEvent::StreamChanged { .. })),
        changes_before + 1
    );
    assert_eq!(s.renderer.attach_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_broken_stream_keeps_previous() {
    let s = session(Config::default(), None);
    s.model.play_now(Video::from_id("abc")).await;
    let before = s.model.current_stream();

    let result = s.model.change_stream(split("broken", Resolution::HD1080)).await;

    assert!(matches!(result, LoadState::Failed(_)));
    assert_eq!(s.model.current_stream(), before);
    assert_eq!(s.renderer.attach_count(), 1);
    assert_eq!(
        s.events.count(|e| matches!(e, PlayerEvent::StreamSwitchFailed { .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_segment_skipped_once_per_entry() {
    let s = session(Config::default(), None);
    s.model.play_now(Video::from_id("abc")).await;
    assert_eq!(s.segments.calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    let skips = |events: &EventRecorder| events.count(|e| matches!(e, PlayerEvent::SegmentSkipped { .. }));

    s.renderer.set_position(Duration::from_secs(11));
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(skips(&s.events), 1);
    assert_eq!(s.renderer.position(), Duration::from_secs(20));

    // Leaving and re-entering the range skips again
    s.renderer.set_position(Duration::from_secs(25));
    tokio::time::sleep(Duration::from_millis(500)).await;
    s.renderer.set_position(Duration::from_secs(15));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(skips(&s.events), 2);
}

#[tokio::test(start_paused = true)]
async fn test_restore_only_after_skip() {
    let s = session(Config::default(), None);
    s.model.play_now(Video::from_id("abc")).await;
    assert!(!s.model.restore_last_skip().await);

    s.renderer.set_position(Duration::from_secs(11));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(s.renderer.position(), Duration::from_secs(20));

    assert!(s.model.restore_last_skip().await);
    assert_eq!(s.renderer.position(), Duration::from_secs(11));
    assert_eq!(s.model.engine().last_seek_type(), Some(SeekType::SegmentRestore));
    // Restore seeks land exactly
    assert_eq!(
        s.renderer.last_seek(),
        Some((Duration::from_secs(11), Duration::ZERO, Duration::ZERO))
    );

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(s.renderer.position(), Duration::from_secs(11));
    assert_eq!(
        s.events.count(|e| matches!(e, PlayerEvent::SegmentRestored { .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_segments_disabled() {
    let mut config = Config::default();
    config.segments.enabled = false;
    let s = session(config, None);
    s.model.play_now(Video::from_id("abc")).await;

    s.renderer.set_position(Duration::from_secs(11));
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(s.segments.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(s.renderer.position(), Duration::from_secs(11));
}

#[tokio::test(start_paused = true)]
async fn test_queue_history_invariants() {
    let mut config = Config::default();
    config.player.history_limit = 2;
    let s = session(config, None);

    for id in ["a", "b", "c", "a"] {
        assert!(s.model.play_now(Video::from_id(id)).await.loaded().is_some());
    }
    s.model.enqueue_id("d", false);
    s.model.enqueue_id("e", false);

    let queue = s.model.queue();
    let current = queue.current().unwrap();
    assert_eq!(current.video.id, "a");

    let history: Vec<_> = queue.history().iter().map(|i| i.video.id.clone()).collect();
    assert_eq!(history, vec!["c", "b"]);

    let mut ids = HashSet::new();
    assert!(ids.insert(current.id));
    for item in queue.queue().iter().chain(queue.history().iter()) {
        assert!(ids.insert(item.id), "item {} appears twice", item.id);
    }

    // Advancing retires the current item into history
    s.model.advance_to_next().await.unwrap();
    let history: Vec<_> = queue.history().iter().map(|i| i.video.id.clone()).collect();
    assert_eq!(history, vec!["a", "c"]);
    assert_eq!(queue.current().unwrap().video.id, "d");
}

#[tokio::test(start_paused = true)]
async fn test_hydration_is_shared_and_cached() -> Result<()> {
    let dir = TempDir::new()?;
    let cache: Arc<dyn PersistentCache> = Arc::new(DirectoryCache::open(dir.path())?);

    let s = session(Config::default(), Some(Arc::clone(&cache)));
    s.model.enqueue_id("abc", false);
    s.model.advance_to_next().await.unwrap();

    assert_eq!(s.backend.video_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(s.model.current_video().unwrap().title, "Video abc");
    assert!(s
        .events
        .events()
        .iter()
        .any(|e| matches!(e, PlayerEvent::StreamsLoaded { count: 2, .. })));

    // A fresh session sees the cached title before any fetch
    let other = session(Config::default(), Some(cache));
    other.model.enqueue_id("abc", false);
    assert_eq!(other.model.queue().queue()[0].video.title, "Video abc");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_instance_reported() {
    let renderer = RecordingRenderer::new();
    let events = EventRecorder::new();
    let bad = MockBackend::new(instance("down", BackendKind::Invidious), Vec::new()).failing("timeout");
    let model = PlayerModel::builder()
        .with_backends(vec![Arc::new(bad) as Arc<dyn VideoBackend>, backend() as Arc<dyn VideoBackend>])
        .with_renderer(Arc::clone(&renderer) as Arc<dyn Renderer>)
        .with_asset_loader(Arc::new(LatencyLoader))
        .build()
        .unwrap();
    let _subscription = model.subscribe_events(events.sink());

    // The first instance is down, the second hydrates and supplies streams
    let stream = model.play_now(Video::from_id("abc")).await;

    assert_eq!(stream.loaded().map(|s| s.resolution), Some(Resolution::HD720));
    assert_eq!(model.current_video().unwrap().title, "Video abc");
    assert_eq!(events.count(|e| matches!(e, PlayerEvent::HydrationFailed { .. })), 0);
    assert_eq!(
        events.count(|e| matches!(e, PlayerEvent::InstanceFailed { instance, .. } if instance.id == "down")),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_next_item_does_not_inherit_position() {
    let s = session(Config::default(), None);
    s.model.enqueue_id("first", false);
    s.model.enqueue_id("second", false);

    s.model.advance_to_next().await.unwrap();
    s.renderer.set_position(Duration::from_secs(150));
    assert!(s.model.advance_to_next().await.unwrap().loaded().is_some());

    assert!(s.renderer.log.lock().seeks.is_empty());
    assert_eq!(s.renderer.position(), Duration::ZERO);
    assert_eq!(s.model.engine().last_seek_type(), None);
    assert!(!s.model.restore_last_skip().await);
}

#[tokio::test(start_paused = true)]
async fn test_local_item_after_remote_has_no_segments() {
    let s = session(Config::default(), None);
    s.model.play_now(Video::from_id("abc")).await;
    s.renderer.set_position(Duration::from_secs(11));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(s.renderer.position(), Duration::from_secs(20));

    let local = s.model.play_now(Video::local("file:///media/home.mp4")).await;
    assert!(local.loaded().is_some());
    assert!(s.model.segments().segments().is_empty());
    assert!(!s.model.restore_last_skip().await);

    s.renderer.set_position(Duration::from_secs(12));
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(s.renderer.position(), Duration::from_secs(12));
    assert_eq!(s.events.count(|e| matches!(e, PlayerEvent::SegmentSkipped { .. })), 1);
    assert_eq!(s.segments.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reset_stops_sampling() {
    let s = session(Config::default(), None);
    s.model.play_now(Video::from_id("abc")).await;
    s.model.enqueue_id("next", false);

    s.model.reset_queue();
    s.renderer.set_position(Duration::from_secs(11));
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(s.model.queue().is_empty());
    assert_eq!(s.model.current_time(), Duration::ZERO);
    assert_eq!(s.renderer.position(), Duration::from_secs(11));
    assert_eq!(s.events.count(|e| matches!(e, PlayerEvent::PlaybackReset)), 1);
}
