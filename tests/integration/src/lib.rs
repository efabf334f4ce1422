//! Integration test utilities for vistream
//!
//! Scripted stand-ins for everything the player core talks to:
//! - Backend instances with configurable latency and failures
//! - A renderer that records what it was asked to do
//! - Track loaders and segment sources
//! - An event recorder

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vistream::backend::{BackendKind, InstanceRef, VideoBackend};
use vistream::media::Video;
use vistream::player::{AssetLoader, MediaDuration, MediaTrack, PlayerEvent, Renderer, Timeline, TrackKind};
use vistream::segments::{Segment, SegmentService};
use vistream::stream::Stream;
use vistream::utils::{Result, VistreamError};

/// Build an instance reference
pub fn instance(id: &str, backend: BackendKind) -> InstanceRef {
    InstanceRef {
        id: id.to_string(),
        name: id.to_string(),
        backend,
        url: format!("https://{}.example", id),
    }
}

/// Backend instances with scripted answers
pub mod mock_backend {
    use super::*;

    pub struct MockBackend {
        instance: InstanceRef,
        streams: Vec<Stream>,
        delay: Duration,
        failure: Option<String>,
        pub stream_calls: AtomicUsize,
        pub video_calls: AtomicUsize,
    }

    impl MockBackend {
        pub fn new(instance: InstanceRef, streams: Vec<Stream>) -> Self {
            Self {
                instance,
                streams,
                delay: Duration::ZERO,
                failure: None,
                stream_calls: AtomicUsize::new(0),
                video_calls: AtomicUsize::new(0),
            }
        }

        /// Answer every request after `delay`
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Fail every request with `message`
        pub fn failing(mut self, message: &str) -> Self {
            self.failure = Some(message.to_string());
            self
        }

        async fn respond(&self) -> Result<()> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.failure {
                Some(message) => Err(VistreamError::backend(&self.instance.id, message.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl VideoBackend for MockBackend {
        fn instance(&self) -> &InstanceRef {
            &self.instance
        }

        async fn fetch_candidate_streams(&self, _video_id: &str) -> Result<Vec<Stream>> {
            self.stream_calls.fetch_add(1, Ordering::SeqCst);
            self.respond().await?;
            Ok(self
                .streams
                .iter()
                .cloned()
                .map(|s| s.with_instance(self.instance.clone()))
                .collect())
        }

        async fn fetch_video(&self, video_id: &str) -> Result<Video> {
            self.video_calls.fetch_add(1, Ordering::SeqCst);
            self.respond().await?;
            let mut video = Video::from_id(video_id);
            video.title = format!("Video {}", video_id);
            video.author = "Author".to_string();
            video.length = Duration::from_secs(300);
            video.streams = self.streams.clone();
            Ok(video)
        }
    }
}

/// Renderer that records calls
pub mod mock_renderer {
    use super::*;

    #[derive(Debug, Default)]
    pub struct RendererLog {
        pub attached: Vec<Timeline>,
        pub seeks: Vec<(Duration, Duration, Duration)>,
        pub position: Duration,
        pub playing: bool,
        pub detached: usize,
    }

    #[derive(Default)]
    pub struct RecordingRenderer {
        pub log: Mutex<RendererLog>,
    }

    impl RecordingRenderer {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Pretend playback reached `position`
        pub fn set_position(&self, position: Duration) {
            self.log.lock().position = position;
        }

        pub fn position(&self) -> Duration {
            self.log.lock().position
        }

        pub fn attach_count(&self) -> usize {
            self.log.lock().attached.len()
        }

        pub fn last_seek(&self) -> Option<(Duration, Duration, Duration)> {
            self.log.lock().seeks.last().copied()
        }
    }

    #[async_trait]
    impl Renderer for RecordingRenderer {
        fn attach_timeline(&self, timeline: &Timeline) -> Result<()> {
            let mut log = self.log.lock();
            log.attached.push(timeline.clone());
            log.position = Duration::ZERO;
            Ok(())
        }

        fn detach(&self) {
            self.log.lock().detached += 1;
        }

        fn play(&self) {
            self.log.lock().playing = true;
        }

        fn pause(&self) {
            self.log.lock().playing = false;
        }

        fn is_playing(&self) -> bool {
            self.log.lock().playing
        }

        fn current_position(&self) -> Option<Duration> {
            Some(self.log.lock().position)
        }

        fn item_duration(&self) -> Option<MediaDuration> {
            Some(MediaDuration::Finite(Duration::from_secs(300)))
        }

        async fn seek(&self, to: Duration, before: Duration, after: Duration) -> bool {
            let mut log = self.log.lock();
            log.seeks.push((to, before, after));
            log.position = to;
            true
        }
    }
}

/// Track loader whose latency is encoded in the URL
pub mod mock_loader {
    use super::*;

    /// URLs containing `slow` take 300ms, everything else 20ms; URLs
    /// containing `broken` fail
    pub struct LatencyLoader;

    #[async_trait]
    impl AssetLoader for LatencyLoader {
        async fn load_track(&self, url: &str, kind: TrackKind) -> Result<MediaTrack> {
            let delay = if url.contains("slow") { 300 } else { 20 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if url.contains("broken") {
                return Err(VistreamError::Asset(format!("cannot open {}", url)));
            }
            Ok(MediaTrack {
                kind,
                source: url.to_string(),
                duration: Some(Duration::from_secs(300)),
            })
        }
    }
}

/// Segment sources
pub mod mock_segments {
    use super::*;

    pub struct FixedSegments {
        pub segments: Vec<Segment>,
        pub calls: AtomicUsize,
    }

    impl FixedSegments {
        /// Sponsor segments from `(start, end)` pairs in seconds
        pub fn sponsor(ranges: &[(f64, f64)]) -> Arc<Self> {
            let segments = ranges
                .iter()
                .enumerate()
                .filter_map(|(i, (start, end))| {
                    Segment::from_secs(format!("seg-{}", i), "sponsor", *start, *end).ok()
                })
                .collect();
            Arc::new(Self {
                segments,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SegmentService for FixedSegments {
        async fn fetch_segments(&self, _video_id: &str, _categories: &[String]) -> Result<Vec<Segment>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.segments.clone())
        }
    }
}

/// Collects dispatched events
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<PlayerEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback suitable for `subscribe_events`
    pub fn sink(&self) -> impl Fn(&PlayerEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event| events.lock().push(event.clone())
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&PlayerEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}
