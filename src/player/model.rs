//! Player model: the playback session orchestrator
//!
//! Wires the queue, stream aggregation, quality selection, the playback
//! engine, time sync and segment skipping into one session. Loading the
//! current item runs hydrate → aggregate → select → (segments ∥ switch) →
//! start sampling → prefetch the next item.

use crate::backend::VideoBackend;
use crate::cache::PersistentCache;
use crate::media::Video;
use crate::player::composition::AssetLoader;
use crate::player::engine::{PlaybackEngine, SwitchOutcome};
use crate::player::events::{EventDispatcher, EventSubscription, PlayerEvent, PlayerEventHandler};
use crate::player::time_sync::{PlaybackClock, TickHandler, TimeSample, TimeSync};
use crate::player::{Renderer, SeekType};
use crate::queue::{Hydrator, PlaybackQueue};
use crate::segments::{SegmentService, SegmentSkipCoordinator};
use crate::stream::{sort_streams, QualityProfile, Stream, StreamAggregator, StreamKey};
use crate::utils::config::Config;
use crate::utils::error::{Result, VistreamError};
use crate::utils::LoadState;
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use uuid::Uuid;

/// Player model builder for customized configuration
pub struct PlayerModelBuilder {
    config: Config,
    backends: Vec<Arc<dyn VideoBackend>>,
    renderer: Option<Arc<dyn Renderer>>,
    loader: Option<Arc<dyn AssetLoader>>,
    segment_service: Option<Arc<dyn SegmentService>>,
    cache: Option<Arc<dyn PersistentCache>>,
    event_handlers: Vec<Arc<dyn PlayerEventHandler>>,
}

impl Default for PlayerModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerModelBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            backends: Vec::new(),
            renderer: None,
            loader: None,
            segment_service: None,
            cache: None,
            event_handlers: Vec::new(),
        }
    }

    /// Set application configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Backends to aggregate streams from; metadata is hydrated from the
    /// first one that answers, in order
    pub fn with_backends(mut self, backends: Vec<Arc<dyn VideoBackend>>) -> Self {
        self.backends = backends;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_asset_loader(mut self, loader: Arc<dyn AssetLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Segment source; ignored when segments are disabled in the config
    pub fn with_segment_service(mut self, service: Arc<dyn SegmentService>) -> Self {
        self.segment_service = Some(service);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn PersistentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Add an event handler
    pub fn with_event_handler(mut self, handler: Arc<dyn PlayerEventHandler>) -> Self {
        self.event_handlers.push(handler);
        self
    }

    /// Build the player model
    pub fn build(self) -> Result<PlayerModel> {
        let renderer = self
            .renderer
            .ok_or_else(|| VistreamError::InvalidInput("A renderer is required".to_string()))?;
        let loader = self
            .loader
            .ok_or_else(|| VistreamError::InvalidInput("An asset loader is required".to_string()))?;
        self.config.validate()?;

        let events = EventDispatcher::new();
        for handler in self.event_handlers {
            events.add_handler(handler);
        }

        let cache = if self.config.cache.enabled { self.cache } else { None };
        let hydrator = Arc::new(Hydrator::new(self.backends.clone(), cache));

        let player = &self.config.player;
        let queue = PlaybackQueue::new(hydrator, events.clone(), player.save_history, player.history_limit);
        let engine = PlaybackEngine::new(
            renderer,
            loader,
            player.seek_tolerance_before(),
            player.seek_tolerance_after(),
        );
        let time_sync = TimeSync::new(player.time_sync_interval());

        let segment_service = if self.config.segments.enabled {
            self.segment_service
        } else {
            None
        };
        let segments = SegmentSkipCoordinator::new(segment_service, self.config.segments.categories.clone());

        info!("Player ready with {} backend instance(s)", self.backends.len());

        Ok(PlayerModel {
            inner: Arc::new(Inner {
                aggregator: StreamAggregator::new(self.backends),
                config: self.config,
                queue,
                engine,
                time_sync,
                segments,
                events,
                session: Mutex::new(Session::default()),
            }),
        })
    }
}

#[derive(Default)]
struct Session {
    /// Bumped on every load so stale loads can tell they lost
    load_token: u64,
    item_id: Option<Uuid>,
    video: Option<Arc<Video>>,
    streams: LoadState<Vec<Stream>>,
}

struct Inner {
    config: Config,
    queue: PlaybackQueue,
    aggregator: StreamAggregator,
    engine: PlaybackEngine,
    time_sync: TimeSync,
    segments: SegmentSkipCoordinator,
    events: EventDispatcher,
    session: Mutex<Session>,
}

/// High-level player
#[derive(Clone)]
pub struct PlayerModel {
    inner: Arc<Inner>,
}

impl PlayerModel {
    /// Create a builder
    pub fn builder() -> PlayerModelBuilder {
        PlayerModelBuilder::new()
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.inner.queue
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.inner.engine
    }

    pub fn segments(&self) -> &SegmentSkipCoordinator {
        &self.inner.segments
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Shared playback clock
    pub fn clock(&self) -> Arc<PlaybackClock> {
        self.inner.time_sync.clock()
    }

    pub fn current_time(&self) -> Duration {
        self.inner.time_sync.clock().current_time()
    }

    pub fn is_live(&self) -> bool {
        self.inner.time_sync.clock().is_live()
    }

    /// Candidate streams of the current video
    pub fn streams(&self) -> LoadState<Vec<Stream>> {
        self.inner.session.lock().streams.clone()
    }

    /// Video of the current session, as last hydrated
    pub fn current_video(&self) -> Option<Arc<Video>> {
        self.inner.session.lock().video.clone()
    }

    pub fn current_stream(&self) -> Option<Stream> {
        self.inner.engine.current_stream()
    }

    /// Subscribe to events
    pub fn subscribe_events<F>(&self, callback: F) -> EventSubscription
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(callback)
    }

    /// Queue a video; metadata hydrates in the background
    pub fn enqueue(&self, video: impl Into<Arc<Video>>, prepend: bool) -> Uuid {
        self.inner.queue.enqueue(video, prepend).item.id
    }

    /// Queue a video by ID
    pub fn enqueue_id(&self, video_id: &str, prepend: bool) -> Uuid {
        self.inner.queue.enqueue_id(video_id, prepend).item.id
    }

    /// Play a video right away
    pub async fn play_now(&self, video: impl Into<Arc<Video>>) -> LoadState<Stream> {
        self.inner.queue.play_now(video);
        self.load_current().await
    }

    /// Move on to the next queued item; `None` when the queue is exhausted
    pub async fn advance_to_next(&self) -> Option<LoadState<Stream>> {
        if self.inner.queue.advance_to_next().is_none() {
            info!("Queue finished");
            self.stop_playback();
            return None;
        }
        Some(self.load_current().await)
    }

    /// Load and attach the current queue item
    pub async fn load_current(&self) -> LoadState<Stream> {
        let inner = &self.inner;
        let Some(item) = inner.queue.current() else {
            return LoadState::Failed("Nothing to play".to_string());
        };

        // A new item starts from scratch: no position, seek history or
        // segments carry over from the previous one
        inner.time_sync.stop();
        inner.engine.detach();
        inner.segments.reset();
        let token = {
            let mut session = inner.session.lock();
            session.load_token += 1;
            session.item_id = Some(item.id);
            session.video = Some(Arc::clone(&item.video));
            session.streams = LoadState::Pending;
            session.load_token
        };

        let video = match inner.queue.hydrator().hydrate(Arc::clone(&item.video)).await {
            Ok(video) => {
                inner.queue.replace_video(item.id, &video);
                video
            }
            Err(e) => {
                // Aggregation still asks every instance, so carry on
                warn!("Playing {} without full metadata: {}", item.video.id, e);
                inner.events.dispatch(PlayerEvent::HydrationFailed {
                    video_id: item.video.id.clone(),
                    message: e.to_string(),
                });
                Arc::clone(&item.video)
            }
        };
        if !self.is_current_load(token) {
            return LoadState::Failed("Superseded by another item".to_string());
        }
        inner.session.lock().video = Some(Arc::clone(&video));

        let streams = self.resolve_streams(&video).await;
        if !self.is_current_load(token) {
            return LoadState::Failed("Superseded by another item".to_string());
        }
        inner.session.lock().streams = LoadState::Loaded(streams.clone());
        inner.events.dispatch(PlayerEvent::StreamsLoaded {
            video_id: video.id.clone(),
            count: streams.len(),
        });

        let profile = self.profile();
        let Some(stream) = profile.select_stream(&streams).cloned() else {
            warn!("No playable streams for {}", video.id);
            return LoadState::Failed(format!("No streams available for {}", video.id));
        };
        debug!("Profile '{}' selected {}", profile.name, stream.description());

        let requested = stream.key();
        let cached = inner.queue.cached_composition(item.id, &requested);
        let load_segments = async {
            if video.local {
                return;
            }
            let count = inner.segments.load(&video.id).await;
            inner.events.dispatch(PlayerEvent::SegmentsLoaded {
                video_id: video.id.clone(),
                count,
            });
        };
        let switch = inner
            .engine
            .switch_stream(stream, video.length, cached, false, inner.config.player.autoplay);

        let ((), outcome) = tokio::join!(load_segments, switch);
        let result = self.finish_switch(item.id, requested, outcome);

        if result.loaded().is_some() {
            self.start_time_sync();
            inner.queue.prefetch_next();
        }
        result
    }

    /// Switch the current video to another stream, keeping position
    pub async fn change_stream(&self, stream: Stream) -> LoadState<Stream> {
        let inner = &self.inner;
        let (item_id, video) = {
            let session = inner.session.lock();
            match (session.item_id, session.video.clone()) {
                (Some(item_id), Some(video)) => (item_id, video),
                _ => return LoadState::Failed("Nothing is playing".to_string()),
            }
        };

        info!("Changing stream to {}", stream.description());
        let requested = stream.key();
        let cached = inner.queue.cached_composition(item_id, &requested);
        let outcome = inner.engine.switch_stream(stream, video.length, cached, true, false).await;
        let result = self.finish_switch(item_id, requested, outcome);

        if result.loaded().is_some() && !inner.time_sync.is_running() {
            self.start_time_sync();
        }
        result
    }

    fn finish_switch(&self, item_id: Uuid, requested: StreamKey, outcome: SwitchOutcome) -> LoadState<Stream> {
        let inner = &self.inner;
        match outcome {
            SwitchOutcome::Attached {
                stream,
                timeline,
                restored_position,
                built,
            } => {
                if built {
                    inner.queue.store_composition(item_id, stream.key(), timeline);
                }
                inner.events.dispatch(PlayerEvent::StreamChanged {
                    stream: stream.clone(),
                    restored_position,
                });
                LoadState::Loaded(stream)
            }
            SwitchOutcome::Superseded => LoadState::Failed("Superseded by a newer stream selection".to_string()),
            SwitchOutcome::Failed(message) => {
                inner.events.dispatch(PlayerEvent::StreamSwitchFailed {
                    key: requested,
                    message: message.clone(),
                });
                LoadState::Failed(message)
            }
        }
    }

    async fn resolve_streams(&self, video: &Video) -> Vec<Stream> {
        if video.local {
            return video.streams.clone();
        }

        let events = &self.inner.events;
        let aggregated = self
            .inner
            .aggregator
            .load_streams_with(&video.id, |report| {
                if let LoadState::Failed(message) = &report.outcome {
                    events.dispatch(PlayerEvent::InstanceFailed {
                        instance: report.instance.clone(),
                        message: message.clone(),
                    });
                }
            })
            .await;

        if aggregated.streams.is_empty() && video.is_hydrated() {
            let mut streams = video.streams.clone();
            sort_streams(&mut streams);
            return streams;
        }
        aggregated.streams
    }

    fn profile(&self) -> QualityProfile {
        let backend = self.inner.aggregator.instances().first().map(|i| i.backend);
        self.inner.config.quality.for_backend(backend)
    }

    fn is_current_load(&self, token: u64) -> bool {
        self.inner.session.lock().load_token == token
    }

    fn start_time_sync(&self) {
        let ticker = Arc::new(SessionTicker {
            inner: Arc::downgrade(&self.inner),
        });
        self.inner
            .time_sync
            .start(Arc::clone(self.inner.engine.renderer()), ticker);
    }

    /// User seek
    pub async fn seek(&self, to: Duration) -> bool {
        self.inner.engine.seek(to, SeekType::User).await
    }

    /// Undo the last automatic skip, if the last seek was that skip
    pub async fn restore_last_skip(&self) -> bool {
        let inner = &self.inner;
        let last_seek = inner.engine.last_seek_type();
        let Some(skipped) = inner.segments.take_restore(last_seek.as_ref()) else {
            debug!("Nothing to restore after {:?}", last_seek);
            return false;
        };

        info!("Restoring skipped {} segment", skipped.segment.category);
        let restored = inner.engine.seek(skipped.resume_at, SeekType::SegmentRestore).await;
        inner.events.dispatch(PlayerEvent::SegmentRestored {
            segment: skipped.segment,
        });
        restored
    }

    fn stop_playback(&self) {
        let inner = &self.inner;
        inner.time_sync.stop();
        inner.engine.detach();
        inner.segments.reset();
        let mut session = inner.session.lock();
        let token = session.load_token + 1;
        *session = Session {
            load_token: token,
            ..Session::default()
        };
    }

    /// Clear the queue and tear playback down; history is kept
    pub fn reset_queue(&self) {
        self.stop_playback();
        self.inner.queue.reset_queue();
        self.inner.events.dispatch(PlayerEvent::PlaybackReset);
    }
}

/// Per-tick work of a session
struct SessionTicker {
    inner: Weak<Inner>,
}

#[async_trait]
impl TickHandler for SessionTicker {
    async fn on_tick(&self, sample: TimeSample) {
        let Some(inner) = self.inner.upgrade() else { return };
        inner.queue.update_current_time(sample.time);

        if sample.live {
            return;
        }
        let Some(action) = inner.segments.check(sample.time) else { return };

        inner.events.dispatch(PlayerEvent::SegmentSkipped {
            segment: action.segment.clone(),
        });
        let seek_type = SeekType::SegmentSkip {
            segment_uuid: action.segment.uuid,
        };
        if !inner.engine.seek(action.seek_to, seek_type).await {
            debug!("Skip seek to {:?} did not complete", action.seek_to);
        }
    }
}
