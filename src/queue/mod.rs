//! Playback queue and history
//!
//! The queue owns three collections: upcoming items, the current item and
//! the history of played items (newest first, one entry per video ID). An
//! item lives in exactly one of them at a time. Hydration runs in the
//! background and replaces an item's video wholesale once it completes.

mod hydration;

pub use hydration::Hydrator;

use crate::media::Video;
use crate::player::{EventDispatcher, PlayerEvent, Timeline};
use crate::stream::StreamKey;
use crate::utils::LoadState;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// One entry of the queue, the current slot or the history
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// Fresh identity per enqueue
    pub id: Uuid,

    pub video: Arc<Video>,

    /// Timelines already built for this item's streams
    pub compositions: HashMap<StreamKey, Timeline>,

    /// Last known position, kept when the item moves to history
    pub playback_time: Option<Duration>,
}

impl QueueItem {
    pub fn new(video: Arc<Video>) -> Self {
        Self {
            id: Uuid::new_v4(),
            video,
            compositions: HashMap::new(),
            playback_time: None,
        }
    }
}

/// Background hydration started for an item
pub enum Hydration {
    /// The video needed no fetch
    Ready(Arc<Video>),

    /// A fetch is running
    Pending(JoinHandle<LoadState<Arc<Video>>>),
}

impl Hydration {
    /// Wait for the hydration to finish
    pub async fn wait(self) -> LoadState<Arc<Video>> {
        match self {
            Hydration::Ready(video) => LoadState::Loaded(video),
            Hydration::Pending(handle) => match handle.await {
                Ok(state) => state,
                Err(e) => LoadState::Failed(format!("hydration task ended: {}", e)),
            },
        }
    }
}

/// Result of putting a video into the queue
pub struct Enqueued {
    pub item: QueueItem,
    pub hydration: Hydration,
}

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<QueueItem>,
    current: Option<QueueItem>,
    history: VecDeque<QueueItem>,
}

impl QueueState {
    fn holds_video(&self, video_id: &str) -> bool {
        self.current
            .iter()
            .chain(self.queue.iter())
            .chain(self.history.iter())
            .any(|item| item.video.id == video_id)
    }

    fn item_mut(&mut self, item_id: Uuid) -> Option<&mut QueueItem> {
        self.current
            .iter_mut()
            .chain(self.queue.iter_mut())
            .chain(self.history.iter_mut())
            .find(|item| item.id == item_id)
    }
}

fn replace_video(state: &Mutex<QueueState>, item_id: Uuid, video: &Arc<Video>) -> bool {
    match state.lock().item_mut(item_id) {
        Some(item) => {
            item.video = Arc::clone(video);
            true
        }
        None => false,
    }
}

/// Queue, current item and history
pub struct PlaybackQueue {
    state: Arc<Mutex<QueueState>>,
    hydrator: Arc<Hydrator>,
    events: EventDispatcher,
    save_history: bool,
    history_limit: usize,
}

impl PlaybackQueue {
    /// Create an empty queue
    ///
    /// # Arguments
    ///
    /// * `hydrator` - Metadata source for bare references
    /// * `events` - Dispatcher receiving queue events
    /// * `save_history` - Keep played items
    /// * `history_limit` - Maximum history entries, 0 for unlimited
    pub fn new(hydrator: Arc<Hydrator>, events: EventDispatcher, save_history: bool, history_limit: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            hydrator,
            events,
            save_history,
            history_limit,
        }
    }

    pub fn hydrator(&self) -> &Arc<Hydrator> {
        &self.hydrator
    }

    pub fn current(&self) -> Option<QueueItem> {
        self.state.lock().current.clone()
    }

    /// Upcoming items in play order
    pub fn queue(&self) -> Vec<QueueItem> {
        self.state.lock().queue.iter().cloned().collect()
    }

    /// Played items, newest first
    pub fn history(&self) -> Vec<QueueItem> {
        self.state.lock().history.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    /// Add a video at the tail, or at the head when `prepend` is set, and
    /// start hydrating it in the background
    pub fn enqueue(&self, video: impl Into<Arc<Video>>, prepend: bool) -> Enqueued {
        let item = QueueItem::new(video.into());
        debug!("Enqueueing {} ({})", item.video.display_title(), item.id);

        {
            let mut state = self.state.lock();
            if prepend {
                state.queue.push_front(item.clone());
            } else {
                state.queue.push_back(item.clone());
            }
        }
        self.events.dispatch(PlayerEvent::QueueChanged);

        let hydration = self.spawn_hydration(item.id, Arc::clone(&item.video));
        Enqueued { item, hydration }
    }

    /// Enqueue a bare video ID, pre-filled from the cache when possible
    pub fn enqueue_id(&self, video_id: &str, prepend: bool) -> Enqueued {
        self.enqueue(self.hydrator.prefill(video_id), prepend)
    }

    fn spawn_hydration(&self, item_id: Uuid, video: Arc<Video>) -> Hydration {
        if !Hydrator::needs_fetch(&video) {
            return Hydration::Ready(video);
        }

        let hydrator = Arc::clone(&self.hydrator);
        let state = Arc::clone(&self.state);
        let events = self.events.clone();

        Hydration::Pending(tokio::spawn(async move {
            let video_id = video.id.clone();
            match hydrator.hydrate(video).await {
                Ok(hydrated) => {
                    if replace_video(&state, item_id, &hydrated) {
                        events.dispatch(PlayerEvent::ItemHydrated { item_id, video_id });
                    } else {
                        debug!("Item {} left the queue before {} was hydrated", item_id, video_id);
                    }
                    LoadState::Loaded(hydrated)
                }
                Err(e) => {
                    warn!("Failed to hydrate {}: {}", video_id, e);
                    events.dispatch(PlayerEvent::HydrationFailed {
                        video_id,
                        message: e.to_string(),
                    });
                    LoadState::Failed(e.to_string())
                }
            }
        }))
    }

    /// Swap in richer metadata for an item wherever it currently lives
    pub fn replace_video(&self, item_id: Uuid, video: &Arc<Video>) -> bool {
        replace_video(&self.state, item_id, video)
    }

    /// Hydrate the head of the queue ahead of time
    pub fn prefetch_next(&self) -> Option<Hydration> {
        let (item_id, video) = {
            let state = self.state.lock();
            let next = state.queue.front()?;
            (next.id, Arc::clone(&next.video))
        };
        if !Hydrator::needs_fetch(&video) {
            return None;
        }
        debug!("Prefetching {}", video.id);
        Some(self.spawn_hydration(item_id, video))
    }

    /// Move the current item to history and make the queue head current
    pub fn advance_to_next(&self) -> Option<QueueItem> {
        let current = {
            let mut state = self.state.lock();
            let next = state.queue.pop_front();
            let dropped = self.retire_current(&mut state);
            state.current = next;
            self.release(&state, dropped);
            state.current.clone()
        };
        if let Some(item) = &current {
            info!("Now playing {}", item.video.display_title());
        }
        self.events.dispatch(PlayerEvent::QueueChanged);
        current
    }

    /// Make a queued item current; items ahead of it stay queued
    pub fn advance_to_item(&self, item_id: Uuid) -> Option<QueueItem> {
        let current = {
            let mut state = self.state.lock();
            let index = state.queue.iter().position(|item| item.id == item_id)?;
            let next = state.queue.remove(index);
            let dropped = self.retire_current(&mut state);
            state.current = next;
            self.release(&state, dropped);
            state.current.clone()
        };
        self.events.dispatch(PlayerEvent::QueueChanged);
        current
    }

    /// Play a video immediately
    pub fn play_now(&self, video: impl Into<Arc<Video>>) -> Enqueued {
        let mut enqueued = self.enqueue(video, true);
        if let Some(current) = self.advance_to_item(enqueued.item.id) {
            enqueued.item = current;
        }
        enqueued
    }

    /// Play a history entry again under a fresh identity
    pub fn play_history_item(&self, item_id: Uuid) -> Option<Enqueued> {
        let video = {
            let state = self.state.lock();
            let item = state.history.iter().find(|item| item.id == item_id)?;
            Arc::clone(&item.video)
        };
        Some(self.play_now(video))
    }

    /// Move the current item to history; returns items that left the queue
    /// for good
    fn retire_current(&self, state: &mut QueueState) -> Vec<QueueItem> {
        let Some(item) = state.current.take() else { return Vec::new() };
        if !self.save_history {
            return vec![item];
        }
        state.history.retain(|h| h.video.id != item.video.id);
        state.history.push_front(item);
        if self.history_limit > 0 && state.history.len() > self.history_limit {
            return state.history.split_off(self.history_limit).into();
        }
        Vec::new()
    }

    /// Forget memoized metadata of dropped items no other item refers to
    fn release(&self, state: &QueueState, dropped: impl IntoIterator<Item = QueueItem>) {
        for item in dropped {
            if !state.holds_video(&item.video.id) {
                debug!("Releasing metadata of {}", item.video.id);
                self.hydrator.forget(&item.video.id);
            }
        }
    }

    /// Remove a queued item
    pub fn remove(&self, item_id: Uuid) -> Option<QueueItem> {
        let removed = {
            let mut state = self.state.lock();
            let index = state.queue.iter().position(|item| item.id == item_id)?;
            let removed = state.queue.remove(index);
            self.release(&state, removed.clone());
            removed
        };
        self.events.dispatch(PlayerEvent::QueueChanged);
        removed
    }

    /// Remove a history entry
    pub fn remove_history(&self, item_id: Uuid) -> Option<QueueItem> {
        let removed = {
            let mut state = self.state.lock();
            let index = state.history.iter().position(|item| item.id == item_id)?;
            let removed = state.history.remove(index);
            self.release(&state, removed.clone());
            removed
        };
        self.events.dispatch(PlayerEvent::QueueChanged);
        removed
    }

    /// Drop the queue and the current item; history is kept
    pub fn reset_queue(&self) {
        {
            let mut state = self.state.lock();
            let mut dropped: Vec<QueueItem> = state.queue.drain(..).collect();
            dropped.extend(state.current.take());
            self.release(&state, dropped);
        }
        self.events.dispatch(PlayerEvent::QueueChanged);
    }

    pub fn clear_history(&self) {
        {
            let mut state = self.state.lock();
            let dropped: Vec<QueueItem> = state.history.drain(..).collect();
            self.release(&state, dropped);
        }
        self.events.dispatch(PlayerEvent::QueueChanged);
    }

    /// Record the position of the current item
    pub fn update_current_time(&self, time: Duration) {
        if let Some(current) = self.state.lock().current.as_mut() {
            current.playback_time = Some(time);
        }
    }

    /// Remember a built timeline for an item
    pub fn store_composition(&self, item_id: Uuid, key: StreamKey, timeline: Timeline) {
        if let Some(item) = self.state.lock().item_mut(item_id) {
            item.compositions.insert(key, timeline);
        }
    }

    /// Previously built timeline for an item's stream
    pub fn cached_composition(&self, item_id: Uuid, key: &StreamKey) -> Option<Timeline> {
        self.state.lock().item_mut(item_id)?.compositions.get(key).cloned()
    }
}
