//! Player events and their dispatch
//!
//! Services report progress by dispatching [`PlayerEvent`]s. Callers either
//! subscribe a closure (dropped together with its [`EventSubscription`]) or
//! register a long-lived [`PlayerEventHandler`] through the model builder.

use crate::backend::InstanceRef;
use crate::segments::Segment;
use crate::stream::{Stream, StreamKey};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Player event for external event handling
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// Queue, current item or history changed
    QueueChanged,

    /// An item received full metadata
    ItemHydrated { item_id: Uuid, video_id: String },

    /// Metadata fetch failed; the item keeps its previous metadata
    HydrationFailed { video_id: String, message: String },

    /// Aggregation finished for the current video
    StreamsLoaded { video_id: String, count: usize },

    /// One instance failed during aggregation
    InstanceFailed { instance: InstanceRef, message: String },

    /// A stream was attached to the renderer
    StreamChanged { stream: Stream, restored_position: Option<Duration> },

    /// A stream switch was abandoned; the previous stream keeps playing
    StreamSwitchFailed { key: StreamKey, message: String },

    /// Segments for the current video are known
    SegmentsLoaded { video_id: String, count: usize },

    /// A segment was skipped automatically
    SegmentSkipped { segment: Segment },

    /// The last skip was undone
    SegmentRestored { segment: Segment },

    /// Playback was torn down with the queue
    PlaybackReset,
}

/// Player event handler trait
pub trait PlayerEventHandler: Send + Sync {
    /// Handle player event
    ///
    /// # Arguments
    ///
    /// * `event` - Player event
    fn handle_event(&self, event: &PlayerEvent);
}

type Callback = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    callbacks: Vec<(u64, Callback)>,
    handlers: Vec<Arc<dyn PlayerEventHandler>>,
}

/// Event dispatcher
#[derive(Clone, Default)]
pub struct EventDispatcher {
    subscribers: Arc<RwLock<Subscribers>>,
    next_id: Arc<AtomicU64>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a callback until the returned subscription is dropped
    pub fn subscribe<F>(&self, callback: F) -> EventSubscription
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().callbacks.push((id, Arc::new(callback)));

        EventSubscription {
            id,
            dispatcher: Arc::clone(&self.subscribers),
        }
    }

    /// Register a handler for the dispatcher's lifetime
    pub fn add_handler(&self, handler: Arc<dyn PlayerEventHandler>) {
        self.subscribers.write().handlers.push(handler);
    }

    /// Deliver an event to every subscriber
    pub fn dispatch(&self, event: PlayerEvent) {
        // Snapshot so callbacks may subscribe or unsubscribe
        let (callbacks, handlers) = {
            let subs = self.subscribers.read();
            let callbacks: Vec<Callback> = subs.callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect();
            (callbacks, subs.handlers.clone())
        };

        for callback in callbacks {
            callback(&event);
        }
        for handler in handlers {
            handler.handle_event(&event);
        }
    }

    /// Number of live subscriptions and handlers
    pub fn subscriber_count(&self) -> usize {
        let subs = self.subscribers.read();
        subs.callbacks.len() + subs.handlers.len()
    }
}

/// Event subscription handle
pub struct EventSubscription {
    id: u64,
    dispatcher: Arc<RwLock<Subscribers>>,
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.dispatcher.write().callbacks.retain(|(id, _)| *id != self.id);
    }
}
