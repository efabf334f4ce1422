//! Playback session for vistream
//!
//! This module drives an abstract [`Renderer`]: it builds timelines for the
//! selected stream, swaps them in while preserving the play position,
//! samples the playback clock at a fixed interval and orchestrates the
//! queue, stream selection and segment skipping around it.

mod composition;
mod engine;
mod events;
mod model;
mod time_sync;

pub use composition::{build_timeline, AssetLoader, Composition, MediaTrack, TimeRange, Timeline, TrackKind};
pub use engine::{EngineState, PlaybackEngine, SwitchOutcome};
pub use events::{EventDispatcher, EventSubscription, PlayerEvent, PlayerEventHandler};
pub use model::{PlayerModel, PlayerModelBuilder};
pub use time_sync::{PlaybackClock, TickHandler, TimeSample, TimeSync};

use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Media pipeline the engine drives
///
/// All methods except `seek` are expected to return immediately.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Replace the current item with a timeline
    ///
    /// # Arguments
    ///
    /// * `timeline` - Timeline to play
    ///
    /// # Returns
    ///
    /// Error if the timeline cannot be attached; the previous item then
    /// stays in place
    fn attach_timeline(&self, timeline: &Timeline) -> Result<()>;

    /// Remove the current item
    fn detach(&self);

    fn play(&self);

    fn pause(&self);

    fn is_playing(&self) -> bool;

    /// Current position of the attached item
    fn current_position(&self) -> Option<Duration>;

    /// Duration of the attached item
    fn item_duration(&self) -> Option<MediaDuration>;

    /// Seek the attached item
    ///
    /// # Arguments
    ///
    /// * `to` - Target position
    /// * `tolerance_before` - How far before `to` the renderer may land
    /// * `tolerance_after` - How far after `to` the renderer may land
    ///
    /// # Returns
    ///
    /// Whether the seek finished (false when interrupted by another seek)
    async fn seek(&self, to: Duration, tolerance_before: Duration, tolerance_after: Duration) -> bool;
}

/// Duration of a renderer item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaDuration {
    Finite(Duration),

    /// Live broadcast
    Indefinite,
}

/// Why the last seek happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeekType {
    /// Requested by the user
    User,

    /// Automatic skip past a segment
    SegmentSkip { segment_uuid: String },

    /// Undo of a segment skip
    SegmentRestore,

    /// Restart at the end of a looping item
    LoopRestart,

    /// Position restore after a stream switch
    Resync,
}

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Clock sampling interval in milliseconds
    pub time_sync_interval_ms: u64,

    /// How far before the saved position a restore may land
    pub seek_tolerance_before_ms: u64,

    /// How far after the saved position a restore may land
    pub seek_tolerance_after_ms: u64,

    /// Keep played items in history
    pub save_history: bool,

    /// Maximum history entries (0 = unlimited)
    pub history_limit: usize,

    /// Start playing when an item is loaded
    pub autoplay: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            time_sync_interval_ms: 500,
            seek_tolerance_before_ms: 500,
            seek_tolerance_after_ms: 2000,
            save_history: true,
            history_limit: 100,
            autoplay: true,
        }
    }
}

impl PlayerConfig {
    pub fn time_sync_interval(&self) -> Duration {
        Duration::from_millis(self.time_sync_interval_ms)
    }

    pub fn seek_tolerance_before(&self) -> Duration {
        Duration::from_millis(self.seek_tolerance_before_ms)
    }

    pub fn seek_tolerance_after(&self) -> Duration {
        Duration::from_millis(self.seek_tolerance_after_ms)
    }
}
