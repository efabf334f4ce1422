//! Timelines handed to the renderer
//!
//! Single-asset streams become a [`Timeline::Direct`]. Split streams load
//! their audio and video tracks concurrently and are composed into one
//! [`Composition`] whose tracks share a time range.

use crate::stream::{Stream, StreamAssets};
use crate::utils::error::{Result, VistreamError};
use async_trait::async_trait;
use log::debug;
use std::fmt;
use std::time::Duration;

/// Media type of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => f.write_str("audio"),
            TrackKind::Video => f.write_str("video"),
        }
    }
}

/// A loaded track of one media type
#[derive(Debug, Clone, PartialEq)]
pub struct MediaTrack {
    pub kind: TrackKind,

    /// Asset the track was loaded from
    pub source: String,

    /// Duration reported by the asset, if any
    pub duration: Option<Duration>,
}

/// Loads single tracks out of remote assets
#[async_trait]
pub trait AssetLoader: Send + Sync {
    /// Load the first track of `kind` from the asset at `url`
    ///
    /// # Arguments
    ///
    /// * `url` - Asset locator
    /// * `kind` - Media type of the wanted track
    ///
    /// # Returns
    ///
    /// The track, or an error when the asset has no such track or fails to load
    async fn load_track(&self, url: &str, kind: TrackKind) -> Result<MediaTrack>;
}

/// Half-open time range `[start, start + duration)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Duration,
    pub duration: Duration,
}

impl TimeRange {
    pub fn new(start: Duration, duration: Duration) -> Self {
        Self { start, duration }
    }

    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}

/// Audio and video tracks placed on a common timeline
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub audio: MediaTrack,
    pub video: MediaTrack,
    pub range: TimeRange,
}

/// What the renderer plays
#[derive(Debug, Clone, PartialEq)]
pub enum Timeline {
    /// Asset attached as is
    Direct { url: String },

    /// Composed split tracks
    Composed(Composition),
}

impl Timeline {
    /// Total playable duration, when known
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Timeline::Direct { .. } => None,
            Timeline::Composed(composition) => Some(composition.range.duration),
        }
    }
}

/// Build the timeline for a stream
///
/// Both tracks of a split stream must load; a single failure abandons the
/// build. The composed range covers `[0, length)`, falling back to the
/// shorter track duration when the video length is unknown.
pub async fn build_timeline(loader: &dyn AssetLoader, stream: &Stream, length: Duration) -> Result<Timeline> {
    let (audio_url, video_url) = match &stream.assets {
        StreamAssets::Single { url } => return Ok(Timeline::Direct { url: url.clone() }),
        StreamAssets::Split { audio, video } => (audio, video),
    };

    debug!("Composing {} from split tracks", stream.description());

    let (audio, video) = tokio::join!(
        loader.load_track(audio_url, TrackKind::Audio),
        loader.load_track(video_url, TrackKind::Video),
    );
    let audio = audio?;
    let video = video?;

    let duration = if !length.is_zero() {
        length
    } else {
        match (audio.duration, video.duration) {
            (Some(a), Some(v)) => a.min(v),
            (Some(d), None) | (None, Some(d)) => d,
            (None, None) => {
                return Err(VistreamError::Asset(format!(
                    "Cannot compose {}: no known duration",
                    stream.description()
                )))
            }
        }
    };

    Ok(Timeline::Composed(Composition {
        audio,
        video,
        range: TimeRange::new(Duration::ZERO, duration),
    }))
}
