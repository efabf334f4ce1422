//! Stream model for vistream
//!
//! A [`Stream`] is one playable candidate for a video: either a single asset
//! (muxed file or HLS playlist) or a split pair of audio-only and video-only
//! assets that must be composed before playback. Streams from different
//! instances at the same resolution and kind compare equal, so selection
//! never relies on identity.

mod aggregator;
mod quality;
mod resolution;

pub use aggregator::{AggregatedStreams, InstanceReport, StreamAggregator};
pub use quality::{QualityProfile, QualityProfiles, ResolutionSetting};
pub use resolution::{Resolution, StreamFormat};

use crate::backend::InstanceRef;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Kind of a stream, in playback preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamKind {
    /// Single direct asset carrying audio and video
    Stream,

    /// Separate audio and video assets composed into one timeline
    Adaptive,

    /// HLS playlist, adapts by itself
    Hls,
}

/// Underlying asset locators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamAssets {
    /// One URL covering audio and video
    Single { url: String },

    /// Audio-only plus video-only URLs
    Split { audio: String, video: String },
}

/// Identity used for equality, hashing and composition caching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub resolution: Resolution,
    pub kind: StreamKind,
}

/// Playable candidate stream
#[derive(Debug, Clone)]
pub struct Stream {
    /// Asset locators
    pub assets: StreamAssets,

    /// Resolution tier (unknown for HLS and audio-only sources)
    pub resolution: Resolution,

    /// Declared container/encoding
    pub format: StreamFormat,

    /// Video bitrate in bits per second, when the backend reports it
    pub bitrate: Option<u64>,

    /// Backend instance this candidate came from
    pub instance: Option<InstanceRef>,
}

impl Stream {
    /// Single-asset stream
    pub fn single(url: impl Into<String>, resolution: Resolution, format: StreamFormat) -> Self {
        Self {
            assets: StreamAssets::Single { url: url.into() },
            resolution,
            format,
            bitrate: None,
            instance: None,
        }
    }

    /// HLS playlist stream
    pub fn hls(url: impl Into<String>) -> Self {
        Self::single(url, Resolution::UNKNOWN, StreamFormat::Hls)
    }

    /// Split audio + video stream
    pub fn split(
        audio: impl Into<String>,
        video: impl Into<String>,
        resolution: Resolution,
        format: StreamFormat,
    ) -> Self {
        Self {
            assets: StreamAssets::Split {
                audio: audio.into(),
                video: video.into(),
            },
            resolution,
            format,
            bitrate: None,
            instance: None,
        }
    }

    /// Attach a bitrate
    pub fn with_bitrate(mut self, bitrate: Option<u64>) -> Self {
        self.bitrate = bitrate;
        self
    }

    /// Tag with the originating instance
    pub fn with_instance(mut self, instance: InstanceRef) -> Self {
        self.instance = Some(instance);
        self
    }

    /// Derived kind
    pub fn kind(&self) -> StreamKind {
        match (&self.assets, self.format) {
            (StreamAssets::Split { .. }, _) => StreamKind::Adaptive,
            (StreamAssets::Single { .. }, StreamFormat::Hls) => StreamKind::Hls,
            (StreamAssets::Single { .. }, _) => StreamKind::Stream,
        }
    }

    /// Identity for selection and caching
    pub fn key(&self) -> StreamKey {
        StreamKey {
            resolution: self.resolution,
            kind: self.kind(),
        }
    }

    /// Whether the stream can be attached without composition
    pub fn is_single_asset(&self) -> bool {
        matches!(self.assets, StreamAssets::Single { .. })
    }

    /// Human readable description, e.g. "1080p60 AVC1 (adaptive) via inv.example"
    pub fn description(&self) -> String {
        let kind = match self.kind() {
            StreamKind::Stream => "stream",
            StreamKind::Adaptive => "adaptive",
            StreamKind::Hls => "hls",
        };
        let mut text = if self.kind() == StreamKind::Hls {
            "HLS".to_string()
        } else {
            format!("{} {} ({})", self.resolution, self.format, kind)
        };
        if let Some(instance) = &self.instance {
            text.push_str(" via ");
            text.push_str(&instance.name);
        }
        text
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Stream {}

impl Hash for Stream {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Ordering used for presenting and merging candidates:
/// kind ascending, then resolution descending.
pub fn stream_order(a: &Stream, b: &Stream) -> Ordering {
    a.kind()
        .cmp(&b.kind())
        .then_with(|| b.resolution.cmp(&a.resolution))
}

/// Sort candidates in place (stable, so instance order breaks ties)
pub fn sort_streams(streams: &mut [Stream]) {
    streams.sort_by(stream_order);
}
