//! Video metadata model
//!
//! A [`Video`] is created from a backend response or as a bare reference
//! (ID only, or a local file). It is shared as `Arc<Video>` and replaced
//! wholesale when richer metadata arrives; it is never patched in place.

use crate::stream::{Resolution, Stream, StreamFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chapter marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub start: Duration,
    pub image_url: Option<String>,
}

/// Caption/subtitle track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub label: String,
    pub language_code: String,
    pub url: String,
}

/// Video metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    /// Opaque backend ID (the URL for local files)
    pub id: String,

    pub title: String,

    pub author: String,

    /// Known length, zero when unknown
    pub length: Duration,

    pub thumbnail_url: Option<String>,

    /// Live broadcast
    #[serde(default)]
    pub live: bool,

    /// Local file reference that never goes through a backend
    #[serde(default)]
    pub local: bool,

    /// Candidate streams; never persisted since stream URLs expire
    #[serde(skip)]
    pub streams: Vec<Stream>,

    #[serde(default)]
    pub chapters: Vec<Chapter>,

    #[serde(default)]
    pub captions: Vec<Caption>,
}

impl Video {
    /// Bare reference known only by ID
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            author: String::new(),
            length: Duration::ZERO,
            thumbnail_url: None,
            live: false,
            local: false,
            streams: Vec::new(),
            chapters: Vec::new(),
            captions: Vec::new(),
        }
    }

    /// Local file reference, playable without any backend
    pub fn local(url: impl Into<String>) -> Self {
        let url = url.into();
        let title = url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(&url)
            .to_string();
        let format = if url.ends_with(".m3u8") {
            StreamFormat::Hls
        } else {
            StreamFormat::Stream
        };

        let mut video = Self::from_id(url.clone());
        video.title = title;
        video.local = true;
        video.streams = vec![Stream::single(url, Resolution::UNKNOWN, format)];
        video
    }

    /// Whether the video already carries stream data
    pub fn is_hydrated(&self) -> bool {
        !self.streams.is_empty()
    }

    /// Copy of this video without stream data, suitable for caching
    pub fn without_streams(&self) -> Self {
        Self {
            streams: Vec::new(),
            ..self.clone()
        }
    }

    /// Title for display, falling back to the ID
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_video_is_not_hydrated() {
        let video = Video::from_id("dQw4w9WgXcQ");
        assert!(!video.is_hydrated());
        assert_eq!(video.display_title(), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_local_video() {
        let video = Video::local("file:///media/clips/intro.mp4");
        assert!(video.local);
        assert!(video.is_hydrated());
        assert_eq!(video.title, "intro.mp4");
        assert!(video.streams[0].is_single_asset());
    }

    #[test]
    fn test_serialization_drops_streams() {
        let video = Video::local("file:///media/a.mp4");
        let json = serde_json::to_value(&video).unwrap();
        let restored: Video = serde_json::from_value(json).unwrap();
        assert!(restored.streams.is_empty());
        assert_eq!(restored.title, "a.mp4");
    }
}
