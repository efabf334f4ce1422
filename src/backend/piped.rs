//! Piped-style API adapter
//!
//! `GET /streams/{id}` lists `videoStreams` (muxed or video-only) and
//! `audioStreams`. Video-only entries are paired with the best M4A track.

use crate::backend::{absolute_url, lenient_u64, InstanceRef, JsonTransport, VideoBackend};
use crate::media::{Caption, Chapter, Video};
use crate::stream::{Resolution, Stream, StreamFormat};
use crate::utils::error::{IntoVistreamError, Result};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamsResponse {
    #[serde(default)]
    title: String,
    #[serde(default)]
    uploader: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    duration: Option<u64>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    livestream: bool,
    #[serde(default)]
    hls: Option<String>,
    video_streams: Vec<VideoStreamEntry>,
    #[serde(default)]
    audio_streams: Vec<AudioStreamEntry>,
    #[serde(default)]
    chapters: Vec<ChapterEntry>,
    #[serde(default)]
    subtitles: Vec<SubtitleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStreamEntry {
    url: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    quality: String,
    #[serde(default)]
    codec: Option<String>,
    #[serde(default)]
    video_only: bool,
    #[serde(default, deserialize_with = "lenient_u64")]
    bitrate: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioStreamEntry {
    url: String,
    #[serde(default)]
    format: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    bitrate: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChapterEntry {
    title: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    start: u64,
}

#[derive(Debug, Deserialize)]
struct SubtitleEntry {
    url: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    code: String,
}

/// Backend speaking the Piped API
pub struct PipedBackend {
    instance: InstanceRef,
    transport: Arc<dyn JsonTransport>,
}

impl PipedBackend {
    /// Create an adapter for one instance
    pub fn new(instance: InstanceRef, transport: Arc<dyn JsonTransport>) -> Self {
        Self { instance, transport }
    }

    async fn fetch_response(&self, video_id: &str) -> Result<StreamsResponse> {
        let url = format!("{}/streams/{}", self.instance.url, video_id);
        let json = self
            .transport
            .get_json(&url)
            .await
            .backend_err(&self.instance.id)?;

        serde_json::from_value(json).parse_err(&format!("{} streams response", self.instance.name))
    }

    fn streams(&self, response: &StreamsResponse) -> Vec<Stream> {
        let base = &self.instance.url;
        let mut streams = Vec::new();

        if let Some(hls) = response.hls.as_deref().filter(|url| !url.is_empty()) {
            streams.push(Stream::hls(absolute_url(base, hls)));
        }

        let audio = response
            .audio_streams
            .iter()
            .filter(|a| a.format.eq_ignore_ascii_case("M4A"))
            .max_by_key(|a| a.bitrate.unwrap_or(0))
            .map(|a| absolute_url(base, &a.url));

        if audio.is_none() {
            debug!("{}: no M4A audio track, video-only entries dropped", self.instance.name);
        }

        for entry in &response.video_streams {
            let resolution = Resolution::from_label(&entry.quality);
            if resolution.is_unknown() {
                continue;
            }
            let format = StreamFormat::from_container(&entry.format, entry.codec.as_deref());
            let url = absolute_url(base, &entry.url);

            if !entry.video_only {
                streams.push(Stream::single(url, resolution, format));
                continue;
            }

            let Some(audio) = &audio else { continue };
            if format == StreamFormat::Unknown {
                continue;
            }
            streams.push(Stream::split(audio.clone(), url, resolution, format).with_bitrate(entry.bitrate));
        }

        streams
    }

    fn video(&self, video_id: &str, response: StreamsResponse) -> Video {
        let streams = self.streams(&response);
        let base = &self.instance.url;

        Video {
            id: video_id.to_string(),
            title: response.title,
            author: response.uploader,
            length: Duration::from_secs(response.duration.unwrap_or(0)),
            thumbnail_url: response.thumbnail_url.map(|url| absolute_url(base, &url)),
            live: response.livestream,
            local: false,
            streams,
            chapters: response
                .chapters
                .into_iter()
                .map(|c| Chapter {
                    title: c.title,
                    start: Duration::from_secs(c.start),
                    image_url: c.image,
                })
                .collect(),
            captions: response
                .subtitles
                .into_iter()
                .map(|s| Caption {
                    label: s.name,
                    language_code: s.code,
                    url: absolute_url(base, &s.url),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl VideoBackend for PipedBackend {
    fn instance(&self) -> &InstanceRef {
        &self.instance
    }

    async fn fetch_candidate_streams(&self, video_id: &str) -> Result<Vec<Stream>> {
        let response = self.fetch_response(video_id).await?;
        Ok(self.streams(&response))
    }

    async fn fetch_video(&self, video_id: &str) -> Result<Video> {
        let response = self.fetch_response(video_id).await?;
        Ok(self.video(video_id, response))
    }
}
