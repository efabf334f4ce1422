//! Invidious-style API adapter
//!
//! `GET /api/v1/videos/{id}` returns muxed `formatStreams`, split
//! `adaptiveFormats` and, for live videos, an `hlsUrl`. Adaptive video
//! entries are paired with the single highest-bitrate MP4 audio track.

use crate::backend::{absolute_url, lenient_u64, InstanceRef, JsonTransport, VideoBackend};
use crate::media::{Caption, Video};
use crate::stream::{Resolution, Stream, StreamFormat};
use crate::utils::error::{IntoVistreamError, Result};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResponse {
    video_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    length_seconds: u64,
    #[serde(default)]
    live_now: bool,
    #[serde(default)]
    video_thumbnails: Vec<Thumbnail>,
    #[serde(default)]
    hls_url: Option<String>,
    #[serde(default)]
    format_streams: Vec<FormatStream>,
    #[serde(default)]
    adaptive_formats: Vec<AdaptiveFormat>,
    #[serde(default)]
    captions: Vec<CaptionEntry>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    #[serde(default)]
    quality: String,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FormatStream {
    url: String,
    #[serde(rename = "type", default)]
    mime: String,
    #[serde(default)]
    resolution: Option<String>,
    #[serde(default)]
    quality_label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdaptiveFormat {
    url: String,
    #[serde(rename = "type", default)]
    mime: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    bitrate: Option<u64>,
    #[serde(default)]
    quality_label: Option<String>,
    #[serde(default)]
    resolution: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionEntry {
    label: String,
    #[serde(default)]
    language_code: String,
    url: String,
}

impl AdaptiveFormat {
    fn is_compatible_audio(&self) -> bool {
        self.mime.starts_with("audio/mp4")
    }

    fn resolution(&self) -> Resolution {
        self.quality_label
            .as_deref()
            .or(self.resolution.as_deref())
            .map(Resolution::from_label)
            .unwrap_or(Resolution::UNKNOWN)
    }
}

/// Backend speaking the Invidious API
pub struct InvidiousBackend {
    instance: InstanceRef,
    transport: Arc<dyn JsonTransport>,
}

impl InvidiousBackend {
    /// Create an adapter for one instance
    pub fn new(instance: InstanceRef, transport: Arc<dyn JsonTransport>) -> Self {
        Self { instance, transport }
    }

    fn video_url(&self, video_id: &str) -> String {
        format!("{}/api/v1/videos/{}", self.instance.url, video_id)
    }

    async fn fetch_response(&self, video_id: &str) -> Result<VideoResponse> {
        let json = self
            .transport
            .get_json(&self.video_url(video_id))
            .await
            .backend_err(&self.instance.id)?;

        serde_json::from_value(json).parse_err(&format!("{} video response", self.instance.name))
    }

    fn streams(&self, response: &VideoResponse) -> Vec<Stream> {
        let base = &self.instance.url;
        let mut streams = Vec::new();

        if let Some(hls) = &response.hls_url {
            streams.push(Stream::hls(absolute_url(base, hls)));
        }

        for format in &response.format_streams {
            let resolution = format
                .resolution
                .as_deref()
                .or(format.quality_label.as_deref())
                .map(Resolution::from_label)
                .unwrap_or(Resolution::UNKNOWN);
            if resolution.is_unknown() {
                continue;
            }
            streams.push(Stream::single(
                absolute_url(base, &format.url),
                resolution,
                StreamFormat::from_mime(&format.mime),
            ));
        }

        let audio = response
            .adaptive_formats
            .iter()
            .filter(|f| f.is_compatible_audio())
            .max_by_key(|f| f.bitrate.unwrap_or(0));

        let Some(audio) = audio else {
            debug!("{}: no compatible audio track, skipping adaptive formats", self.instance.name);
            return streams;
        };
        let audio_url = absolute_url(base, &audio.url);

        for format in &response.adaptive_formats {
            if !format.mime.starts_with("video/") {
                continue;
            }
            let resolution = format.resolution();
            let container = StreamFormat::from_mime(&format.mime);
            if resolution.is_unknown() || container == StreamFormat::Unknown {
                continue;
            }
            streams.push(
                Stream::split(audio_url.clone(), absolute_url(base, &format.url), resolution, container)
                    .with_bitrate(format.bitrate),
            );
        }

        streams
    }

    fn video(&self, response: VideoResponse) -> Video {
        let streams = self.streams(&response);
        let base = &self.instance.url;

        let thumbnail_url = response
            .video_thumbnails
            .iter()
            .find(|t| t.quality == "medium")
            .or_else(|| response.video_thumbnails.first())
            .map(|t| absolute_url(base, &t.url));

        let captions = response
            .captions
            .into_iter()
            .map(|c| Caption {
                label: c.label,
                language_code: c.language_code,
                url: absolute_url(base, &c.url),
            })
            .collect();

        Video {
            id: response.video_id,
            title: response.title,
            author: response.author,
            length: Duration::from_secs(response.length_seconds),
            thumbnail_url,
            live: response.live_now,
            local: false,
            streams,
            chapters: Vec::new(),
            captions,
        }
    }
}

#[async_trait]
impl VideoBackend for InvidiousBackend {
    fn instance(&self) -> &InstanceRef {
        &self.instance
    }

    async fn fetch_candidate_streams(&self, video_id: &str) -> Result<Vec<Stream>> {
        let response = self.fetch_response(video_id).await?;
        Ok(self.streams(&response))
    }

    async fn fetch_video(&self, video_id: &str) -> Result<Video> {
        let response = self.fetch_response(video_id).await?;
        Ok(self.video(response))
    }
}
