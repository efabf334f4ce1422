//! SponsorBlock-style segment client

use crate::backend::JsonTransport;
use crate::segments::{Segment, SegmentService};
use crate::utils::error::{IntoVistreamError, Result, VistreamError};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SegmentEntry {
    #[serde(rename = "UUID")]
    uuid: String,
    category: String,
    segment: [f64; 2],
    #[serde(default)]
    action_type: Option<String>,
    #[serde(default)]
    video_duration: Option<f64>,
}

/// Client for `GET {api}/api/skipSegments`
pub struct SponsorBlockClient {
    api_url: String,
    transport: Arc<dyn JsonTransport>,
}

impl SponsorBlockClient {
    pub fn new(api_url: impl Into<String>, transport: Arc<dyn JsonTransport>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            transport,
        }
    }

    fn request_url(&self, video_id: &str, categories: &[String]) -> Result<String> {
        let categories = serde_json::to_string(categories)?;
        let url = reqwest::Url::parse_with_params(
            &format!("{}/api/skipSegments", self.api_url),
            &[("videoID", video_id), ("categories", categories.as_str())],
        )
        .parse_err("Segment API URL")?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl SegmentService for SponsorBlockClient {
    async fn fetch_segments(&self, video_id: &str, categories: &[String]) -> Result<Vec<Segment>> {
        let url = self.request_url(video_id, categories)?;

        let json = match self.transport.get_json(&url).await {
            Ok(json) => json,
            // The service answers 404 for videos without segments
            Err(VistreamError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let entries: Vec<SegmentEntry> = serde_json::from_value(json).parse_err("Segment response")?;

        let mut segments: Vec<Segment> = entries
            .into_iter()
            .filter(|entry| entry.action_type.as_deref().unwrap_or("skip") == "skip")
            .filter_map(|entry| {
                let [start, end] = entry.segment;
                match Segment::from_secs(entry.uuid, entry.category, start, end) {
                    Ok(segment) => Some(
                        segment
                            .with_video_duration(
                                entry
                                    .video_duration
                                    .and_then(|d| Duration::try_from_secs_f64(d).ok())
                                    .unwrap_or_default(),
                            )
                            .with_action_type("skip"),
                    ),
                    Err(e) => {
                        warn!("Dropping segment for {}: {}", video_id, e);
                        None
                    }
                }
            })
            .collect();

        segments.sort_by_key(|s| s.start());
        debug!("Loaded {} segment(s) for {}", segments.len(), video_id);
        Ok(segments)
    }
}
