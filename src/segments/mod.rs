//! Time-coded skip segments
//!
//! Segments come from an external service (SponsorBlock-style) and are
//! consumed by the [`SegmentSkipCoordinator`] on every time-sync tick.

mod coordinator;
mod sponsorblock;

pub use coordinator::{SegmentSkipCoordinator, SkipAction, SkippedSegment};
pub use sponsorblock::SponsorBlockClient;

use crate::utils::error::{Result, VistreamError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A time range of a video that may be skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Service-assigned identifier
    pub uuid: String,

    /// Category, e.g. "sponsor"
    pub category: String,

    start: Duration,

    end: Duration,

    /// Video duration the segment was submitted against (zero when unknown)
    pub video_duration: Duration,

    /// What the service suggests doing with the range
    pub action_type: String,
}

impl Segment {
    /// Create a segment, rejecting inverted ranges
    pub fn new(uuid: impl Into<String>, category: impl Into<String>, start: Duration, end: Duration) -> Result<Self> {
        if start > end {
            return Err(VistreamError::InvalidInput(format!(
                "segment start {:?} is after its end {:?}",
                start, end
            )));
        }
        Ok(Self {
            uuid: uuid.into(),
            category: category.into(),
            start,
            end,
            video_duration: Duration::ZERO,
            action_type: "skip".to_string(),
        })
    }

    /// Create a segment from fractional seconds as reported by services
    pub fn from_secs(uuid: impl Into<String>, category: impl Into<String>, start: f64, end: f64) -> Result<Self> {
        let to_duration = |secs: f64| {
            Duration::try_from_secs_f64(secs)
                .map_err(|_| VistreamError::InvalidInput(format!("invalid segment bound {}", secs)))
        };
        Self::new(uuid, category, to_duration(start)?, to_duration(end)?)
    }

    pub fn with_video_duration(mut self, duration: Duration) -> Self {
        self.video_duration = duration;
        self
    }

    pub fn with_action_type(mut self, action_type: impl Into<String>) -> Self {
        self.action_type = action_type.into();
        self
    }

    pub fn start(&self) -> Duration {
        self.start
    }

    pub fn end(&self) -> Duration {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Closed-interval membership: `start <= time <= end`
    pub fn contains(&self, time: Duration) -> bool {
        self.start <= time && time <= self.end
    }

    /// Start as a fraction of `duration` (or of the submitted video
    /// duration when `duration` is zero), clamped to `0.0..=1.0`
    pub fn start_fraction(&self, duration: Duration) -> f64 {
        self.fraction(self.start, duration)
    }

    /// End as a fraction, see [`Segment::start_fraction`]
    pub fn end_fraction(&self, duration: Duration) -> f64 {
        self.fraction(self.end, duration)
    }

    fn fraction(&self, time: Duration, duration: Duration) -> f64 {
        let total = if duration.is_zero() { self.video_duration } else { duration };
        if total.is_zero() {
            return 0.0;
        }
        (time.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Title for display, e.g. "Sponsor"
    pub fn title(&self) -> String {
        let mut chars = self.category.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Source of skip segments
#[async_trait]
pub trait SegmentService: Send + Sync {
    /// Fetch segments for a video
    ///
    /// # Arguments
    ///
    /// * `video_id` - Backend video identifier
    /// * `categories` - Categories to include
    ///
    /// # Returns
    ///
    /// Segments sorted by start; a video without segments yields an empty list
    async fn fetch_segments(&self, video_id: &str, categories: &[String]) -> Result<Vec<Segment>>;
}
