//! One-shot segment skipping driven by time-sync ticks

use crate::player::SeekType;
use crate::segments::{Segment, SegmentService};
use crate::utils::LoadState;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Seek the caller should perform to skip a segment
#[derive(Debug, Clone, PartialEq)]
pub struct SkipAction {
    pub segment: Segment,
    pub seek_to: Duration,
}

/// The most recent skip, kept so it can be undone
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSegment {
    pub segment: Segment,

    /// Position playback was at when the skip fired
    pub resume_at: Duration,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    video_id: Option<String>,
    segments: LoadState<Vec<Segment>>,
    /// Segment whose range playback is currently inside after a skip
    active: Option<String>,
    last_skipped: Option<SkippedSegment>,
}

/// Tracks the segments of the current video and decides when to skip
pub struct SegmentSkipCoordinator {
    service: Option<Arc<dyn SegmentService>>,
    categories: Vec<String>,
    state: Mutex<CoordinatorState>,
}

impl SegmentSkipCoordinator {
    /// Create a coordinator; without a service nothing is ever skipped
    pub fn new(service: Option<Arc<dyn SegmentService>>, categories: Vec<String>) -> Self {
        Self {
            service,
            categories,
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    /// Load segments for a video, once per video ID
    ///
    /// Failures leave the list empty so playback simply never skips.
    pub async fn load(&self, video_id: &str) -> usize {
        {
            let mut state = self.state.lock();
            if state.video_id.as_deref() == Some(video_id) {
                return state.segments.loaded().map_or(0, Vec::len);
            }
            *state = CoordinatorState {
                video_id: Some(video_id.to_string()),
                ..CoordinatorState::default()
            };
        }

        let Some(service) = &self.service else {
            self.finish_load(video_id, LoadState::Loaded(Vec::new()));
            return 0;
        };

        let loaded = match service.fetch_segments(video_id, &self.categories).await {
            Ok(segments) => {
                info!("{} segment(s) to skip in {}", segments.len(), video_id);
                LoadState::Loaded(segments)
            }
            Err(e) => {
                warn!("Failed to load segments for {}: {}", video_id, e);
                LoadState::Failed(e.to_string())
            }
        };
        let count = loaded.loaded().map_or(0, Vec::len);
        self.finish_load(video_id, loaded);
        count
    }

    fn finish_load(&self, video_id: &str, segments: LoadState<Vec<Segment>>) {
        let mut state = self.state.lock();
        // A load for another video started meanwhile
        if state.video_id.as_deref() == Some(video_id) {
            state.segments = segments;
        }
    }

    /// Segments of the current video; empty until loaded or on failure
    pub fn segments(&self) -> Vec<Segment> {
        self.state.lock().segments.loaded().cloned().unwrap_or_default()
    }

    /// Load state of the current video's segments
    pub fn load_state(&self) -> LoadState<usize> {
        self.state.lock().segments.clone().map(|s| s.len())
    }

    /// Evaluate one playback position
    ///
    /// Returns a skip the first time playback is seen inside a segment. The
    /// same segment does not trigger again until playback has left its range.
    pub fn check(&self, time: Duration) -> Option<SkipAction> {
        let mut state = self.state.lock();
        let state = &mut *state;
        let segments = state.segments.loaded()?;

        if let Some(active) = &state.active {
            let still_inside = segments
                .iter()
                .any(|s| &s.uuid == active && s.contains(time));
            if still_inside {
                return None;
            }
            debug!("Left segment {}", active);
            state.active = None;
        }

        let segment = segments.iter().find(|s| s.contains(time))?.clone();
        debug!(
            "Skipping {} segment {} at {:.1}s",
            segment.category,
            segment.uuid,
            time.as_secs_f64()
        );

        state.active = Some(segment.uuid.clone());
        state.last_skipped = Some(SkippedSegment {
            segment: segment.clone(),
            resume_at: time,
        });

        Some(SkipAction {
            seek_to: segment.end(),
            segment,
        })
    }

    /// The last skip, if any
    pub fn last_skipped(&self) -> Option<SkippedSegment> {
        self.state.lock().last_skipped.clone()
    }

    /// Undo the last skip
    ///
    /// Only applies when the last seek was the skip itself; after any other
    /// seek this is a no-op. A restore is single use, and the restored
    /// segment is not skipped again while playback stays inside it.
    pub fn take_restore(&self, last_seek: Option<&SeekType>) -> Option<SkippedSegment> {
        let Some(SeekType::SegmentSkip { segment_uuid }) = last_seek else {
            return None;
        };

        let mut state = self.state.lock();
        if state.last_skipped.as_ref()?.segment.uuid != *segment_uuid {
            return None;
        }
        let skipped = state.last_skipped.take()?;
        state.active = Some(skipped.segment.uuid.clone());
        Some(skipped)
    }

    /// Forget the current video
    pub fn reset(&self) {
        *self.state.lock() = CoordinatorState::default();
    }
}
