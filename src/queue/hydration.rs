//! At-most-once metadata hydration
//!
//! Concurrent requests for the same video share one in-flight fetch. Once a
//! fetch succeeds its result is reused for that video ID until the queue
//! forgets it; a failed fetch leaves nothing behind, so a later request
//! retries. Instances are tried in order until one answers.

use crate::backend::VideoBackend;
use crate::cache::{cached_video, store_video, PersistentCache};
use crate::media::Video;
use crate::utils::error::{Result, VistreamError};
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Resolves bare video references into full metadata
pub struct Hydrator {
    backends: Vec<Arc<dyn VideoBackend>>,
    cache: Option<Arc<dyn PersistentCache>>,
    in_flight: Mutex<HashMap<String, Arc<OnceCell<Arc<Video>>>>>,
}

impl Hydrator {
    /// Create a hydrator fetching from `backends`, in order
    pub fn new(backends: Vec<Arc<dyn VideoBackend>>, cache: Option<Arc<dyn PersistentCache>>) -> Self {
        Self {
            backends,
            cache,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Best reference available without a network round trip
    pub fn prefill(&self, video_id: &str) -> Video {
        self.cache
            .as_deref()
            .and_then(|cache| cached_video(cache, video_id))
            .unwrap_or_else(|| Video::from_id(video_id))
    }

    /// Whether hydrating this video would hit the backend
    pub fn needs_fetch(video: &Video) -> bool {
        !video.local && !video.is_hydrated()
    }

    /// Hydrate a video, sharing any fetch already in flight for its ID
    pub async fn hydrate(&self, video: Arc<Video>) -> Result<Arc<Video>> {
        if !Self::needs_fetch(&video) {
            return Ok(video);
        }

        if self.backends.is_empty() {
            return Err(VistreamError::InvalidInput(format!(
                "No backend instance to hydrate {}",
                video.id
            )));
        }

        let cell = Arc::clone(self.in_flight.lock().entry(video.id.clone()).or_default());

        let hydrated = cell
            .get_or_try_init(|| async {
                let mut last_error = None;
                for backend in &self.backends {
                    let instance = backend.instance();
                    debug!("Fetching metadata for {} from {}", video.id, instance.name);
                    match backend.fetch_video(&video.id).await {
                        Ok(fetched) => {
                            if let Some(cache) = &self.cache {
                                store_video(cache.as_ref(), &fetched);
                            }
                            return Ok(Arc::new(fetched));
                        }
                        Err(e) => {
                            warn!("{} could not hydrate {}: {}", instance.name, video.id, e);
                            last_error = Some(e);
                        }
                    }
                }
                Err(last_error.unwrap_or_else(|| VistreamError::Internal("no backend answered".to_string())))
            })
            .await?;

        Ok(Arc::clone(hydrated))
    }

    /// Drop a memoized result so the next request fetches again
    pub fn forget(&self, video_id: &str) {
        self.in_flight.lock().remove(video_id);
    }

    /// Number of video IDs with a memoized or in-flight fetch
    pub fn tracked(&self) -> usize {
        self.in_flight.lock().len()
    }
}
