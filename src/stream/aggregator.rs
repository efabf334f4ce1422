//! Stream aggregation across backend instances
//!
//! Every configured instance is queried concurrently. Each instance task
//! tags its own streams before handing them over a channel, and only the
//! coordinating task appends to the merged list. The result is returned
//! once every instance has reported, successfully or not.

use crate::backend::{InstanceRef, VideoBackend};
use crate::stream::{sort_streams, Stream};
use crate::utils::LoadState;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// What a single instance contributed
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceReport {
    /// The instance that answered
    pub instance: InstanceRef,

    /// Number of streams on success, message on failure
    pub outcome: LoadState<usize>,
}

/// Merged result of one aggregation cycle
#[derive(Debug, Clone, Default)]
pub struct AggregatedStreams {
    /// Sorted candidates from every successful instance
    pub streams: Vec<Stream>,

    /// One report per configured instance, in completion order
    pub reports: Vec<InstanceReport>,
}

impl AggregatedStreams {
    /// Instances that failed
    pub fn failures(&self) -> impl Iterator<Item = &InstanceReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, LoadState::Failed(_)))
    }
}

/// Queries all instances and merges their candidates
pub struct StreamAggregator {
    backends: Vec<Arc<dyn VideoBackend>>,
}

impl StreamAggregator {
    /// Create an aggregator over the given backends
    pub fn new(backends: Vec<Arc<dyn VideoBackend>>) -> Self {
        Self { backends }
    }

    /// Number of configured instances
    pub fn instance_count(&self) -> usize {
        self.backends.len()
    }

    /// Configured instances
    pub fn instances(&self) -> Vec<InstanceRef> {
        self.backends.iter().map(|b| b.instance().clone()).collect()
    }

    /// Load and merge candidate streams for a video
    pub async fn load_streams(&self, video_id: &str) -> AggregatedStreams {
        self.load_streams_with(video_id, |_| {}).await
    }

    /// Load and merge candidate streams, calling `on_instance` from the
    /// coordinating task as each instance reports.
    ///
    /// # Arguments
    ///
    /// * `video_id` - Video to resolve
    /// * `on_instance` - Invoked exactly once per instance, always before
    ///   this function returns
    pub async fn load_streams_with<F>(&self, video_id: &str, mut on_instance: F) -> AggregatedStreams
    where
        F: FnMut(&InstanceReport),
    {
        let total = self.backends.len();
        let mut result = AggregatedStreams::default();

        if total == 0 {
            warn!("No backend instances configured, cannot load streams for {}", video_id);
            return result;
        }

        info!("Loading streams for {} from {} instance(s)", video_id, total);

        let (tx, mut rx) = mpsc::channel(total);
        // Dropping the set aborts fetches if the caller goes away
        let mut tasks = JoinSet::new();

        for backend in &self.backends {
            let backend = Arc::clone(backend);
            let tx = tx.clone();
            let video_id = video_id.to_string();

            tasks.spawn(async move {
                let instance = backend.instance().clone();
                let fetched = backend
                    .fetch_candidate_streams(&video_id)
                    .await
                    .map(|streams| {
                        streams
                            .into_iter()
                            .map(|stream| stream.with_instance(instance.clone()))
                            .collect::<Vec<_>>()
                    });
                let _ = tx.send((instance, fetched)).await;
            });
        }
        drop(tx);

        let mut reported = HashSet::new();
        let mut completed = 0;

        while completed < total {
            let Some((instance, fetched)) = rx.recv().await else {
                break;
            };
            completed += 1;
            reported.insert(instance.id.clone());

            let outcome = match fetched {
                Ok(streams) => {
                    debug!("{} returned {} stream(s)", instance.name, streams.len());
                    let count = streams.len();
                    result.streams.extend(streams);
                    LoadState::Loaded(count)
                }
                Err(e) => {
                    warn!("{} failed to load streams for {}: {}", instance.name, video_id, e);
                    LoadState::Failed(e.to_string())
                }
            };

            let report = InstanceReport { instance, outcome };
            on_instance(&report);
            result.reports.push(report);
        }

        // A task that panicked never sent; account for it so every
        // instance still gets exactly one report.
        for backend in &self.backends {
            let instance = backend.instance();
            if !reported.contains(&instance.id) {
                warn!("{} never reported, treating as failed", instance.name);
                let report = InstanceReport {
                    instance: instance.clone(),
                    outcome: LoadState::Failed("instance task ended without a result".to_string()),
                };
                on_instance(&report);
                result.reports.push(report);
            }
        }

        tasks.shutdown().await;

        sort_streams(&mut result.streams);
        info!(
            "Loaded {} stream(s) for {} ({} instance failure(s))",
            result.streams.len(),
            video_id,
            result.failures().count()
        );

        result
    }
}
