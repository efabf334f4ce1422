//! Stream switching with staged timelines
//!
//! A switch builds its timeline in a spawned task (the staged load). Only
//! the most recent switch may commit: every switch bumps a generation
//! counter and aborts the previous staged load, and the commit re-checks
//! both the generation and the desired stream under the lock before the
//! renderer is touched.

use crate::player::composition::{build_timeline, AssetLoader, Timeline};
use crate::player::{Renderer, SeekType};
use crate::stream::{Stream, StreamKey};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Engine state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Nothing attached
    Idle,

    /// Building a timeline
    Loading,

    /// Timeline attached to the renderer
    Ready,
}

/// Result of a stream switch
#[derive(Debug, Clone)]
pub enum SwitchOutcome {
    /// The stream is now attached
    Attached {
        stream: Stream,
        timeline: Timeline,
        /// Position sought to after attaching
        restored_position: Option<Duration>,
        /// Whether the timeline was freshly built rather than reused
        built: bool,
    },

    /// A newer switch replaced this one; nothing was attached
    Superseded,

    /// The timeline could not be built or attached; the previous stream
    /// keeps playing
    Failed(String),
}

struct EngineInner {
    state: EngineState,
    generation: u64,
    desired: Option<StreamKey>,
    current: Option<Stream>,
    timeline: Option<Timeline>,
    staged: Option<AbortHandle>,
    last_seek: Option<SeekType>,
}

/// Attaches streams to a renderer
pub struct PlaybackEngine {
    renderer: Arc<dyn Renderer>,
    loader: Arc<dyn AssetLoader>,
    tolerance_before: Duration,
    tolerance_after: Duration,
    inner: Mutex<EngineInner>,
}

impl PlaybackEngine {
    /// Create an engine
    ///
    /// # Arguments
    ///
    /// * `renderer` - Media pipeline to drive
    /// * `loader` - Track loader for split streams
    /// * `tolerance_before` - Restore seek tolerance before the saved position
    /// * `tolerance_after` - Restore seek tolerance after the saved position
    pub fn new(
        renderer: Arc<dyn Renderer>,
        loader: Arc<dyn AssetLoader>,
        tolerance_before: Duration,
        tolerance_after: Duration,
    ) -> Self {
        Self {
            renderer,
            loader,
            tolerance_before,
            tolerance_after,
            inner: Mutex::new(EngineInner {
                state: EngineState::Idle,
                generation: 0,
                desired: None,
                current: None,
                timeline: None,
                staged: None,
                last_seek: None,
            }),
        }
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    pub fn state(&self) -> EngineState {
        self.inner.lock().state
    }

    /// Stream currently attached
    pub fn current_stream(&self) -> Option<Stream> {
        self.inner.lock().current.clone()
    }

    /// Timeline currently attached
    pub fn current_timeline(&self) -> Option<Timeline> {
        self.inner.lock().timeline.clone()
    }

    /// Why the last seek happened
    pub fn last_seek_type(&self) -> Option<SeekType> {
        self.inner.lock().last_seek.clone()
    }

    /// Switch to a stream, optionally preserving position and play state
    ///
    /// # Arguments
    ///
    /// * `stream` - Stream to attach
    /// * `length` - Known video length, used as the composition range
    /// * `cached` - Previously built timeline for this stream, reused as is
    /// * `restore_position` - Carry the renderer position over; only valid
    ///   when the new stream belongs to the same video
    /// * `force_play` - Start playing even if the renderer was paused
    pub async fn switch_stream(
        &self,
        stream: Stream,
        length: Duration,
        cached: Option<Timeline>,
        restore_position: bool,
        force_play: bool,
    ) -> SwitchOutcome {
        let key = stream.key();

        let (generation, task) = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            if let Some(previous) = inner.staged.take() {
                debug!("Aborting staged load superseded by {}", stream.description());
                previous.abort();
            }
            inner.desired = Some(key);
            inner.state = EngineState::Loading;

            let loader = Arc::clone(&self.loader);
            let staged_stream = stream.clone();
            let task = tokio::spawn(async move {
                match cached {
                    Some(timeline) => Ok((timeline, false)),
                    None => build_timeline(loader.as_ref(), &staged_stream, length)
                        .await
                        .map(|timeline| (timeline, true)),
                }
            });
            inner.staged = Some(task.abort_handle());
            (inner.generation, task)
        };

        let (timeline, built) = match task.await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => return self.abandon(generation, &stream, e.to_string()),
            Err(e) if e.is_cancelled() => return SwitchOutcome::Superseded,
            Err(e) => return self.abandon(generation, &stream, format!("staged load panicked: {}", e)),
        };

        let (saved_position, was_playing) = {
            let mut inner = self.inner.lock();
            if inner.generation != generation || inner.desired != Some(key) {
                debug!("Dropping stale timeline for {}", stream.description());
                return SwitchOutcome::Superseded;
            }
            inner.staged = None;

            let saved_position = if restore_position {
                self.renderer.current_position().filter(|p| !p.is_zero())
            } else {
                None
            };
            let was_playing = self.renderer.is_playing();

            if let Err(e) = self.renderer.attach_timeline(&timeline) {
                drop(inner);
                return self.abandon(generation, &stream, e.to_string());
            }

            inner.state = EngineState::Ready;
            inner.current = Some(stream.clone());
            inner.timeline = Some(timeline.clone());
            if saved_position.is_some() {
                inner.last_seek = Some(SeekType::Resync);
            }
            (saved_position, was_playing)
        };

        info!("Attached {}", stream.description());

        if let Some(position) = saved_position {
            if !self
                .renderer
                .seek(position, self.tolerance_before, self.tolerance_after)
                .await
            {
                debug!("Position restore to {:?} was interrupted", position);
            }
        }

        if was_playing || force_play {
            self.renderer.play();
        }

        SwitchOutcome::Attached {
            stream,
            timeline,
            restored_position: saved_position,
            built,
        }
    }

    fn abandon(&self, generation: u64, stream: &Stream, message: String) -> SwitchOutcome {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return SwitchOutcome::Superseded;
        }

        warn!("Switch to {} failed: {}", stream.description(), message);
        inner.staged = None;
        inner.desired = inner.current.as_ref().map(Stream::key);
        inner.state = if inner.current.is_some() {
            EngineState::Ready
        } else {
            EngineState::Idle
        };
        SwitchOutcome::Failed(message)
    }

    /// Seek the attached timeline, tagging why
    ///
    /// Explicit seeks land exactly; only position restores use the
    /// asymmetric tolerance.
    pub async fn seek(&self, to: Duration, seek_type: SeekType) -> bool {
        let (before, after) = match seek_type {
            SeekType::Resync => (self.tolerance_before, self.tolerance_after),
            _ => (Duration::ZERO, Duration::ZERO),
        };

        {
            let mut inner = self.inner.lock();
            if inner.state != EngineState::Ready {
                debug!("Ignoring {:?} seek without an attached stream", seek_type);
                return false;
            }
            inner.last_seek = Some(seek_type);
        }

        self.renderer.seek(to, before, after).await
    }

    /// Tear down: cancel any staged load and detach the renderer
    pub fn detach(&self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        if let Some(staged) = inner.staged.take() {
            staged.abort();
        }
        inner.desired = None;
        inner.current = None;
        inner.timeline = None;
        inner.last_seek = None;
        inner.state = EngineState::Idle;
        drop(inner);

        self.renderer.pause();
        self.renderer.detach();
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        if let Some(staged) = self.inner.get_mut().staged.take() {
            staged.abort();
        }
    }
}
