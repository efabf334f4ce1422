//! Periodic sampling of the playback clock
//!
//! One task samples the renderer at a fixed interval and hands each sample
//! to a [`TickHandler`]. Ticks are strictly sequential: a slow handler
//! delays the next tick instead of overlapping it, and missed ticks are
//! skipped rather than replayed in a burst.

use crate::player::{MediaDuration, Renderer};
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// One clock sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeSample {
    pub time: Duration,
    pub live: bool,
}

/// Consumer of clock samples
#[async_trait]
pub trait TickHandler: Send + Sync {
    /// Handle one sample; keep this O(segments) or cheaper
    async fn on_tick(&self, sample: TimeSample);
}

/// Last sampled clock, readable from anywhere
#[derive(Debug, Default)]
pub struct PlaybackClock {
    sample: Mutex<TimeSample>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_time(&self) -> Duration {
        self.sample.lock().time
    }

    pub fn is_live(&self) -> bool {
        self.sample.lock().live
    }

    pub fn sample(&self) -> TimeSample {
        *self.sample.lock()
    }

    pub(crate) fn set(&self, sample: TimeSample) {
        *self.sample.lock() = sample;
    }

    pub(crate) fn reset(&self) {
        self.set(TimeSample::default());
    }
}

/// Fixed-interval sampler
pub struct TimeSync {
    interval: Duration,
    clock: Arc<PlaybackClock>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TimeSync {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            clock: Arc::new(PlaybackClock::new()),
            task: Mutex::new(None),
        }
    }

    /// Shared clock updated on every tick
    pub fn clock(&self) -> Arc<PlaybackClock> {
        Arc::clone(&self.clock)
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start sampling, replacing any previous sampler
    pub fn start(&self, renderer: Arc<dyn Renderer>, handler: Arc<dyn TickHandler>) {
        let interval = self.interval;
        let clock = Arc::clone(&self.clock);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let time = renderer.current_position().unwrap_or_else(|| clock.current_time());
                let live = matches!(renderer.item_duration(), Some(MediaDuration::Indefinite));
                let sample = TimeSample { time, live };
                clock.set(sample);

                handler.on_tick(sample).await;
            }
        });

        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
        debug!("Time sync started ({:?} interval)", interval);
    }

    /// Stop sampling and reset the clock
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            debug!("Time sync stopped");
        }
        self.clock.reset();
    }
}

impl Drop for TimeSync {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}
