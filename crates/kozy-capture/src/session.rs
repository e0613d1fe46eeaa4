//! Capture session state machine
//!
//! A session moves Idle → Starting → Streaming on a successful start, stays
//! in Streaming across ticks (dropping frames on failure), and returns to
//! Idle through Stopping. While Streaming it always owns both a pipeline
//! and an armed tick; outside a transition it owns neither.

use kozy_core::{CameraDriver, Channel, DeviceError, DisplayImage, Pipeline, StreamConfig};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::convert::{convert_frame, DEFAULT_MAX_DEPTH_MM};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Streaming,
    Stopping,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Start while Streaming is rejected; the running stream is untouched
    #[error("Stream already running at {0}")]
    AlreadyStreaming(StreamConfig),
    #[error("Camera driver not available")]
    DriverMissing,
    #[error("Failed to start stream: {0}")]
    Open(#[source] DeviceError),
}

/// Arms recurring ticks for a session
pub trait TickScheduler: Send {
    /// Start firing ticks tagged with `generation` every `period`
    fn arm(&mut self, period: Duration, generation: u64) -> Box<dyn TickHandle>;
}

/// A recurring tick registration
pub trait TickHandle: Send {
    /// Stop the tick. No callback fires after this returns.
    fn disarm(&mut self);
}

/// Receives converted images, one slot per channel
pub trait FrameSink {
    fn present(&mut self, channel: Channel, image: DisplayImage);
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Stale generation or not streaming; nothing was touched
    Discarded,
    /// Acquisition failed; the session keeps streaming
    Dropped,
    /// Which channels produced an image this tick
    Delivered { color: bool, depth: bool },
}

/// Counters for the current (or last) session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub color_frames: u64,
    pub depth_frames: u64,
    /// Frames present in a set but rejected by conversion
    pub dropped_frames: u64,
    /// Ticks whose acquisition failed outright
    pub dropped_ticks: u64,
}

impl SessionStats {
    pub fn frames(&self, channel: Channel) -> u64 {
        match channel {
            Channel::Color => self.color_frames,
            Channel::Depth => self.depth_frames,
        }
    }
}

pub struct CaptureSession {
    driver: Option<Arc<dyn CameraDriver>>,
    scheduler: Box<dyn TickScheduler>,
    max_depth_mm: u16,
    state: SessionState,
    pipeline: Option<Box<dyn Pipeline>>,
    tick: Option<Box<dyn TickHandle>>,
    config: Option<StreamConfig>,
    generation: u64,
    stats: SessionStats,
}

impl CaptureSession {
    pub fn new(driver: Option<Arc<dyn CameraDriver>>, scheduler: Box<dyn TickScheduler>) -> Self {
        Self {
            driver,
            scheduler,
            max_depth_mm: DEFAULT_MAX_DEPTH_MM,
            state: SessionState::Idle,
            pipeline: None,
            tick: None,
            config: None,
            generation: 0,
            stats: SessionStats::default(),
        }
    }

    pub fn with_max_depth_mm(mut self, max_depth_mm: u16) -> Self {
        self.max_depth_mm = max_depth_mm;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Streaming
    }

    /// Active configuration while streaming
    pub fn config(&self) -> Option<StreamConfig> {
        self.config
    }

    /// Generation of the most recently started session
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn driver(&self) -> Option<&dyn CameraDriver> {
        self.driver.as_deref()
    }

    /// Open the pipeline and arm the tick. Returns the tick period.
    ///
    /// On failure the session stays Idle and retains nothing.
    pub fn start(&mut self, config: StreamConfig) -> Result<Duration, SessionError> {
        if let Some(active) = self.config.filter(|_| self.is_streaming()) {
            warn!(active = %active, requested = %config, "Stream already running");
            return Err(SessionError::AlreadyStreaming(active));
        }
        let Some(driver) = self.driver.clone() else {
            error!("Cannot start: camera driver not available");
            return Err(SessionError::DriverMissing);
        };

        self.state = SessionState::Starting;
        let pipeline = match driver.open_pipeline(&config.color_spec(), &config.depth_spec()) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                self.state = SessionState::Idle;
                error!(error = %e, "Failed to start stream");
                return Err(SessionError::Open(e));
            }
        };

        let period = config.tick_period();
        self.generation += 1;
        self.pipeline = Some(pipeline);
        self.tick = Some(self.scheduler.arm(period, self.generation));
        self.config = Some(config);
        self.stats = SessionStats::default();
        self.state = SessionState::Streaming;

        info!(
            width = config.width,
            height = config.height,
            fps = config.fps,
            period_ms = period.as_millis() as u64,
            "Stream started"
        );
        Ok(period)
    }

    /// Acquire one frame set and push converted images into `sink`
    pub fn tick(&mut self, generation: u64, sink: &mut dyn FrameSink) -> TickOutcome {
        if generation != self.generation || self.state != SessionState::Streaming {
            debug!(generation, current = self.generation, "Discarding stale tick");
            return TickOutcome::Discarded;
        }
        let Some(pipeline) = self.pipeline.as_mut() else {
            return TickOutcome::Discarded;
        };

        let frames = match pipeline.wait_for_frames() {
            Ok(frames) => frames,
            Err(e) => {
                error!(error = %e, "Frame error");
                self.stats.dropped_ticks += 1;
                return TickOutcome::Dropped;
            }
        };

        let mut delivered = [false; 2];
        for (slot, frame) in [frames.color, frames.depth].into_iter().enumerate() {
            let Some(frame) = frame else { continue };
            match convert_frame(&frame, self.max_depth_mm) {
                Ok(image) => {
                    match frame.channel {
                        Channel::Color => self.stats.color_frames += 1,
                        Channel::Depth => self.stats.depth_frames += 1,
                    }
                    sink.present(frame.channel, image);
                    delivered[slot] = true;
                }
                Err(e) => {
                    error!(error = %e, "Frame error");
                    self.stats.dropped_frames += 1;
                }
            }
        }

        TickOutcome::Delivered {
            color: delivered[0],
            depth: delivered[1],
        }
    }

    /// Disarm the tick, close the pipeline, and return to Idle.
    ///
    /// Returns false when there was nothing to tear down. A failing close is
    /// logged and the handle discarded anyway.
    pub fn stop(&mut self) -> bool {
        if self.state == SessionState::Idle && self.pipeline.is_none() && self.tick.is_none() {
            return false;
        }

        self.state = SessionState::Stopping;
        if let Some(mut tick) = self.tick.take() {
            tick.disarm();
        }
        if let Some(mut pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.close() {
                warn!(error = %e, "Pipeline close failed, discarding handle");
            }
        }
        self.config = None;
        self.state = SessionState::Idle;

        info!(
            color_frames = self.stats.color_frames,
            depth_frames = self.stats.depth_frames,
            dropped = self.stats.dropped_ticks + self.stats.dropped_frames,
            "Stream stopped"
        );
        true
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}
