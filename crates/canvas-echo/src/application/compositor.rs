//! Compositor: the fixed-cadence draw loop.
//!
//! Every tick repaints the whole surface:
//!
//! ```text
//!  1. camera stopped?  ── yes ──▶ terminate for good
//!  2. camera frame      (stretched over the full surface)
//!  3. watermark         (pre-scaled, top right)
//!  4. caption band      (semi-transparent black)
//!     caption text      (latest caption state)
//!  5. next tick one period after *now*
//! ```
//!
//! The compositor does not own a task or a timer of its own.  It exposes the
//! deadline of its next tick and the session loop calls [`Compositor::tick`]
//! when that deadline passes.  Because the loop, the caption edits and the
//! event handlers all run on that same loop, a tick always sees a complete
//! caption and two ticks never overlap.
//!
//! # Capture
//!
//! Each finished frame is published on a `tokio::sync::watch` channel.  The
//! outbound stream handle wraps a receiver of that channel plus the camera's
//! microphone track; it is created exactly once per compositor.

use std::sync::Arc;

use canvas_core::{
    CaptionState, CompositedFrame, MediaStream, OverlayAsset, PlaybackStatus, Rect, Resolution,
    Surface, TrackHandle, TrackKind,
};
use image::Rgba;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::frame_timer::RepeatingTimer;
use crate::infrastructure::capture::FrameSource;

/// Error type for the compositor.
#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("frame rate must be positive")]
    InvalidFrameRate,
    #[error("surface size {0} has no pixels")]
    EmptySurface(Resolution),
    #[error("the outbound stream was already captured")]
    StreamAlreadyCaptured,
    #[error("the draw loop has not started yet")]
    NotStarted,
    #[error("the camera ended before it started playing")]
    SourceEnded,
    #[error("the camera went away before it started playing")]
    SourceGone,
}

/// Fixed parameters of the draw loop.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorSettings {
    pub fps: u32,
    /// Surface size; camera frames are stretched to it.
    pub size: Resolution,
    /// The semi-transparent band behind the caption.
    pub band: Rect,
    pub band_color: Rgba<u8>,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self {
            fps: 15,
            size: Resolution::new(640, 480),
            band: Rect::new(0, 420, 640, 480),
            band_color: Rgba([0, 0, 0, 128]),
        }
    }
}

/// Lifecycle of the draw loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Built, waiting for `start`.
    Waiting,
    Running,
    /// Stopped for good.
    Terminated,
}

/// What a call to [`Compositor::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Painted,
    /// The camera is paused or ended; the loop stopped on this tick.
    Terminated,
    /// The loop is not running; nothing happened.
    Skipped,
}

/// The captured composited video plus the camera's original audio.
#[derive(Debug, Clone)]
pub struct OutboundStream {
    pub stream: MediaStream,
    /// Every frame the compositor finishes, latest value wins.
    pub video: watch::Receiver<Arc<CompositedFrame>>,
    pub audio: Option<TrackHandle>,
}

impl OutboundStream {
    pub fn video_track(&self) -> Option<&TrackHandle> {
        self.stream.video_tracks().next()
    }
}

/// The draw loop state.
pub struct Compositor {
    source: Arc<dyn FrameSource>,
    overlay: OverlayAsset,
    surface: Surface,
    band: Rect,
    band_color: Rgba<u8>,
    timer: RepeatingTimer,
    state: LoopState,
    output: watch::Sender<Arc<CompositedFrame>>,
    ticks: u64,
    captured: bool,
}

impl Compositor {
    /// Builds the surface.  The loop does not run until [`Compositor::start`].
    pub fn new(
        source: Arc<dyn FrameSource>,
        overlay: OverlayAsset,
        settings: &CompositorSettings,
    ) -> Result<Self, CompositorError> {
        if settings.fps == 0 {
            return Err(CompositorError::InvalidFrameRate);
        }
        if !settings.size.is_visible() {
            return Err(CompositorError::EmptySurface(settings.size));
        }
        let (output, _) = watch::channel(Arc::new(CompositedFrame::blank(settings.size)));
        Ok(Self {
            source,
            overlay,
            surface: Surface::new(settings.size),
            band: settings.band,
            band_color: settings.band_color,
            timer: RepeatingTimer::from_fps(settings.fps),
            state: LoopState::Waiting,
            output,
            ticks: 0,
            captured: false,
        })
    }

    /// Starts the loop: paints the first frame right away and schedules the
    /// next one.
    ///
    /// The caller must have waited for the camera to play (see
    /// [`wait_until_playing`]).
    pub fn start(&mut self, caption: &CaptionState) -> TickOutcome {
        if self.state != LoopState::Waiting {
            warn!("draw loop start ignored in state {:?}", self.state);
            return TickOutcome::Skipped;
        }
        self.state = LoopState::Running;
        info!(
            "draw loop started ({} at {:?} per frame)",
            self.surface.resolution(),
            self.timer.period()
        );
        self.tick(caption)
    }

    /// Runs one composite-and-schedule cycle.
    pub fn tick(&mut self, caption: &CaptionState) -> TickOutcome {
        if self.state != LoopState::Running {
            return TickOutcome::Skipped;
        }

        let status = self.source.status();
        if status.halts_compositing() {
            self.state = LoopState::Terminated;
            self.timer.stop();
            info!("draw loop terminated: camera {:?} after {} frames", status, self.ticks);
            return TickOutcome::Terminated;
        }

        self.paint(caption);
        self.ticks += 1;
        self.output
            .send_replace(Arc::new(self.surface.snapshot(self.ticks)));
        self.timer.rearm_from(Instant::now());
        trace!("frame {} composited", self.ticks);
        TickOutcome::Painted
    }

    fn paint(&mut self, caption: &CaptionState) {
        self.surface.begin_frame();
        match self.source.current_frame() {
            Some(frame) => self.surface.draw_frame(&frame.image),
            None => debug!("no camera frame yet, painting over a black frame"),
        }
        self.surface.draw_overlay(&self.overlay);
        self.surface.fill_rect(self.band, self.band_color);
        self.surface.fill_text(caption);
    }

    /// Captures the surface as the outbound stream.  Allowed exactly once,
    /// after the loop has started.
    pub fn capture_stream(&mut self) -> Result<OutboundStream, CompositorError> {
        if self.state == LoopState::Waiting {
            return Err(CompositorError::NotStarted);
        }
        if self.captured {
            return Err(CompositorError::StreamAlreadyCaptured);
        }
        self.captured = true;

        let video = TrackHandle::new(TrackKind::Video, "canvas");
        let audio = self.source.audio_track();
        let mut tracks = vec![video];
        tracks.extend(audio.clone());
        let stream = MediaStream::new(tracks);
        debug!("outbound stream {} captured", stream.id);

        Ok(OutboundStream {
            stream,
            video: self.output.subscribe(),
            audio,
        })
    }

    /// Stops the loop as part of tearing the session down.
    pub fn shutdown(&mut self) {
        if self.state != LoopState::Terminated {
            self.state = LoopState::Terminated;
            self.timer.stop();
            info!("draw loop stopped with the session after {} frames", self.ticks);
        }
    }

    /// When the next tick is due, `None` when the loop is not running.
    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Number of frames painted so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn latest_frame(&self) -> Arc<CompositedFrame> {
        Arc::clone(&self.output.borrow())
    }
}

/// Waits until `source` reports it is playing.
///
/// There is no timeout: a camera that never plays keeps this pending.
///
/// # Errors
///
/// Returns [`CompositorError::SourceEnded`] when the camera ends before ever
/// playing, and [`CompositorError::SourceGone`] when it is dropped.
pub async fn wait_until_playing(source: &dyn FrameSource) -> Result<(), CompositorError> {
    let mut status = source.subscribe_status();
    let reached = status
        .wait_for(|s| matches!(s, PlaybackStatus::Playing | PlaybackStatus::Ended))
        .await
        .map(|s| *s)
        .map_err(|_| CompositorError::SourceGone)?;
    match reached {
        PlaybackStatus::Playing => Ok(()),
        _ => Err(CompositorError::SourceEnded),
    }
}
