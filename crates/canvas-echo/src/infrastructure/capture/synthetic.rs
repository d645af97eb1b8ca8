//! Synthetic camera producing a deterministic moving test pattern.
//!
//! Stands in for a physical webcam.  Once opened, a background task renders
//! a new frame at the requested frame rate for as long as the source is
//! playing.  The task holds only a weak reference to the source, so it winds
//! down by itself when the last handle is dropped or when the source ends.
//!
//! Frames are a pure function of their sequence number, which keeps tests
//! reproducible.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use canvas_core::{PlaybackStatus, Resolution, TrackHandle, TrackKind, VideoFrame};
use image::{Rgba, RgbaImage};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::{CaptureConstraints, CaptureDevice, CaptureError, FrameSource};

/// Side length of the bouncing square, in pixels.
const SQUARE: u32 = 48;

/// Renders test-pattern frame number `sequence` at `size`.
pub fn test_pattern(size: Resolution, sequence: u64) -> RgbaImage {
    let shift = (sequence % 256) as u32;
    let span_x = size.width.saturating_sub(SQUARE).max(1);
    let span_y = size.height.saturating_sub(SQUARE).max(1);
    let square_x = bounce(sequence * 7, span_x);
    let square_y = bounce(sequence * 5, span_y);

    RgbaImage::from_fn(size.width, size.height, |x, y| {
        let inside = (square_x..square_x + SQUARE).contains(&x)
            && (square_y..square_y + SQUARE).contains(&y);
        if inside {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([
                ((x + shift * 4) % 256) as u8,
                ((y + shift * 2) % 256) as u8,
                128,
                255,
            ])
        }
    })
}

/// Position bouncing between `0` and `span` as `step` grows.
fn bounce(step: u64, span: u32) -> u32 {
    let span = u64::from(span);
    let phase = step % (2 * span);
    (if phase < span { phase } else { 2 * span - phase }) as u32
}

/// A running synthetic camera.
pub struct SyntheticSource {
    status: watch::Sender<PlaybackStatus>,
    frame: Mutex<Option<VideoFrame>>,
    resolution: Resolution,
    audio: Option<TrackHandle>,
}

impl SyntheticSource {
    fn new(resolution: Resolution, with_audio: bool) -> Self {
        let (status, _) = watch::channel(PlaybackStatus::Idle);
        Self {
            status,
            frame: Mutex::new(None),
            resolution,
            audio: with_audio.then(|| TrackHandle::new(TrackKind::Audio, "synthetic microphone")),
        }
    }

    fn produce_frame(&self) {
        let mut guard = self.frame.lock().unwrap_or_else(PoisonError::into_inner);
        let sequence = guard.as_ref().map_or(0, |f| f.sequence + 1);
        *guard = Some(VideoFrame {
            sequence,
            image: test_pattern(self.resolution, sequence),
        });
    }

    /// Starts (or resumes) playback.  Has no effect once ended.
    pub fn play(&self) {
        self.status.send_if_modified(|status| {
            let resume = *status != PlaybackStatus::Ended && *status != PlaybackStatus::Playing;
            if resume {
                *status = PlaybackStatus::Playing;
            }
            resume
        });
    }

    pub fn pause(&self) {
        self.status.send_if_modified(|status| {
            let pause = *status == PlaybackStatus::Playing;
            if pause {
                *status = PlaybackStatus::Paused;
            }
            pause
        });
    }

    /// Ends playback for good.
    pub fn end(&self) {
        self.status.send_replace(PlaybackStatus::Ended);
    }
}

impl FrameSource for SyntheticSource {
    fn status(&self) -> PlaybackStatus {
        *self.status.borrow()
    }

    fn subscribe_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.subscribe()
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn native_resolution(&self) -> Resolution {
        self.resolution
    }

    fn audio_track(&self) -> Option<TrackHandle> {
        self.audio.clone()
    }
}

/// Capture device backed by [`SyntheticSource`].
#[derive(Default)]
pub struct SyntheticCamera {
    opened: Mutex<Option<Arc<SyntheticSource>>>,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// The source handed out by the last successful [`CaptureDevice::open`].
    pub fn source(&self) -> Option<Arc<SyntheticSource>> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CaptureDevice for SyntheticCamera {
    async fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Arc<dyn FrameSource>, CaptureError> {
        if !constraints.ideal.is_visible() || constraints.fps == 0 {
            return Err(CaptureError::Unsatisfiable(format!(
                "{} at {} fps",
                constraints.ideal, constraints.fps
            )));
        }

        let source = Arc::new(SyntheticSource::new(constraints.ideal, constraints.audio));
        let period = Duration::from_secs(1) / constraints.fps;
        tokio::spawn(pump(Arc::downgrade(&source), period));
        info!(
            "synthetic camera opened at {} / {} fps",
            constraints.ideal, constraints.fps
        );

        *self.opened.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&source));
        Ok(source as Arc<dyn FrameSource>)
    }
}

/// Produces one frame per period while playing.  The first frame is rendered
/// before playback is reported, as a real camera would.
async fn pump(source: Weak<SyntheticSource>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut started = false;

    loop {
        ticker.tick().await;
        let Some(source) = source.upgrade() else {
            break;
        };
        if !started {
            source.produce_frame();
            source.play();
            started = true;
            continue;
        }
        match source.status() {
            PlaybackStatus::Playing => source.produce_frame(),
            PlaybackStatus::Ended => break,
            PlaybackStatus::Idle | PlaybackStatus::Paused => {}
        }
    }
    debug!("synthetic camera pump stopped");
}
