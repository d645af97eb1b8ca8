//! Capture infrastructure: where camera frames come from.
//!
//! A [`CaptureDevice`] is asked once, asynchronously, for an audio+video
//! source.  What it hands back is a [`FrameSource`]: a shared, read-only view
//! of a live camera that reports its playback status, its native resolution
//! and the most recent frame it decoded.
//!
//! # Testability
//!
//! The compositor only ever talks to the traits.  [`synthetic::SyntheticCamera`]
//! produces a moving test pattern in real time, and [`mock::MockFrameSource`]
//! lets tests set the frame and the status by hand.

use std::sync::Arc;

use async_trait::async_trait;
use canvas_core::{PlaybackStatus, Resolution, TrackHandle, VideoFrame};
use thiserror::Error;
use tokio::sync::watch;

pub mod mock;
pub mod synthetic;

/// Error type for capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no camera available: {0}")]
    NoDevice(String),
    #[error("access to the camera was denied")]
    PermissionDenied,
    #[error("capture constraints cannot be satisfied: {0}")]
    Unsatisfiable(String),
}

/// What the caller would like the camera to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    /// Also capture the microphone.
    pub audio: bool,
    /// Preferred frame size; the device may pick something else.
    pub ideal: Resolution,
    /// Preferred frame rate.
    pub fps: u32,
}

/// A live camera as seen by the compositor.
///
/// The compositor holds a shared, non-owning handle (`Arc<dyn FrameSource>`);
/// the device keeps producing frames on its own schedule.
pub trait FrameSource: Send + Sync {
    fn status(&self) -> PlaybackStatus;

    /// Receiver that observes every status change.
    fn subscribe_status(&self) -> watch::Receiver<PlaybackStatus>;

    /// The most recently decoded frame, `None` before the first one.
    fn current_frame(&self) -> Option<VideoFrame>;

    fn native_resolution(&self) -> Resolution;

    /// The microphone track captured alongside the video, if any.
    fn audio_track(&self) -> Option<TrackHandle>;
}

/// Something that can be asked for a camera.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Opens the camera (and microphone when requested).
    async fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Arc<dyn FrameSource>, CaptureError>;
}
