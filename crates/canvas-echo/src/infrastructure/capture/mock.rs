//! Mock capture device for unit testing.
//!
//! Allows tests to set the camera frame and playback status by hand, without
//! any background task producing frames.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use canvas_core::{PlaybackStatus, Resolution, TrackHandle, TrackKind, VideoFrame};
use image::RgbaImage;
use tokio::sync::watch;

use super::{CaptureConstraints, CaptureDevice, CaptureError, FrameSource};

/// A frame source whose frame and status are set by the test.
pub struct MockFrameSource {
    status: watch::Sender<PlaybackStatus>,
    frame: Mutex<Option<VideoFrame>>,
    resolution: Resolution,
    audio: Option<TrackHandle>,
}

impl MockFrameSource {
    /// Creates an idle source with a microphone track and no frame yet.
    pub fn new(resolution: Resolution) -> Self {
        let (status, _) = watch::channel(PlaybackStatus::Idle);
        Self {
            status,
            frame: Mutex::new(None),
            resolution,
            audio: Some(TrackHandle::new(TrackKind::Audio, "mock microphone")),
        }
    }

    /// Replaces the current frame, bumping the sequence number.
    pub fn set_frame(&self, image: RgbaImage) {
        let mut guard = self.frame.lock().unwrap_or_else(PoisonError::into_inner);
        let sequence = guard.as_ref().map_or(1, |f| f.sequence + 1);
        *guard = Some(VideoFrame { sequence, image });
    }

    pub fn set_status(&self, status: PlaybackStatus) {
        self.status.send_replace(status);
    }
}

impl FrameSource for MockFrameSource {
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

/// A capture device that hands out a prepared [`MockFrameSource`], or fails.
pub struct MockCaptureDevice {
    source: Option<Arc<MockFrameSource>>,
}

impl MockCaptureDevice {
    pub fn new(source: Arc<MockFrameSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// A device that reports no camera.
    pub fn unavailable() -> Self {
        Self { source: None }
    }
}

#[async_trait]
impl CaptureDevice for MockCaptureDevice {
    async fn open(
        &self,
        _constraints: &CaptureConstraints,
    ) -> Result<Arc<dyn FrameSource>, CaptureError> {
        match &self.source {
            Some(source) => Ok(Arc::clone(source) as Arc<dyn FrameSource>),
            None => Err(CaptureError::NoDevice("mock device unavailable".to_string())),
        }
    }
}
