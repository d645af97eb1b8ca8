//! Media handles shared by the compositor, the transport and the registry.
//!
//! None of these types own a device or a socket.  A [`TrackHandle`] is just an
//! addressable name for a media flow, a [`MediaStream`] is a named bundle of
//! such handles, and the frame types carry plain RGBA pixels.

use std::fmt;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::surface::TextRun;

/// Width and height of a video surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` when both dimensions are strictly positive.
    pub fn is_visible(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Number of bytes an RGBA8 frame of this size occupies.
    pub fn rgba_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned rectangle in surface coordinates.
///
/// `x`/`y` may be negative; painting clips against the surface bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Playback status reported by a frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Media access was granted but playback has not started yet.
    Idle,
    /// Frames are flowing.
    Playing,
    /// Playback was paused; no new frames will arrive until resumed.
    Paused,
    /// The source reached its end and will never produce frames again.
    Ended,
}

impl PlaybackStatus {
    /// `true` for the two states that stop the draw loop for good.
    pub fn halts_compositing(self) -> bool {
        matches!(self, PlaybackStatus::Paused | PlaybackStatus::Ended)
    }
}

/// One decoded camera frame.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Monotonic frame counter assigned by the source.
    pub sequence: u64,
    /// RGBA8 pixels at the source's native resolution.
    pub image: RgbaImage,
}

impl VideoFrame {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }
}

/// One finished frame of the composited surface.
///
/// The pixel buffer holds everything that was painted: camera frame,
/// watermark, caption band and caption glyphs.  The [`TextRun`]s record
/// which caption the glyphs were drawn from.
#[derive(Debug, Clone)]
pub struct CompositedFrame {
    /// Tick counter of the compositor that produced this frame.
    pub sequence: u64,
    pub image: RgbaImage,
    pub text: Vec<TextRun>,
}

impl CompositedFrame {
    /// A blank frame used to seed capture streams before the first tick.
    pub fn blank(size: Resolution) -> Self {
        Self {
            sequence: 0,
            image: RgbaImage::new(size.width, size.height),
            text: Vec::new(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }

    /// `true` when both frames carry identical pixels and identical text.
    ///
    /// The sequence number is ignored.
    pub fn same_content(&self, other: &CompositedFrame) -> bool {
        self.image.dimensions() == other.image.dimensions()
            && self.image.as_raw() == other.image.as_raw()
            && self.text == other.text
    }
}

/// Media kind of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => f.write_str("audio"),
            TrackKind::Video => f.write_str("video"),
        }
    }
}

/// An independently addressable audio or video flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackHandle {
    pub id: String,
    pub kind: TrackKind,
    /// Human-readable label (device name, "canvas", ...).
    pub label: String,
}

impl TrackHandle {
    /// Creates a handle with a fresh random identifier.
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
        }
    }
}

/// A named bundle of tracks, the unit that gets attached to a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    pub id: String,
    pub tracks: Vec<TrackHandle>,
}

impl MediaStream {
    /// Creates a stream with a fresh random identifier.
    pub fn new(tracks: Vec<TrackHandle>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tracks,
        }
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &TrackHandle> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &TrackHandle> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video)
    }
}
