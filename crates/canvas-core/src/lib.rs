//! # canvas-core
//!
//! Shared library for the canvas echo publisher containing the domain
//! entities, the surface painting primitives and the plugin message types.
//!
//! The crate has zero dependencies on capture devices, network transports, UI
//! toolkits or async runtimes.  Everything in here can be unit-tested on any
//! machine without a camera or a media server.
//!
//! # Architecture overview (for beginners)
//!
//! The publisher takes a live camera feed, paints it onto an off-screen
//! surface together with a watermark and a caption, and sends the result to
//! an echo-test media server.  The server sends the media back, and may offer
//! the returned video in several *layers* (simulcast qualities and frame-rate
//! tiers) the viewer can switch between.
//!
//! This crate (`canvas-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – Pure state and painting logic: the caption, the overlay
//!   placement, the composited [`Surface`], the per-kind layer selection state
//!   machine, the layer control buttons and the remote track registry.
//!
//! - **`protocol`** – The JSON bodies exchanged with the echo-test plugin and
//!   the [`TransportEvent`] enum through which the transport reports what
//!   happened on the peer connection.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `canvas_core::CaptionState` instead of `canvas_core::domain::caption::CaptionState`.
pub use domain::caption::{CaptionEdit, CaptionError, CaptionState, Color, FontSpec};
pub use domain::controls::{ButtonStyle, LayerButton, LayerControlGroup, LayerControls};
pub use domain::layers::{Confirmation, LayerKind, LayerPhase, LayerSelection, LayerState};
pub use domain::media::{
    CompositedFrame, MediaStream, PlaybackStatus, Rect, Resolution, TrackHandle, TrackKind,
    VideoFrame,
};
pub use domain::overlay::{OverlayAsset, OverlayPlacement, PlacementError};
pub use domain::surface::{Surface, TextRun};
pub use domain::text::GlyphPainter;
pub use domain::tracks::{Placeholder, PresenceUpdate, RemoteTrack, RemoteTrackRegistry};
pub use protocol::events::TransportEvent;
pub use protocol::messages::{CodecPreferences, EventResult, Jsep, PluginEvent, PluginRequest, SdpType};
