//! TOML-based configuration for the publisher.
//!
//! Reads [`AppConfig`] from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\CanvasEcho\config.toml`
//! - Linux:    `~/.config/canvas-echo/config.toml`
//! - macOS:    `~/Library/Application Support/CanvasEcho/config.toml`
//!
//! or from any file given with `--config <path>`.
//!
//! # What the file looks like (for beginners)
//!
//! Every section and every field is optional.  An empty file, or no file at
//! all, reproduces the stock demo: a 640x480 surface at 15 fps, the caption
//! "Hi there!" in white 20pt Calibri at (15, 460), the watermark scaled to
//! 40 % in the top-right corner.
//!
//! ```toml
//! [compositor]
//! fps = 30
//!
//! [caption]
//! text = "Live from the lab"
//! color = "#ffcc00"
//!
//! [simulcast]
//! enabled = true
//! ```
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent, so older files keep working when
//! new fields are added.

use std::path::{Path, PathBuf};

use canvas_core::{
    CaptionError, CaptionState, CodecPreferences, Color, OverlayPlacement, PlacementError, Rect,
    Resolution,
};
use serde::Deserialize;
use thiserror::Error;

use crate::application::compositor::CompositorSettings;
use crate::application::session::SessionSettings;
use crate::infrastructure::capture::CaptureConstraints;
use crate::infrastructure::transport::echo::EchoSettings;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A caption or band value is not a valid color/font.
    #[error("invalid caption settings: {0}")]
    Caption(#[from] CaptionError),

    /// The overlay geometry is unusable.
    #[error("invalid overlay settings: {0}")]
    Overlay(#[from] PlacementError),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub compositor: CompositorConfig,
    #[serde(default)]
    pub caption: CaptionConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub band: BandConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub negotiation: NegotiationConfig,
    #[serde(default)]
    pub simulcast: SimulcastConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// The off-screen surface and its draw rate.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CompositorConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

/// Initial caption state.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CaptionConfig {
    #[serde(default = "default_caption_text")]
    pub text: String,
    /// Any CSS color (`"white"`, `"#fc0"`, `"rgba(255,0,0,0.5)"`).
    #[serde(default = "default_caption_color")]
    pub color: String,
    /// CSS font shorthand with a size (`"20pt Calibri"`).
    #[serde(default = "default_caption_font")]
    pub font: String,
    #[serde(default = "default_caption_x")]
    pub x: i32,
    #[serde(default = "default_caption_y")]
    pub y: i32,
}

/// Watermark file and placement.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OverlayConfig {
    #[serde(default = "default_overlay_path")]
    pub path: String,
    /// Width of the region taken from the top-left of the image.
    #[serde(default = "default_overlay_source_width")]
    pub source_width: u32,
    #[serde(default = "default_overlay_source_height")]
    pub source_height: u32,
    #[serde(default = "default_overlay_scale")]
    pub scale: f32,
    /// Distance from the top and right edges of the surface.
    #[serde(default = "default_overlay_margin")]
    pub margin: u32,
}

/// The band painted behind the caption, spanning the full surface width.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BandConfig {
    #[serde(default = "default_band_y")]
    pub y: i64,
    /// Clipped to the surface.
    #[serde(default = "default_band_height")]
    pub height: u32,
    #[serde(default = "default_band_color")]
    pub color: String,
}

/// What to ask the camera for.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CameraConfig {
    #[serde(default = "default_true")]
    pub audio: bool,
    #[serde(default = "default_width")]
    pub ideal_width: u32,
    #[serde(default = "default_height")]
    pub ideal_height: u32,
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
}

/// Codec preferences sent with the negotiation body.  Empty means "let the
/// server pick".
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NegotiationConfig {
    #[serde(default)]
    pub audio_codec: Option<String>,
    #[serde(default)]
    pub video_codec: Option<String>,
    #[serde(default)]
    pub video_profile: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SimulcastConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Temporal layers per substream (VP8 only).
    #[serde(default = "default_temporal_layers")]
    pub temporal_layers: u8,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StatsConfig {
    #[serde(default = "default_stats_interval_ms")]
    pub interval_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_fps() -> u32 {
    15
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_caption_text() -> String {
    "Hi there!".to_string()
}
fn default_caption_color() -> String {
    "white".to_string()
}
fn default_caption_font() -> String {
    "20pt Calibri".to_string()
}
fn default_caption_x() -> i32 {
    15
}
fn default_caption_y() -> i32 {
    460
}
fn default_overlay_path() -> String {
    "assets/watermark.png".to_string()
}
fn default_overlay_source_width() -> u32 {
    340
}
fn default_overlay_source_height() -> u32 {
    110
}
fn default_overlay_scale() -> f32 {
    0.4
}
fn default_overlay_margin() -> u32 {
    15
}
fn default_band_y() -> i64 {
    420
}
fn default_band_height() -> u32 {
    480
}
fn default_band_color() -> String {
    "rgba(0,0,0,0.5)".to_string()
}
fn default_true() -> bool {
    true
}
fn default_camera_fps() -> u32 {
    30
}
fn default_temporal_layers() -> u8 {
    3
}
fn default_stats_interval_ms() -> u64 {
    1000
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            text: default_caption_text(),
            color: default_caption_color(),
            font: default_caption_font(),
            x: default_caption_x(),
            y: default_caption_y(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            path: default_overlay_path(),
            source_width: default_overlay_source_width(),
            source_height: default_overlay_source_height(),
            scale: default_overlay_scale(),
            margin: default_overlay_margin(),
        }
    }
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            y: default_band_y(),
            height: default_band_height(),
            color: default_band_color(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            audio: default_true(),
            ideal_width: default_width(),
            ideal_height: default_height(),
            fps: default_camera_fps(),
        }
    }
}

impl Default for SimulcastConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            temporal_layers: default_temporal_layers(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_stats_interval_ms(),
        }
    }
}

// ── Conversions into runtime settings ─────────────────────────────────────────

impl AppConfig {
    /// Surface size configured for the compositor.
    pub fn surface_size(&self) -> Resolution {
        Resolution::new(self.compositor.width, self.compositor.height)
    }

    /// Draw loop settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Caption`] when the band color does not parse.
    pub fn compositor_settings(&self) -> Result<CompositorSettings, ConfigError> {
        let band_color = Color::parse(&self.band.color)?;
        Ok(CompositorSettings {
            fps: self.compositor.fps,
            size: self.surface_size(),
            band: Rect::new(0, self.band.y, self.compositor.width, self.band.height),
            band_color: band_color.rgba(),
        })
    }

    /// The caption the session starts with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Caption`] when the color or font does not parse.
    pub fn initial_caption(&self) -> Result<CaptionState, ConfigError> {
        let c = &self.caption;
        Ok(CaptionState::new(c.text.clone(), &c.color, &c.font, c.x, c.y)?)
    }

    /// Watermark placement in the top-right corner of the surface.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Overlay`] for a non-positive scale or an empty
    /// source region.
    pub fn overlay_placement(&self) -> Result<OverlayPlacement, ConfigError> {
        let o = &self.overlay;
        Ok(OverlayPlacement::top_right(
            self.surface_size(),
            o.source_width,
            o.source_height,
            o.scale,
            o.margin,
        )?)
    }

    pub fn capture_constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            audio: self.camera.audio,
            ideal: Resolution::new(self.camera.ideal_width, self.camera.ideal_height),
            fps: self.camera.fps,
        }
    }

    pub fn codec_preferences(&self) -> CodecPreferences {
        let n = &self.negotiation;
        CodecPreferences::new(
            n.audio_codec.clone(),
            n.video_codec.clone(),
            n.video_profile.clone(),
        )
    }

    pub fn echo_settings(&self) -> EchoSettings {
        EchoSettings {
            simulcast: self.simulcast.enabled,
            temporal_layers: self.simulcast.temporal_layers,
        }
    }

    pub fn stats_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.stats.interval_ms.max(1))
    }

    /// Everything a session needs, validated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Caption`] or [`ConfigError::Overlay`] for
    /// values that cannot be used.
    pub fn session_settings(&self) -> Result<SessionSettings, ConfigError> {
        Ok(SessionSettings {
            compositor: self.compositor_settings()?,
            capture: self.capture_constraints(),
            overlay_location: self.overlay.path.clone(),
            overlay_placement: self.overlay_placement()?,
            codecs: self.codec_preferences(),
            temporal_layers: self.simulcast.temporal_layers,
            stats_interval: self.stats_interval(),
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads [`AppConfig`] from the default location.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads [`AppConfig`] from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Resolves the platform config directory including the `CanvasEcho`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("CanvasEcho"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("canvas-echo"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("CanvasEcho")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
