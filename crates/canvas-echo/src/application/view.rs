//! The view port: everything the session shows to the user.
//!
//! The session never formats output itself.  It tells a [`SessionView`] what
//! changed (a notification, the layer controls, the remote media area, the
//! media controls, the link statistics) and the view decides how to present
//! it: log lines on a console, widgets in a GUI, or a list of calls in a
//! test.

use canvas_core::{LayerControls, Placeholder, RemoteTrack};

use super::signaling::LinkStats;

/// How loud a notification is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    /// Blocking: the user must acknowledge it.
    Alert,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NoticeLevel,
    pub title: Option<String>,
    pub text: String,
}

impl Notification {
    pub fn info(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, text)
    }

    pub fn warning(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::new(NoticeLevel::Warning, text)
        }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Alert, text)
    }

    fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            title: None,
            text: text.into(),
        }
    }
}

/// Presentation surface of a session.
#[cfg_attr(test, mockall::automock)]
pub trait SessionView: Send {
    fn notify(&mut self, notice: Notification);

    /// Shows (or refreshes) the layer switch buttons.
    fn render_layer_controls(&mut self, controls: &LayerControls);

    fn remove_layer_controls(&mut self);

    /// Shows the remote video tracks, or the placeholder when there is one.
    fn render_remote_media(&mut self, videos: &[RemoteTrack], placeholder: Option<Placeholder>);

    /// Enables or disables the audio/video toggles and the bitrate cap.
    fn set_media_controls(&mut self, enabled: bool, audio_on: bool, video_on: bool);

    fn render_stats(&mut self, stats: &LinkStats);

    /// Hides the bitrate and resolution display.
    fn clear_stats(&mut self);

    /// Shows or hides the "Publishing..." indicator over the local video.
    fn set_publishing(&mut self, publishing: bool);
}
