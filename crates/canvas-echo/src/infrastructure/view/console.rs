//! Console view: the session's output as `tracing` events.
//!
//! Notifications map to log levels (info/success → `info`, warning → `warn`,
//! alert → `error`), the layer controls print as one line per group with the
//! state of each button, and the link statistics are only printed when they
//! change, so a steady stream does not flood the terminal.

use canvas_core::{ButtonStyle, LayerControlGroup, LayerControls, Placeholder, RemoteTrack};
use tracing::{error, info, warn};

use crate::application::signaling::LinkStats;
use crate::application::view::{NoticeLevel, Notification, SessionView};

/// A [`SessionView`] writing to the log.
#[derive(Debug, Default)]
pub struct ConsoleView {
    last_stats: Option<LinkStats>,
    publishing: bool,
}

impl ConsoleView {
    pub fn new() -> Self {
        Self::default()
    }
}

/// `"SL 2 [active]  SL 1 [pending]  SL 0"`.
fn describe_group(group: &LayerControlGroup) -> String {
    group
        .buttons()
        .iter()
        .map(|button| match button.style {
            ButtonStyle::Idle => button.label.clone(),
            ButtonStyle::Pending => format!("{} [pending]", button.label),
            ButtonStyle::Active => format!("{} [active]", button.label),
        })
        .collect::<Vec<_>>()
        .join("  ")
}

impl SessionView for ConsoleView {
    fn notify(&mut self, notice: Notification) {
        let text = match &notice.title {
            Some(title) => format!("{title}: {}", notice.text),
            None => notice.text.clone(),
        };
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => info!("{text}"),
            NoticeLevel::Warning => warn!("{text}"),
            NoticeLevel::Alert => error!("{text}"),
        }
    }

    fn render_layer_controls(&mut self, controls: &LayerControls) {
        info!("substream:      {}", describe_group(&controls.spatial));
        if let Some(temporal) = &controls.temporal {
            info!("temporal layer: {}", describe_group(temporal));
        }
    }

    fn remove_layer_controls(&mut self) {
        info!("layer controls removed");
    }

    fn render_remote_media(&mut self, videos: &[RemoteTrack], placeholder: Option<Placeholder>) {
        if let Some(placeholder) = placeholder {
            info!("remote media: {placeholder}");
            return;
        }
        let mids: Vec<&str> = videos.iter().map(|t| t.mid.as_str()).collect();
        info!("remote media: {} video track(s) {:?}", videos.len(), mids);
    }

    fn set_media_controls(&mut self, enabled: bool, audio_on: bool, video_on: bool) {
        if enabled {
            info!(
                "media controls: audio {}, video {}",
                if audio_on { "on" } else { "off" },
                if video_on { "on" } else { "off" }
            );
        } else {
            info!("media controls disabled");
        }
    }

    fn render_stats(&mut self, stats: &LinkStats) {
        if self.last_stats.as_ref() == Some(stats) {
            return;
        }
        self.last_stats = Some(*stats);
        if stats.resolution.is_visible() {
            info!("{} at {}", stats.bitrate_text(), stats.resolution);
        } else {
            info!("{}", stats.bitrate_text());
        }
    }

    fn clear_stats(&mut self) {
        self.last_stats = None;
    }

    fn set_publishing(&mut self, publishing: bool) {
        if publishing && !self.publishing {
            info!("Publishing...");
        }
        self.publishing = publishing;
    }
}
