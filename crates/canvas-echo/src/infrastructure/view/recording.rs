//! Recording view for tests.
//!
//! Every call is appended to a shared log.  Clones share the log, so a test
//! keeps one clone and hands the other to the session.

use std::sync::{Arc, Mutex, PoisonError};

use canvas_core::{LayerControls, Placeholder, RemoteTrack};

use crate::application::signaling::LinkStats;
use crate::application::view::{Notification, SessionView};

/// One call made on a [`RecordingView`].
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    Notify(Notification),
    RenderLayerControls(LayerControls),
    RemoveLayerControls,
    RenderRemoteMedia {
        mids: Vec<String>,
        placeholder: Option<Placeholder>,
    },
    SetMediaControls {
        enabled: bool,
        audio_on: bool,
        video_on: bool,
    },
    RenderStats(LinkStats),
    ClearStats,
    SetPublishing(bool),
}

/// A [`SessionView`] that records calls.
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
    calls: Arc<Mutex<Vec<ViewCall>>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ViewCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Notifications only, in order.
    pub fn notifications(&self) -> Vec<Notification> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ViewCall::Notify(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    /// The last layer controls rendered, if any.
    pub fn last_controls(&self) -> Option<LayerControls> {
        self.calls().into_iter().rev().find_map(|call| match call {
            ViewCall::RenderLayerControls(controls) => Some(controls),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, call: ViewCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl SessionView for RecordingView {
    fn notify(&mut self, notice: Notification) {
        self.record(ViewCall::Notify(notice));
    }

    fn render_layer_controls(&mut self, controls: &LayerControls) {
        self.record(ViewCall::RenderLayerControls(controls.clone()));
    }

    fn remove_layer_controls(&mut self) {
        self.record(ViewCall::RemoveLayerControls);
    }

    fn render_remote_media(&mut self, videos: &[RemoteTrack], placeholder: Option<Placeholder>) {
        self.record(ViewCall::RenderRemoteMedia {
            mids: videos.iter().map(|t| t.mid.clone()).collect(),
            placeholder,
        });
    }

    fn set_media_controls(&mut self, enabled: bool, audio_on: bool, video_on: bool) {
        self.record(ViewCall::SetMediaControls {
            enabled,
            audio_on,
            video_on,
        });
    }

    fn render_stats(&mut self, stats: &LinkStats) {
        self.record(ViewCall::RenderStats(*stats));
    }

    fn clear_stats(&mut self) {
        self.record(ViewCall::ClearStats);
    }

    fn set_publishing(&mut self, publishing: bool) {
        self.record(ViewCall::SetPublishing(publishing));
    }
}
