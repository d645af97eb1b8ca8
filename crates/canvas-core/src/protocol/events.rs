//! Events the transport reports about the session.
//!
//! A transport turns whatever happens on the wire and on the peer connection
//! into a stream of [`TransportEvent`]s.  The session loop consumes them one
//! at a time, in order.

use super::messages::{Jsep, PluginEvent};
use crate::domain::media::{TrackHandle, TrackKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A plugin message, optionally with a remote session description.
    Message {
        event: PluginEvent,
        jsep: Option<Jsep>,
    },
    /// A remote track was added (`on == true`) or removed.
    RemoteTrack {
        track: TrackHandle,
        mid: String,
        on: bool,
    },
    /// A local track started (`on == true`) or stopped being sent.
    LocalTrack { track: TrackHandle, on: bool },
    /// The transport detected packet loss on one direction of a flow.
    SlowLink {
        uplink: bool,
        lost: u32,
        mid: Option<String>,
    },
    /// ICE connection state change (`"checking"`, `"connected"`, ...).
    IceState(String),
    /// The peer connection came up (`true`) or went down.
    WebrtcState(bool),
    /// The remote side started or stopped receiving a medium.
    MediaState {
        medium: TrackKind,
        on: bool,
        mid: Option<String>,
    },
    /// The peer connection was torn down.
    Cleanup,
}

impl TransportEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::Message { .. } => "message",
            TransportEvent::RemoteTrack { .. } => "remote_track",
            TransportEvent::LocalTrack { .. } => "local_track",
            TransportEvent::SlowLink { .. } => "slow_link",
            TransportEvent::IceState(_) => "ice_state",
            TransportEvent::WebrtcState(_) => "webrtc_state",
            TransportEvent::MediaState { .. } => "media_state",
            TransportEvent::Cleanup => "cleanup",
        }
    }
}
