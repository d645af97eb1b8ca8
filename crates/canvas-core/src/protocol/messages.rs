//! JSON bodies exchanged with the echo-test plugin.
//!
//! Requests are sparse objects: every field is optional and only the fields
//! that are set go on the wire, so `{"substream": 2}` and
//! `{"audio": true, "video": true, "videocodec": "vp8"}` are both a
//! [`PluginRequest`].  Events coming back are equally sparse and are read
//! into [`PluginEvent`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of every session's opaque identifier.
pub const OPAQUE_ID_PREFIX: &str = "canvas-";

/// Result string the plugin sends when the echo test has finished.
pub const RESULT_DONE: &str = "done";

/// Status the plugin reports when the uplink is losing packets.
pub const STATUS_SLOW_LINK: &str = "slow_link";

/// Builds a fresh opaque id: `canvas-` followed by 12 random characters.
pub fn opaque_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{OPAQUE_ID_PREFIX}{}", &random[..12])
}

// ── Codec preferences ─────────────────────────────────────────────────────────

/// Optional codec overrides.  `None` lets the remote side choose.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecPreferences {
    pub audio_codec: Option<String>,
    pub video_codec: Option<String>,
    pub video_profile: Option<String>,
}

impl CodecPreferences {
    /// Builds preferences from raw values, treating empty strings as absent.
    pub fn new(
        audio_codec: Option<String>,
        video_codec: Option<String>,
        video_profile: Option<String>,
    ) -> Self {
        fn present(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }
        Self {
            audio_codec: present(audio_codec),
            video_codec: present(video_codec),
            video_profile: present(video_profile),
        }
    }
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// A message body sent to the plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audiocodec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub videocodec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub videoprofile: Option<String>,
    /// Bitrate cap in bits per second; `0` removes the cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substream: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<u8>,
}

impl PluginRequest {
    /// The negotiation body: audio and video on, plus any codec overrides.
    pub fn negotiation(prefs: &CodecPreferences) -> Self {
        Self {
            audio: Some(true),
            video: Some(true),
            audiocodec: prefs.audio_codec.clone(),
            videocodec: prefs.video_codec.clone(),
            videoprofile: prefs.video_profile.clone(),
            ..Self::default()
        }
    }

    pub fn substream(value: u8) -> Self {
        Self {
            substream: Some(value),
            ..Self::default()
        }
    }

    pub fn temporal(value: u8) -> Self {
        Self {
            temporal: Some(value),
            ..Self::default()
        }
    }

    pub fn audio_enabled(enabled: bool) -> Self {
        Self {
            audio: Some(enabled),
            ..Self::default()
        }
    }

    pub fn video_enabled(enabled: bool) -> Self {
        Self {
            video: Some(enabled),
            ..Self::default()
        }
    }

    /// Caps the echoed bitrate at `kbps` kilobits per second (`0` = no cap).
    pub fn bitrate_cap(kbps: u64) -> Self {
        Self {
            bitrate: Some(kbps.saturating_mul(1000)),
            ..Self::default()
        }
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

/// The `result` member of a plugin event: either a bare string such as
/// `"ok"`/`"done"` or an object carrying a `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventResult {
    Text(String),
    Report {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
}

impl EventResult {
    pub fn is_done(&self) -> bool {
        matches!(self, EventResult::Text(text) if text == RESULT_DONE)
    }

    pub fn status(&self) -> Option<&str> {
        match self {
            EventResult::Report { status } => status.as_deref(),
            EventResult::Text(_) => None,
        }
    }

    pub fn is_slow_link(&self) -> bool {
        self.status() == Some(STATUS_SLOW_LINK)
    }
}

/// A message body received from the plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echotest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<EventResult>,
    /// Substream now in effect, when the event reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substream: Option<u8>,
    /// Temporal layer now in effect, when the event reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<u8>,
    /// Negotiated video codec, sent along with layer reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub videocodec: Option<String>,
}

impl PluginEvent {
    /// `true` when the event carries a substream or temporal value.
    pub fn has_layer_info(&self) -> bool {
        self.substream.is_some() || self.temporal.is_some()
    }
}

// ── Session descriptions ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// A session description, forwarded between the plugin and the peer
/// connection without interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jsep {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl Jsep {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}
