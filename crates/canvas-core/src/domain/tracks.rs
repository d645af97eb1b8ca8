//! Registry of tracks received back from the remote side.
//!
//! The transport reports remote tracks one at a time, keyed by their
//! transport identifier (`mid`).  The registry keeps the live ones and
//! derives what the remote media area should show: the video tracks, or a
//! placeholder explaining why there is no video.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use super::media::{MediaStream, TrackHandle, TrackKind};

/// Why the remote media area shows no video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// Audio arrived but the remote side sends no video at all.
    NoWebcam,
    /// Every remote video track went away.
    NoRemoteVideo,
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placeholder::NoWebcam => f.write_str("No webcam available"),
            Placeholder::NoRemoteVideo => f.write_str("No remote video available"),
        }
    }
}

/// A remote track and the inbound stream wrapping it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub mid: String,
    pub kind: TrackKind,
    pub stream: MediaStream,
}

/// Presence information after a registry change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceUpdate {
    pub video_count: usize,
    /// Placeholder to show, `None` to hide it.
    pub placeholder: Option<Placeholder>,
    /// First remote track of the session.
    pub first_track: bool,
    /// First remote video track of the session.
    pub first_video: bool,
    /// `false` when the event was a no-op (unknown mid).
    pub changed: bool,
}

/// Live remote tracks keyed by `mid`.
#[derive(Debug, Default)]
pub struct RemoteTrackRegistry {
    tracks: HashMap<String, RemoteTrack>,
    placeholder: Option<Placeholder>,
    seen_track: bool,
    seen_video: bool,
}

impl RemoteTrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `track` under `mid`.
    ///
    /// Adding a mid that is already present replaces the entry, so a track
    /// announced twice is counted once.
    pub fn add(&mut self, mid: impl Into<String>, track: TrackHandle) -> PresenceUpdate {
        let mid = mid.into();
        let kind = track.kind;
        let replaced = self.tracks.insert(
            mid.clone(),
            RemoteTrack {
                mid: mid.clone(),
                kind,
                stream: MediaStream::new(vec![track]),
            },
        );
        if let Some(old) = replaced {
            debug!("remote mid {mid} re-announced, {:?} track replaced", old.kind);
        }

        // "First" means first since the registry was last cleared.  The
        // session clears it on echo done and on cleanup, so media controls
        // and the stats timer come back when remote media returns.
        let first_track = !self.seen_track;
        self.seen_track = true;
        let first_video = kind == TrackKind::Video && !self.seen_video;
        if kind == TrackKind::Video {
            self.seen_video = true;
        }

        let video_count = self.video_count();
        self.placeholder = if video_count > 0 {
            None
        } else if kind == TrackKind::Audio {
            Some(Placeholder::NoWebcam)
        } else {
            self.placeholder
        };

        PresenceUpdate {
            video_count,
            placeholder: self.placeholder,
            first_track,
            first_video,
            changed: true,
        }
    }

    /// Removes the track registered under `mid`.  Unknown mids are ignored.
    pub fn remove(&mut self, mid: &str) -> PresenceUpdate {
        let removed = self.tracks.remove(mid);
        if removed.is_none() {
            debug!("remote mid {mid} removed but never registered");
        }
        let video_count = self.video_count();
        if matches!(&removed, Some(t) if t.kind == TrackKind::Video) && video_count == 0 {
            self.placeholder = Some(Placeholder::NoRemoteVideo);
        }
        PresenceUpdate {
            video_count,
            placeholder: self.placeholder,
            first_track: false,
            first_video: false,
            changed: removed.is_some(),
        }
    }

    pub fn get(&self, mid: &str) -> Option<&RemoteTrack> {
        self.tracks.get(mid)
    }

    pub fn video_count(&self) -> usize {
        self.tracks
            .values()
            .filter(|t| t.kind == TrackKind::Video)
            .count()
    }

    /// The video track with the smallest mid, if any.
    pub fn first_video(&self) -> Option<&RemoteTrack> {
        self.tracks
            .values()
            .filter(|t| t.kind == TrackKind::Video)
            .min_by(|a, b| a.mid.cmp(&b.mid))
    }

    /// Video tracks ordered by mid.
    pub fn video_tracks(&self) -> Vec<&RemoteTrack> {
        let mut tracks: Vec<&RemoteTrack> = self
            .tracks
            .values()
            .filter(|t| t.kind == TrackKind::Video)
            .collect();
        tracks.sort_by(|a, b| a.mid.cmp(&b.mid));
        tracks
    }

    pub fn placeholder(&self) -> Option<Placeholder> {
        self.placeholder
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Forgets every track and every "first" flag.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video() -> TrackHandle {
        TrackHandle::new(TrackKind::Video, "remote video")
    }

    fn audio() -> TrackHandle {
        TrackHandle::new(TrackKind::Audio, "remote audio")
    }

    #[test]
    fn test_first_video_is_flagged_once() {
        let mut registry = RemoteTrackRegistry::new();

        let first = registry.add("1", video());
        let second = registry.add("2", video());

        assert!(first.first_track && first.first_video);
        assert!(!second.first_track && !second.first_video);
    }

    #[test]
    fn test_readding_same_mid_does_not_double_count() {
        let mut registry = RemoteTrackRegistry::new();
        registry.add("1", video());

        let update = registry.add("1", video());

        assert_eq!(update.video_count, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_audio_without_video_shows_no_webcam() {
        let mut registry = RemoteTrackRegistry::new();

        let update = registry.add("0", audio());

        assert_eq!(update.placeholder, Some(Placeholder::NoWebcam));
        assert!(update.first_track);
        assert!(!update.first_video);
    }

    #[test]
    fn test_audio_after_video_keeps_placeholder_hidden() {
        let mut registry = RemoteTrackRegistry::new();
        registry.add("1", video());

        let update = registry.add("0", audio());

        assert_eq!(update.placeholder, None);
    }

    #[test]
    fn test_removing_unknown_mid_is_a_noop() {
        // Arrange
        let mut registry = RemoteTrackRegistry::new();
        registry.add("1", video());

        // Act
        let update = registry.remove("9");

        // Assert
        assert!(!update.changed);
        assert_eq!(update.video_count, 1);
        assert_eq!(update.placeholder, None);
    }

    #[test]
    fn test_removing_audio_does_not_show_no_remote_video() {
        let mut registry = RemoteTrackRegistry::new();
        registry.add("0", audio());

        let update = registry.remove("0");

        assert_eq!(update.placeholder, Some(Placeholder::NoWebcam));
    }

    #[test]
    fn test_clear_resets_first_flags() {
        let mut registry = RemoteTrackRegistry::new();
        registry.add("1", video());

        registry.clear();

        assert!(registry.is_empty());
        assert_eq!(registry.placeholder(), None);
        assert!(registry.add("1", video()).first_video);
    }

    #[test]
    fn test_placeholder_texts() {
        assert_eq!(Placeholder::NoWebcam.to_string(), "No webcam available");
        assert_eq!(Placeholder::NoRemoteVideo.to_string(), "No remote video available");
    }
}
