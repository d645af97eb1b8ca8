//! In-process loopback transport behaving like an echo-test media server.
//!
//! The "server" answers the offer, sends the composited video and the
//! original audio straight back as two remote tracks, and honours the usual
//! echo-test requests:
//!
//! | Request body          | Effect                                          |
//! |-----------------------|-------------------------------------------------|
//! | `audio` / `video`     | echoed medium switched on or off                |
//! | `bitrate`             | cap on the echoed bitrate (`0` = no cap)        |
//! | `substream`           | simulcast substream switch, confirmed in an event|
//! | `temporal`            | temporal layer cap, confirmed in an event       |
//!
//! Everything the server does is reported as [`TransportEvent`]s on the
//! channel returned by [`EchoTransport::new`], in the order a real peer
//! connection would report it.
//!
//! # Link statistics (for beginners)
//!
//! There is no encoder here, so the bitrate is an estimate: the number of new
//! composited frames since the last sample, times a fixed encoded size per
//! pixel, scaled down for lower layers and capped by the bitrate limit.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use canvas_core::{
    EventResult, Jsep, PluginEvent, PluginRequest, Resolution, SdpType, TrackHandle, TrackKind,
    TransportEvent,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::compositor::OutboundStream;
use crate::application::signaling::{LinkStats, Transport, TransportError};

/// Mid of the echoed audio track.
pub const AUDIO_MID: &str = "0";
/// Mid of the echoed video track.
pub const VIDEO_MID: &str = "1";

/// Estimated encoded size: one byte for every ten pixels.
const ENCODED_PIXELS_PER_BYTE: u64 = 10;

/// Codec the server picks when the client expresses no preference.
const DEFAULT_VIDEO_CODEC: &str = "vp8";

/// How the echo server behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoSettings {
    /// Pretend the client sends simulcast and report substreams/temporal
    /// layers.
    pub simulcast: bool,
    /// Temporal layers per substream (VP8 only).
    pub temporal_layers: u8,
}

impl Default for EchoSettings {
    fn default() -> Self {
        Self {
            simulcast: false,
            temporal_layers: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Negotiation {
    Idle,
    /// Offer sent, answer delivered, waiting for it to be applied.
    AwaitingAnswer,
    Established,
}

struct EchoState {
    session: String,
    negotiation: Negotiation,
    outbound: Option<OutboundStream>,
    remote_audio: Option<TrackHandle>,
    remote_video: Option<TrackHandle>,
    video_codec: String,
    audio_on: bool,
    video_on: bool,
    bitrate_cap: u64,
    substream: u8,
    temporal: u8,
    last_sample: Option<(Instant, u64)>,
    closed: bool,
}

/// The loopback echo transport.
pub struct EchoTransport {
    settings: EchoSettings,
    state: Mutex<EchoState>,
    events: UnboundedSender<TransportEvent>,
}

impl EchoTransport {
    /// Creates the transport and the channel its events arrive on.
    pub fn new(settings: EchoSettings) -> (Self, UnboundedReceiver<TransportEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let top_temporal = settings.temporal_layers.max(1) - 1;
        let transport = Self {
            settings,
            state: Mutex::new(EchoState {
                session: Uuid::new_v4().simple().to_string(),
                negotiation: Negotiation::Idle,
                outbound: None,
                remote_audio: None,
                remote_video: None,
                video_codec: DEFAULT_VIDEO_CODEC.to_string(),
                audio_on: true,
                video_on: true,
                bitrate_cap: 0,
                substream: 2,
                temporal: top_temporal,
                last_sample: None,
                closed: false,
            }),
            events,
        };
        (transport, rx)
    }

    fn state(&self) -> MutexGuard<'_, EchoState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TransportEvent) {
        debug!("echo emits {}", event.name());
        if self.events.send(event).is_err() {
            debug!("echo event dropped: receiver gone");
        }
    }

    fn emit_message(&self, event: PluginEvent, jsep: Option<Jsep>) {
        self.emit(TransportEvent::Message { event, jsep });
    }

    fn reply(result: EventResult) -> PluginEvent {
        PluginEvent {
            echotest: Some("event".to_string()),
            result: Some(result),
            ..PluginEvent::default()
        }
    }

    /// Applies the media switches of a request body and returns the layer
    /// confirmation to report, if any.
    fn apply(&self, state: &mut EchoState, body: &PluginRequest) -> Option<PluginEvent> {
        if let Some(on) = body.audio {
            state.audio_on = on;
        }
        if let Some(on) = body.video {
            state.video_on = on;
        }
        if let Some(codec) = &body.videocodec {
            state.video_codec = codec.to_ascii_lowercase();
        }
        if let Some(bitrate) = body.bitrate {
            state.bitrate_cap = bitrate;
            if bitrate == 0 {
                info!("echo: bitrate cap removed");
            } else {
                info!("echo: bitrate capped to {bitrate} bps");
            }
        }

        if body.substream.is_none() && body.temporal.is_none() {
            return None;
        }
        if !self.settings.simulcast {
            warn!("echo: layer switch requested but simulcast is off");
            return None;
        }
        let mut confirmation = PluginEvent {
            echotest: Some("event".to_string()),
            videocodec: Some(state.video_codec.clone()),
            ..PluginEvent::default()
        };
        if let Some(substream) = body.substream.filter(|s| *s <= 2) {
            state.substream = substream;
            confirmation.substream = Some(substream);
        }
        let temporal_ok = state.video_codec == "vp8";
        if let Some(temporal) = body
            .temporal
            .filter(|t| temporal_ok && *t < self.settings.temporal_layers)
        {
            state.temporal = temporal;
            confirmation.temporal = Some(temporal);
        }
        confirmation.has_layer_info().then_some(confirmation)
    }

    fn sdp(state: &EchoState, kind: SdpType) -> String {
        let direction = "sendrecv";
        let video_codec = state.video_codec.to_ascii_uppercase();
        format!(
            "v=0\r\no=- {session} {version} IN IP4 127.0.0.1\r\ns=canvas-echo\r\nt=0 0\r\n\
             m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=mid:{AUDIO_MID}\r\na=rtpmap:111 opus/48000/2\r\na={direction}\r\n\
             m=video 9 UDP/TLS/RTP/SAVPF 96\r\na=mid:{VIDEO_MID}\r\na=rtpmap:96 {video_codec}/90000\r\na={direction}\r\n",
            session = state.session,
            version = match kind {
                SdpType::Offer => 1,
                SdpType::Answer => 2,
            },
        )
    }

    /// The server ends the echo test: a `"done"` result follows.
    pub fn finish(&self) {
        info!("echo: test finished by the server");
        self.emit_message(Self::reply(EventResult::Text("done".to_string())), None);
    }

    /// The server notices it is losing packets sent by the client.
    pub fn report_slow_link(&self, lost: u32) {
        self.emit(TransportEvent::SlowLink {
            uplink: true,
            lost,
            mid: Some(VIDEO_MID.to_string()),
        });
        self.emit_message(
            Self::reply(EventResult::Report {
                status: Some("slow_link".to_string()),
            }),
            None,
        );
    }

    /// Layers the server currently forwards: `(substream, temporal)`.
    pub fn current_layers(&self) -> (u8, u8) {
        let state = self.state();
        (state.substream, state.temporal)
    }

    pub fn bitrate_cap(&self) -> u64 {
        self.state().bitrate_cap
    }

    pub fn media_enabled(&self) -> (bool, bool) {
        let state = self.state();
        (state.audio_on, state.video_on)
    }
}

#[async_trait]
impl Transport for EchoTransport {
    async fn send(&self, body: PluginRequest) -> Result<(), TransportError> {
        let confirmation = {
            let mut state = self.state();
            if state.closed {
                return Err(TransportError::Closed);
            }
            self.apply(&mut state, &body)
        };
        self.emit_message(Self::reply(EventResult::Text("ok".to_string())), None);
        if let Some(confirmation) = confirmation {
            self.emit_message(confirmation, None);
        }
        Ok(())
    }

    async fn create_offer(&self, stream: &OutboundStream) -> Result<Jsep, TransportError> {
        let video = stream
            .video_track()
            .cloned()
            .ok_or_else(|| TransportError::Negotiation("outbound stream has no video".into()))?;
        let offer = {
            let mut state = self.state();
            if state.closed {
                return Err(TransportError::Closed);
            }
            state.outbound = Some(stream.clone());
            Self::sdp(&state, SdpType::Offer)
        };
        // The local tracks are attached to the peer connection as part of
        // building the offer.
        self.emit(TransportEvent::LocalTrack {
            track: video,
            on: true,
        });
        if let Some(audio) = stream.audio.clone() {
            self.emit(TransportEvent::LocalTrack {
                track: audio,
                on: true,
            });
        }
        Ok(Jsep::offer(offer))
    }

    async fn send_with_jsep(&self, body: PluginRequest, jsep: Jsep) -> Result<(), TransportError> {
        if jsep.kind != SdpType::Offer {
            return Err(TransportError::Negotiation(
                "the echo server only accepts offers".to_string(),
            ));
        }
        let answer = {
            let mut state = self.state();
            if state.closed {
                return Err(TransportError::Closed);
            }
            if state.outbound.is_none() {
                return Err(TransportError::Negotiation(
                    "offer was not created by this transport".to_string(),
                ));
            }
            self.apply(&mut state, &body);
            state.negotiation = Negotiation::AwaitingAnswer;
            Self::sdp(&state, SdpType::Answer)
        };
        info!("echo: offer received, answering");
        self.emit_message(
            Self::reply(EventResult::Text("ok".to_string())),
            Some(Jsep::answer(answer)),
        );
        Ok(())
    }

    async fn handle_remote_jsep(&self, jsep: Jsep) -> Result<(), TransportError> {
        let (audio, video, initial_layers) = {
            let mut state = self.state();
            if state.closed {
                return Err(TransportError::Closed);
            }
            if jsep.kind != SdpType::Answer || state.negotiation != Negotiation::AwaitingAnswer {
                return Err(TransportError::Negotiation(format!(
                    "unexpected {:?} in state {:?}",
                    jsep.kind, state.negotiation
                )));
            }
            state.negotiation = Negotiation::Established;
            let audio = state
                .outbound
                .as_ref()
                .and_then(|o| o.audio.as_ref())
                .map(|_| TrackHandle::new(TrackKind::Audio, "echoed audio"));
            let video = TrackHandle::new(TrackKind::Video, "echoed video");
            state.remote_audio = audio.clone();
            state.remote_video = Some(video.clone());

            let initial_layers = self.settings.simulcast.then(|| PluginEvent {
                echotest: Some("event".to_string()),
                videocodec: Some(state.video_codec.clone()),
                substream: Some(state.substream),
                temporal: (state.video_codec == "vp8").then_some(state.temporal),
                ..PluginEvent::default()
            });
            (audio, video, initial_layers)
        };

        info!("echo: answer applied, peer connection up");
        self.emit(TransportEvent::IceState("checking".to_string()));
        self.emit(TransportEvent::IceState("connected".to_string()));
        self.emit(TransportEvent::WebrtcState(true));
        if let Some(audio) = audio {
            self.emit(TransportEvent::MediaState {
                medium: TrackKind::Audio,
                on: true,
                mid: Some(AUDIO_MID.to_string()),
            });
            self.emit(TransportEvent::RemoteTrack {
                track: audio,
                mid: AUDIO_MID.to_string(),
                on: true,
            });
        }
        self.emit(TransportEvent::MediaState {
            medium: TrackKind::Video,
            on: true,
            mid: Some(VIDEO_MID.to_string()),
        });
        self.emit(TransportEvent::RemoteTrack {
            track: video,
            mid: VIDEO_MID.to_string(),
            on: true,
        });
        if let Some(layers) = initial_layers {
            self.emit_message(layers, None);
        }
        Ok(())
    }

    async fn stats(&self, mid: &str) -> Option<LinkStats> {
        let mut state = self.state();
        if mid != VIDEO_MID || state.negotiation != Negotiation::Established {
            return None;
        }
        let (sequence, source) = {
            let frame = state.outbound.as_ref()?.video.borrow();
            (frame.sequence, frame.resolution())
        };
        let now = Instant::now();
        let previous = state.last_sample.replace((now, sequence));

        // Lower substreams halve the resolution per step.
        let divisor = 1u32 << (2 - state.substream.min(2));
        let resolution = if state.video_on {
            Resolution::new(source.width / divisor, source.height / divisor)
        } else {
            Resolution::new(0, 0)
        };

        let bitrate_bps = match previous {
            Some((at, previous_sequence)) if now > at && state.video_on => {
                let frames = sequence.saturating_sub(previous_sequence);
                let bytes_per_frame = u64::from(resolution.width) * u64::from(resolution.height)
                    / ENCODED_PIXELS_PER_BYTE;
                let layers = u64::from(self.settings.temporal_layers.max(1));
                let temporal_share = if state.video_codec == "vp8" {
                    u64::from(state.temporal) + 1
                } else {
                    layers
                };
                let bits = frames * bytes_per_frame * 8 * temporal_share / layers;
                let estimate = (bits as f64 / (now - at).as_secs_f64()) as u64;
                if state.bitrate_cap > 0 {
                    estimate.min(state.bitrate_cap)
                } else {
                    estimate
                }
            }
            _ => 0,
        };

        Some(LinkStats {
            bitrate_bps,
            resolution,
        })
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        let (audio, video) = {
            let mut state = self.state();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.negotiation = Negotiation::Idle;
            (state.remote_audio.take(), state.remote_video.take())
        };
        info!("echo: session destroyed");
        if let Some(audio) = audio {
            self.emit(TransportEvent::RemoteTrack {
                track: audio,
                mid: AUDIO_MID.to_string(),
                on: false,
            });
        }
        if let Some(video) = video {
            self.emit(TransportEvent::RemoteTrack {
                track: video,
                mid: VIDEO_MID.to_string(),
                on: false,
            });
        }
        self.emit(TransportEvent::WebrtcState(false));
        self.emit(TransportEvent::Cleanup);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::{CompositedFrame, MediaStream};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;

    fn outbound() -> (watch::Sender<Arc<CompositedFrame>>, OutboundStream) {
        let (tx, rx) = watch::channel(Arc::new(CompositedFrame::blank(Resolution::new(640, 480))));
        let audio = TrackHandle::new(TrackKind::Audio, "mic");
        let stream = OutboundStream {
            stream: MediaStream::new(vec![
                TrackHandle::new(TrackKind::Video, "canvas"),
                audio.clone(),
            ]),
            video: rx,
            audio: Some(audio),
        };
        (tx, stream)
    }

    fn drain(rx: &mut UnboundedReceiver<TransportEvent>) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn negotiate(
        transport: &EchoTransport,
        rx: &mut UnboundedReceiver<TransportEvent>,
        stream: &OutboundStream,
    ) {
        let offer = transport.create_offer(stream).await.unwrap();
        transport
            .send_with_jsep(PluginRequest::negotiation(&Default::default()), offer)
            .await
            .unwrap();
        let answer = drain(rx)
            .into_iter()
            .find_map(|e| match e {
                TransportEvent::Message { jsep: Some(jsep), .. } => Some(jsep),
                _ => None,
            })
            .unwrap();
        transport.handle_remote_jsep(answer).await.unwrap();
    }

    #[tokio::test]
    async fn test_offer_is_answered_with_remote_tracks() {
        // Arrange
        let (transport, mut rx) = EchoTransport::new(EchoSettings::default());
        let (_tx, stream) = outbound();

        // Act
        negotiate(&transport, &mut rx, &stream).await;
        let events = drain(&mut rx);

        // Assert
        assert!(events.contains(&TransportEvent::WebrtcState(true)));
        let remote: Vec<(&str, TrackKind)> = events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::RemoteTrack { track, mid, on: true } => {
                    Some((mid.as_str(), track.kind))
                }
                _ => None,
            })
            .collect();
        assert_eq!(remote, [(AUDIO_MID, TrackKind::Audio), (VIDEO_MID, TrackKind::Video)]);
    }

    #[tokio::test]
    async fn test_offer_creation_reports_local_tracks() {
        let (transport, mut rx) = EchoTransport::new(EchoSettings::default());
        let (_tx, stream) = outbound();

        transport.create_offer(&stream).await.unwrap();

        let local = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, TransportEvent::LocalTrack { on: true, .. }))
            .count();
        assert_eq!(local, 2);
    }

    #[tokio::test]
    async fn test_answer_without_offer_is_rejected() {
        let (transport, _rx) = EchoTransport::new(EchoSettings::default());
        let result = transport.handle_remote_jsep(Jsep::answer("v=0")).await;
        assert!(matches!(result, Err(TransportError::Negotiation(_))));
    }

    #[tokio::test]
    async fn test_simulcast_reports_initial_layers_and_confirms_switches() {
        // Arrange
        let settings = EchoSettings {
            simulcast: true,
            temporal_layers: 3,
        };
        let (transport, mut rx) = EchoTransport::new(settings);
        let (_tx, stream) = outbound();
        negotiate(&transport, &mut rx, &stream).await;
        let initial = drain(&mut rx);
        assert!(initial.iter().any(|e| matches!(
            e,
            TransportEvent::Message { event, .. } if event.substream == Some(2) && event.temporal == Some(2)
        )));

        // Act
        transport.send(PluginRequest::substream(0)).await.unwrap();

        // Assert
        let events = drain(&mut rx);
        let confirmation = events
            .iter()
            .find_map(|e| match e {
                TransportEvent::Message { event, .. } if event.has_layer_info() => Some(event),
                _ => None,
            })
            .unwrap();
        assert_eq!(confirmation.substream, Some(0));
        assert_eq!(confirmation.temporal, None);
        assert_eq!(transport.current_layers().0, 0);
    }

    #[tokio::test]
    async fn test_layer_switch_without_simulcast_is_not_confirmed() {
        let (transport, mut rx) = EchoTransport::new(EchoSettings::default());

        transport.send(PluginRequest::substream(1)).await.unwrap();

        assert!(drain(&mut rx).iter().all(|e| !matches!(
            e,
            TransportEvent::Message { event, .. } if event.has_layer_info()
        )));
    }

    #[tokio::test]
    async fn test_media_toggles_and_bitrate_cap_are_applied() {
        let (transport, _rx) = EchoTransport::new(EchoSettings::default());

        transport.send(PluginRequest::audio_enabled(false)).await.unwrap();
        transport.send(PluginRequest::bitrate_cap(128)).await.unwrap();

        assert_eq!(transport.media_enabled(), (false, true));
        assert_eq!(transport.bitrate_cap(), 128_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_estimate_bitrate_from_new_frames() {
        // Arrange
        let (transport, mut rx) = EchoTransport::new(EchoSettings::default());
        let (tx, stream) = outbound();
        negotiate(&transport, &mut rx, &stream).await;
        let first = transport.stats(VIDEO_MID).await.unwrap();
        assert_eq!(first.bitrate_bps, 0);
        assert_eq!(first.resolution, Resolution::new(640, 480));

        // Act – 15 new frames over one second
        tokio::time::advance(Duration::from_secs(1)).await;
        let mut frame = CompositedFrame::blank(Resolution::new(640, 480));
        frame.sequence = 15;
        tx.send_replace(Arc::new(frame));
        let second = transport.stats(VIDEO_MID).await.unwrap();

        // Assert – 15 frames * 30720 bytes * 8 bits
        assert_eq!(second.bitrate_bps, 3_686_400);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_respect_bitrate_cap() {
        let (transport, mut rx) = EchoTransport::new(EchoSettings::default());
        let (tx, stream) = outbound();
        negotiate(&transport, &mut rx, &stream).await;
        transport.send(PluginRequest::bitrate_cap(256)).await.unwrap();
        transport.stats(VIDEO_MID).await;

        tokio::time::advance(Duration::from_secs(1)).await;
        let mut frame = CompositedFrame::blank(Resolution::new(640, 480));
        frame.sequence = 15;
        tx.send_replace(Arc::new(frame));

        assert_eq!(
            transport.stats(VIDEO_MID).await.unwrap().bitrate_bps,
            256_000
        );
    }

    #[tokio::test]
    async fn test_stats_for_unknown_mid_is_none() {
        let (transport, _rx) = EchoTransport::new(EchoSettings::default());
        assert!(transport.stats("7").await.is_none());
    }

    #[tokio::test]
    async fn test_destroy_removes_tracks_then_cleans_up_once() {
        // Arrange
        let (transport, mut rx) = EchoTransport::new(EchoSettings::default());
        let (_tx, stream) = outbound();
        negotiate(&transport, &mut rx, &stream).await;
        drain(&mut rx);

        // Act
        transport.destroy().await.unwrap();
        transport.destroy().await.unwrap();

        // Assert
        let events = drain(&mut rx);
        assert_eq!(events.last(), Some(&TransportEvent::Cleanup));
        assert_eq!(
            events.iter().filter(|e| **e == TransportEvent::Cleanup).count(),
            1
        );
        assert!(matches!(
            transport.send(PluginRequest::audio_enabled(true)).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_finish_and_slow_link_reports() {
        let (transport, mut rx) = EchoTransport::new(EchoSettings::default());

        transport.finish();
        transport.report_slow_link(12);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            TransportEvent::Message { event, .. } if event.result.as_ref().is_some_and(|r| r.is_done())
        )));
        assert!(events.iter().any(|e| matches!(e, TransportEvent::SlowLink { lost: 12, .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            TransportEvent::Message { event, .. } if event.result.as_ref().is_some_and(|r| r.is_slow_link())
        )));
    }
}
