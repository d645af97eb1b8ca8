//! Session: the single event loop of the publisher.
//!
//! One [`Session`] owns everything that changes while the echo test runs:
//! the caption, the compositor, the layer coordinator, the remote track
//! registry, the media controls and the stats timer.  Nothing else holds a
//! reference to any of them.
//!
//! # One loop, four inputs (for beginners)
//!
//! [`Session::run`] waits on four things at once with `tokio::select!` and
//! handles whichever is ready first, completely, before looking again:
//!
//! ```text
//!  compositor deadline ──▶ paint one frame
//!  stats deadline      ──▶ read link stats, show them
//!  transport event     ──▶ remote description, tracks, confirmations, cleanup
//!  user command        ──▶ caption edit, layer request, media toggles, stop
//! ```
//!
//! Because every handler runs to completion on this one task, a caption edit
//! is never half-applied when a frame is painted, and the layer controls can
//! only change in response to a confirmation event.
//!
//! # Failures
//!
//! A camera that cannot be opened, an overlay that cannot be loaded, or a
//! negotiation that fails ends the session: the view gets a blocking alert,
//! the transport is destroyed and the error is returned.  Nothing is
//! retried.  Packet loss reports only produce a warning.

use std::sync::Arc;
use std::time::Duration;

use canvas_core::protocol::opaque_id;
use canvas_core::{
    CaptionEdit, CaptionState, CodecPreferences, Jsep, LayerKind, OverlayAsset,
    OverlayPlacement, PluginEvent, PluginRequest, RemoteTrack, RemoteTrackRegistry,
    TrackHandle, TrackKind, TransportEvent,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use super::compositor::{
    wait_until_playing, Compositor, CompositorError, CompositorSettings, OutboundStream,
    TickOutcome,
};
use super::frame_timer::{sleep_until_opt, RepeatingTimer};
use super::layer_coordinator::{LayerCoordinator, LayerError};
use super::signaling::{Transport, TransportError};
use super::view::{Notification, SessionView};
use crate::infrastructure::assets::{AssetError, OverlayLoader};
use crate::infrastructure::capture::{CaptureConstraints, CaptureDevice, CaptureError};

/// Alert shown when the remote side ends the test.
pub const ECHO_OVER: &str = "The Echo Test is over";

/// Error type for the session.  Every variant ends the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("camera unavailable: {0}")]
    Capture(#[from] CaptureError),
    #[error("overlay unavailable: {0}")]
    Asset(#[from] AssetError),
    #[error("compositor failed: {0}")]
    Compositor(#[from] CompositorError),
    #[error("negotiation failed: {0}")]
    Transport(#[from] TransportError),
    #[error("the session was already started")]
    AlreadyStarted,
}

/// A user action, from whatever control surface is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    EditCaption(CaptionEdit),
    RequestLayer { kind: LayerKind, value: u8 },
    ToggleAudio,
    ToggleVideo,
    /// `0` removes the cap.
    CapBitrate { kbps: u64 },
    Stop,
}

/// Whether the loop keeps going after a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Everything the session needs to know up front.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub compositor: CompositorSettings,
    pub capture: CaptureConstraints,
    /// Where the overlay image is loaded from.
    pub overlay_location: String,
    pub overlay_placement: OverlayPlacement,
    pub codecs: CodecPreferences,
    /// Temporal layers offered when the video codec is VP8.
    pub temporal_layers: u8,
    pub stats_interval: Duration,
}

/// State of the audio/video toggles and the bitrate cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaControls {
    /// The controls only work once a remote track has arrived.
    pub enabled: bool,
    pub audio_on: bool,
    pub video_on: bool,
    /// Current cap in kbit/s, `0` for none.
    pub bitrate_kbps: u64,
}

impl Default for MediaControls {
    fn default() -> Self {
        Self {
            enabled: false,
            audio_on: true,
            video_on: true,
            bitrate_kbps: 0,
        }
    }
}

/// The publisher session.
pub struct Session {
    id: String,
    settings: SessionSettings,
    transport: Arc<dyn Transport>,
    view: Box<dyn SessionView>,
    caption: CaptionState,
    layers: LayerCoordinator,
    tracks: RemoteTrackRegistry,
    compositor: Option<Compositor>,
    outbound: Option<OutboundStream>,
    stats_timer: RepeatingTimer,
    media: MediaControls,
    ice_connected: bool,
    stopping: bool,
}

impl Session {
    pub fn new(
        settings: SessionSettings,
        caption: CaptionState,
        transport: Arc<dyn Transport>,
        view: Box<dyn SessionView>,
    ) -> Self {
        let id = opaque_id();
        debug!("session {id} created");
        Self {
            id,
            layers: LayerCoordinator::new(settings.temporal_layers),
            stats_timer: RepeatingTimer::new(settings.stats_interval),
            settings,
            transport,
            view,
            caption,
            tracks: RemoteTrackRegistry::new(),
            compositor: None,
            outbound: None,
            media: MediaControls::default(),
            ice_connected: false,
            stopping: false,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// Opaque identifier of this session (`canvas-xxxxxxxxxxxx`).
    pub fn opaque_id(&self) -> &str {
        &self.id
    }

    pub fn caption(&self) -> &CaptionState {
        &self.caption
    }

    pub fn layers(&self) -> &LayerCoordinator {
        &self.layers
    }

    pub fn tracks(&self) -> &RemoteTrackRegistry {
        &self.tracks
    }

    pub fn compositor(&self) -> Option<&Compositor> {
        self.compositor.as_ref()
    }

    pub fn outbound(&self) -> Option<&OutboundStream> {
        self.outbound.as_ref()
    }

    pub fn media_controls(&self) -> MediaControls {
        self.media
    }

    /// When the stats display refreshes next, `None` when it is off.
    pub fn stats_deadline(&self) -> Option<Instant> {
        self.stats_timer.deadline()
    }

    // ── Setup ─────────────────────────────────────────────────────────────────

    /// Opens the camera, loads the overlay, starts the draw loop once the
    /// camera plays, and negotiates with the outbound stream.
    ///
    /// Waits as long as the camera takes to start playing.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyStarted`] on a second call.  Any other
    /// failure is shown as an alert, tears the session down and is returned.
    pub async fn start(
        &mut self,
        device: &dyn CaptureDevice,
        loader: &dyn OverlayLoader,
    ) -> Result<(), SessionError> {
        if self.compositor.is_some() || self.stopping {
            return Err(SessionError::AlreadyStarted);
        }
        match self.try_start(device, loader).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    async fn try_start(
        &mut self,
        device: &dyn CaptureDevice,
        loader: &dyn OverlayLoader,
    ) -> Result<(), SessionError> {
        info!("session {} starting", self.id);

        let source = device.open(&self.settings.capture).await?;
        let image = loader.load(&self.settings.overlay_location).await?;
        let overlay =
            OverlayAsset::prepare(&image, self.settings.overlay_placement).map_err(AssetError::from)?;

        debug!("waiting for the camera to play");
        wait_until_playing(source.as_ref()).await?;

        let mut compositor = Compositor::new(source, overlay, &self.settings.compositor)?;
        compositor.start(&self.caption);
        let stream = compositor.capture_stream();
        self.compositor = Some(compositor);
        let stream = stream?;

        let body = PluginRequest::negotiation(&self.settings.codecs);
        self.send(body.clone()).await?;
        let offer = self.transport.create_offer(&stream).await?;
        info!("sending offer ({} bytes of SDP)", offer.sdp.len());
        self.transport.send_with_jsep(body, offer).await?;
        self.outbound = Some(stream);
        Ok(())
    }

    async fn send(&self, body: PluginRequest) -> Result<(), TransportError> {
        debug!(
            "sending {}",
            serde_json::to_string(&body).unwrap_or_else(|_| format!("{body:?}"))
        );
        self.transport.send(body).await
    }

    // ── Event loop ────────────────────────────────────────────────────────────

    /// Runs until the user stops the session, the transport goes away, or a
    /// negotiation failure ends it.
    ///
    /// # Errors
    ///
    /// Returns the failure that ended the session, after it was shown.
    pub async fn run(
        &mut self,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        mut commands: mpsc::Receiver<ControlCommand>,
    ) -> Result<(), SessionError> {
        loop {
            let frame_due = self.compositor.as_ref().and_then(Compositor::deadline);
            let stats_due = self.stats_timer.deadline();

            let flow = tokio::select! {
                _ = sleep_until_opt(frame_due) => {
                    self.on_frame_due();
                    Flow::Continue
                }
                _ = sleep_until_opt(stats_due) => {
                    self.on_stats_due().await;
                    Flow::Continue
                }
                event = events.recv() => match event {
                    Some(event) => match self.handle_event(event).await {
                        Ok(flow) => flow,
                        Err(e) => {
                            self.fail(&e).await;
                            return Err(e);
                        }
                    },
                    None => {
                        info!("transport went away");
                        self.teardown().await;
                        Flow::Stop
                    }
                },
                Some(command) = commands.recv() => self.handle_command(command).await,
            };

            if flow == Flow::Stop {
                info!("session {} ended", self.id);
                return Ok(());
            }
        }
    }

    fn on_frame_due(&mut self) {
        let Some(compositor) = self.compositor.as_mut() else {
            return;
        };
        if compositor.tick(&self.caption) == TickOutcome::Terminated {
            info!("camera stopped; the outbound video is frozen");
        }
    }

    async fn on_stats_due(&mut self) {
        // Skipped, not stopped, while the remote video is away.
        match self.tracks.first_video().map(|t| t.mid.clone()) {
            Some(mid) => {
                if let Some(stats) = self.transport.stats(&mid).await {
                    self.view.render_stats(&stats);
                }
            }
            None => trace!("no remote video; stats skipped"),
        }
        if self.stats_timer.is_armed() {
            self.stats_timer.rearm_from(Instant::now());
        }
    }

    // ── Transport events ──────────────────────────────────────────────────────

    /// Handles one transport event.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transport`] when a remote session description
    /// cannot be applied.
    pub async fn handle_event(&mut self, event: TransportEvent) -> Result<Flow, SessionError> {
        debug!("transport event: {}", event.name());
        match event {
            TransportEvent::Message { event, jsep } => {
                if let Some(jsep) = jsep {
                    self.on_remote_jsep(jsep).await?;
                }
                self.on_message(event);
            }
            TransportEvent::RemoteTrack { track, mid, on } => self.on_remote_track(track, mid, on),
            TransportEvent::LocalTrack { track, on } => {
                debug!("local {:?} track {} {}", track.kind, track.id, if on { "added" } else { "removed" });
                if on && !self.ice_connected {
                    self.view.set_publishing(true);
                }
            }
            TransportEvent::SlowLink { uplink, lost, mid } => {
                warn!(
                    "slow link on {} ({}): {lost} packets lost",
                    mid.as_deref().unwrap_or("?"),
                    if uplink { "uplink" } else { "downlink" }
                );
            }
            TransportEvent::IceState(state) => {
                debug!("ICE state: {state}");
                self.ice_connected = matches!(state.as_str(), "connected" | "completed");
            }
            TransportEvent::WebrtcState(up) => {
                info!("peer connection is {}", if up { "up" } else { "down" });
                if up {
                    self.view.set_publishing(false);
                }
            }
            TransportEvent::MediaState { medium, on, mid } => {
                info!(
                    "remote side {} receiving our {:?} (mid {})",
                    if on { "started" } else { "stopped" },
                    medium,
                    mid.as_deref().unwrap_or("?")
                );
            }
            TransportEvent::Cleanup => {
                info!("peer connection closed");
                self.reset_media();
                if self.stopping {
                    return Ok(Flow::Stop);
                }
            }
        }
        Ok(Flow::Continue)
    }

    async fn on_remote_jsep(&mut self, jsep: Jsep) -> Result<(), SessionError> {
        debug!("applying remote {:?}", jsep.kind);
        self.transport.handle_remote_jsep(jsep).await?;
        Ok(())
    }

    fn on_message(&mut self, event: PluginEvent) {
        if let Some(result) = &event.result {
            if result.is_done() {
                self.on_echo_done();
                return;
            }
            if result.is_slow_link() {
                warn!("the server reports packet loss");
                self.view.notify(Notification::warning(
                    "Packet loss?",
                    "The server is missing many of the packets we send; \
                     consider capping the bitrate",
                ));
            }
        }
        if event.has_layer_info() {
            self.layers.on_layer_confirmed(
                event.substream,
                event.temporal,
                event.videocodec.as_deref(),
                self.view.as_mut(),
            );
        }
    }

    fn on_echo_done(&mut self) {
        info!("echo test finished by the remote side");
        self.view.notify(Notification::alert(ECHO_OVER));
        self.tracks.clear();
        self.view.render_remote_media(&[], None);
        self.disable_media_controls();
        self.stop_stats();
    }

    fn on_remote_track(&mut self, track: TrackHandle, mid: String, on: bool) {
        info!(
            "remote {:?} track {} (mid {mid})",
            track.kind,
            if on { "added" } else { "removed" }
        );
        let update = if on {
            self.tracks.add(mid, track)
        } else {
            self.tracks.remove(&mid)
        };
        if !update.changed {
            debug!("remote track event for unknown mid ignored");
            return;
        }

        self.render_remote_media();
        if update.first_track {
            self.media.enabled = true;
            self.view
                .set_media_controls(true, self.media.audio_on, self.media.video_on);
        }
        if update.first_video {
            self.stats_timer.start_after(Instant::now());
        }
    }

    fn render_remote_media(&mut self) {
        let videos: Vec<RemoteTrack> = self.tracks.video_tracks().into_iter().cloned().collect();
        self.view
            .render_remote_media(&videos, self.tracks.placeholder());
    }

    // ── User commands ─────────────────────────────────────────────────────────

    /// Handles one user command.
    pub async fn handle_command(&mut self, command: ControlCommand) -> Flow {
        match command {
            ControlCommand::EditCaption(edit) => {
                if let Err(e) = self.caption.apply(edit) {
                    warn!("caption edit rejected: {e}");
                    self.view
                        .notify(Notification::warning("Invalid caption", e.to_string()));
                }
            }
            ControlCommand::RequestLayer { kind, value } => {
                let result = self
                    .layers
                    .request_layer(kind, value, self.transport.as_ref(), self.view.as_mut())
                    .await;
                match result {
                    Ok(()) => {}
                    Err(e @ LayerError::UnknownLayer { .. }) => {
                        self.view
                            .notify(Notification::warning("Layer switch", e.to_string()));
                    }
                    Err(LayerError::Transport(e)) => error!("layer switch request failed: {e}"),
                }
            }
            ControlCommand::ToggleAudio => self.toggle(TrackKind::Audio).await,
            ControlCommand::ToggleVideo => self.toggle(TrackKind::Video).await,
            ControlCommand::CapBitrate { kbps } => self.cap_bitrate(kbps).await,
            ControlCommand::Stop => {
                info!("stop requested");
                self.teardown().await;
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    async fn toggle(&mut self, medium: TrackKind) {
        if !self.media.enabled {
            warn!("media controls are not available yet");
            return;
        }
        let (flag, body) = match medium {
            TrackKind::Audio => {
                self.media.audio_on = !self.media.audio_on;
                (self.media.audio_on, PluginRequest::audio_enabled(self.media.audio_on))
            }
            TrackKind::Video => {
                self.media.video_on = !self.media.video_on;
                (self.media.video_on, PluginRequest::video_enabled(self.media.video_on))
            }
        };
        info!("{medium:?} echo {}", if flag { "enabled" } else { "disabled" });
        if let Err(e) = self.send(body).await {
            error!("media toggle failed: {e}");
        }
        self.view
            .set_media_controls(true, self.media.audio_on, self.media.video_on);
    }

    async fn cap_bitrate(&mut self, kbps: u64) {
        if !self.media.enabled {
            warn!("media controls are not available yet");
            return;
        }
        self.media.bitrate_kbps = kbps;
        let text = if kbps == 0 {
            "Not limiting bandwidth".to_string()
        } else {
            format!("Capping bandwidth to {kbps} kbit/s")
        };
        self.view.notify(Notification::info(text));
        if let Err(e) = self.send(PluginRequest::bitrate_cap(kbps)).await {
            error!("bitrate cap failed: {e}");
        }
    }

    // ── Teardown ──────────────────────────────────────────────────────────────

    fn disable_media_controls(&mut self) {
        self.media.enabled = false;
        self.view
            .set_media_controls(false, self.media.audio_on, self.media.video_on);
    }

    fn stop_stats(&mut self) {
        self.stats_timer.stop();
        self.view.clear_stats();
    }

    /// Clears everything tied to the peer connection: remote tracks, layer
    /// state and controls, media controls, stats.
    fn reset_media(&mut self) {
        self.stop_stats();
        self.view.set_publishing(false);
        self.ice_connected = false;
        if !self.tracks.is_empty() {
            self.tracks.clear();
            self.view.render_remote_media(&[], None);
        }
        self.layers.reset(self.view.as_mut());
        if self.media.enabled {
            self.disable_media_controls();
        }
    }

    /// Stops the draw loop, destroys the transport and resets local state.
    async fn teardown(&mut self) {
        if self.stopping {
            return;
        }
        self.stopping = true;
        if let Some(compositor) = self.compositor.as_mut() {
            compositor.shutdown();
        }
        if let Err(e) = self.transport.destroy().await {
            warn!("transport teardown failed: {e}");
        }
        self.reset_media();
    }

    async fn fail(&mut self, e: &SessionError) {
        error!("session {} failed: {e}", self.id);
        self.view.notify(Notification::alert(e.to_string()));
        self.teardown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::compositor::LoopState;
    use crate::application::signaling::LinkStats;
    use crate::application::view::NoticeLevel;
    use crate::infrastructure::assets::StaticOverlayLoader;
    use crate::infrastructure::capture::mock::{MockCaptureDevice, MockFrameSource};
    use crate::infrastructure::transport::mock::RecordingTransport;
    use crate::infrastructure::view::{RecordingView, ViewCall};
    use canvas_core::{
        ButtonStyle, EventResult, Placeholder, PlacementError, PlaybackStatus, Resolution,
    };
    use image::{Rgba, RgbaImage};

    const SIZE: Resolution = Resolution::new(640, 480);

    fn settings() -> SessionSettings {
        SessionSettings {
            compositor: CompositorSettings::default(),
            capture: CaptureConstraints {
                audio: true,
                ideal: SIZE,
                fps: 30,
            },
            overlay_location: "watermark.png".to_string(),
            overlay_placement: OverlayPlacement::top_right(SIZE, 340, 110, 0.4, 15).unwrap(),
            codecs: CodecPreferences::new(None, Some("vp8".to_string()), None),
            temporal_layers: 3,
            stats_interval: Duration::from_secs(1),
        }
    }

    fn playing_device() -> MockCaptureDevice {
        let source = Arc::new(MockFrameSource::new(SIZE));
        source.set_frame(RgbaImage::from_pixel(640, 480, Rgba([90, 90, 90, 255])));
        source.set_status(PlaybackStatus::Playing);
        MockCaptureDevice::new(source)
    }

    fn overlay_loader() -> StaticOverlayLoader {
        StaticOverlayLoader::new(RgbaImage::from_pixel(340, 110, Rgba([255, 0, 0, 255])))
    }

    fn session_with(transport: Arc<RecordingTransport>) -> (Session, RecordingView) {
        let view = RecordingView::new();
        let session = Session::new(
            settings(),
            CaptionState::default(),
            transport,
            Box::new(view.clone()),
        );
        (session, view)
    }

    async fn started() -> (Session, Arc<RecordingTransport>, RecordingView) {
        let transport = Arc::new(RecordingTransport::new());
        let (mut session, view) = session_with(Arc::clone(&transport));
        session
            .start(&playing_device(), &overlay_loader())
            .await
            .unwrap();
        (session, transport, view)
    }

    fn remote(kind: TrackKind, mid: &str, on: bool) -> TransportEvent {
        TransportEvent::RemoteTrack {
            track: TrackHandle::new(kind, "remote"),
            mid: mid.to_string(),
            on,
        }
    }

    fn message(event: PluginEvent) -> TransportEvent {
        TransportEvent::Message { event, jsep: None }
    }

    // ── Setup ─────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_start_paints_first_frame_and_negotiates() {
        // Arrange / Act
        let (session, transport, view) = started().await;

        // Assert
        assert!(session.opaque_id().starts_with("canvas-"));
        assert_eq!(session.compositor().unwrap().ticks(), 1);
        let body = PluginRequest::negotiation(&settings().codecs);
        assert_eq!(transport.sent(), vec![body.clone()]);
        let negotiated = transport.sent_with_jsep();
        assert_eq!(negotiated.len(), 1);
        assert_eq!(negotiated[0].0, body);
        assert_eq!(transport.offers_created(), 1);
        assert!(session.outbound().is_some());
        assert!(view.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_start_without_camera_alerts_and_fails() {
        // Arrange
        let transport = Arc::new(RecordingTransport::new());
        let (mut session, view) = session_with(Arc::clone(&transport));

        // Act
        let result = session
            .start(&MockCaptureDevice::unavailable(), &overlay_loader())
            .await;

        // Assert
        assert!(matches!(result, Err(SessionError::Capture(_))));
        let notices = view.notifications();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Alert);
        assert!(transport.sent().is_empty());
        assert!(transport.is_destroyed());
    }

    #[tokio::test]
    async fn test_start_with_too_small_overlay_fails() {
        let transport = Arc::new(RecordingTransport::new());
        let (mut session, _view) = session_with(transport);
        let tiny = StaticOverlayLoader::new(RgbaImage::new(10, 10));

        let result = session.start(&playing_device(), &tiny).await;

        assert!(matches!(
            result,
            Err(SessionError::Asset(AssetError::Placement(
                PlacementError::SourceOutOfBounds { .. }
            )))
        ));
        assert!(session.compositor().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_negotiation_stops_the_draw_loop() {
        // Arrange
        let transport = Arc::new(RecordingTransport::failing());
        let (mut session, view) = session_with(Arc::clone(&transport));

        // Act
        let result = session.start(&playing_device(), &overlay_loader()).await;

        // Assert
        assert!(matches!(result, Err(SessionError::Transport(_))));
        assert_eq!(
            session.compositor().map(Compositor::state),
            Some(LoopState::Terminated)
        );
        assert_eq!(view.notifications()[0].level, NoticeLevel::Alert);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_rejected() {
        let (mut session, _transport, _view) = started().await;
        let result = session.start(&playing_device(), &overlay_loader()).await;
        assert!(matches!(result, Err(SessionError::AlreadyStarted)));
    }

    // ── Transport events ──────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_remote_description_is_forwarded() {
        let (mut session, transport, _view) = started().await;
        let answer = Jsep::answer("v=0 answer");

        let flow = session
            .handle_event(TransportEvent::Message {
                event: PluginEvent::default(),
                jsep: Some(answer.clone()),
            })
            .await
            .unwrap();

        assert_eq!(flow, Flow::Continue);
        assert_eq!(transport.remote_jseps(), vec![answer]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_result_alerts_and_disables_controls() {
        // Arrange
        let (mut session, _transport, view) = started().await;
        session.handle_event(remote(TrackKind::Video, "1", true)).await.unwrap();
        assert!(session.stats_deadline().is_some());

        // Act
        session
            .handle_event(message(PluginEvent {
                result: Some(EventResult::Text("done".to_string())),
                ..PluginEvent::default()
            }))
            .await
            .unwrap();

        // Assert
        assert!(view.notifications().contains(&Notification::alert(ECHO_OVER)));
        assert!(!session.media_controls().enabled);
        assert!(session.stats_deadline().is_none());
        assert!(session.tracks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_link_status_raises_warning() {
        let (mut session, _transport, view) = started().await;

        session
            .handle_event(message(PluginEvent {
                result: Some(EventResult::Report {
                    status: Some("slow_link".to_string()),
                }),
                ..PluginEvent::default()
            }))
            .await
            .unwrap();

        let notices = view.notifications();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        assert_eq!(notices[0].title.as_deref(), Some("Packet loss?"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_tracks_drive_placeholder_controls_and_stats() {
        // Arrange
        let (mut session, _transport, view) = started().await;

        // Act – audio first: no video yet
        session.handle_event(remote(TrackKind::Audio, "0", true)).await.unwrap();

        // Assert
        assert!(session.media_controls().enabled);
        assert!(session.stats_deadline().is_none());
        assert!(view.calls().contains(&ViewCall::RenderRemoteMedia {
            mids: vec![],
            placeholder: Some(Placeholder::NoWebcam),
        }));

        // Act – the video arrives, then goes away
        session.handle_event(remote(TrackKind::Video, "1", true)).await.unwrap();
        assert!(session.stats_deadline().is_some());
        session.handle_event(remote(TrackKind::Video, "1", false)).await.unwrap();

        // Assert
        assert_eq!(
            view.calls().last(),
            Some(&ViewCall::RenderRemoteMedia {
                mids: vec![],
                placeholder: Some(Placeholder::NoRemoteVideo),
            })
        );
        assert_eq!(session.tracks().video_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_track_before_ice_shows_publishing_until_peer_is_up() {
        let (mut session, _transport, view) = started().await;

        session
            .handle_event(TransportEvent::LocalTrack {
                track: TrackHandle::new(TrackKind::Video, "canvas"),
                on: true,
            })
            .await
            .unwrap();
        session.handle_event(TransportEvent::WebrtcState(true)).await.unwrap();

        assert_eq!(
            view.calls(),
            vec![ViewCall::SetPublishing(true), ViewCall::SetPublishing(false)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_layer_confirmation_builds_controls_with_one_active_button() {
        let (mut session, _transport, view) = started().await;

        session
            .handle_event(message(PluginEvent {
                substream: Some(1),
                temporal: Some(2),
                videocodec: Some("vp8".to_string()),
                ..PluginEvent::default()
            }))
            .await
            .unwrap();

        let controls = view.last_controls().unwrap();
        assert_eq!(controls.spatial.active(), Some(1));
        assert_eq!(controls.temporal.as_ref().and_then(|t| t.active()), Some(2));
        assert!(session.layers().selection().controls_built());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_empties_registry_and_resets_controls_gate() {
        // Arrange
        let (mut session, _transport, view) = started().await;
        session.handle_event(remote(TrackKind::Video, "1", true)).await.unwrap();
        session
            .handle_event(message(PluginEvent {
                substream: Some(2),
                ..PluginEvent::default()
            }))
            .await
            .unwrap();

        // Act
        let flow = session.handle_event(TransportEvent::Cleanup).await.unwrap();

        // Assert
        assert_eq!(flow, Flow::Continue);
        assert!(session.tracks().is_empty());
        assert!(!session.layers().selection().controls_built());
        assert!(session.layers().controls().is_none());
        assert!(session.stats_deadline().is_none());
        assert!(view.calls().contains(&ViewCall::RemoveLayerControls));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_remote_description_is_an_error() {
        let (mut session, _view) = session_with(Arc::new(RecordingTransport::new()));
        // Not started: a failing transport would fail start itself.
        session.transport = Arc::new(RecordingTransport::failing()) as Arc<dyn Transport>;

        let result = session
            .handle_event(TransportEvent::Message {
                event: PluginEvent::default(),
                jsep: Some(Jsep::answer("v=0")),
            })
            .await;

        assert!(matches!(result, Err(SessionError::Transport(_))));
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_caption_edit_shows_on_next_tick() {
        // Arrange
        let (mut session, _transport, _view) = started().await;

        // Act
        session
            .handle_command(ControlCommand::EditCaption(CaptionEdit::text("Live")))
            .await;
        let before = session.compositor().unwrap().latest_frame();
        session.on_frame_due();
        let after = session.compositor().unwrap().latest_frame();

        // Assert
        assert_eq!(before.text[0].text, "Hi there!");
        assert_eq!(after.text[0].text, "Live");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_caption_edit_is_rejected_with_warning() {
        let (mut session, _transport, view) = started().await;

        session
            .handle_command(ControlCommand::EditCaption(CaptionEdit::color("blurple")))
            .await;

        assert_eq!(session.caption(), &CaptionState::default());
        assert_eq!(view.notifications()[0].level, NoticeLevel::Warning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_layer_request_marks_pending_but_not_active() {
        // Arrange
        let (mut session, transport, view) = started().await;
        session
            .handle_event(message(PluginEvent {
                substream: Some(2),
                ..PluginEvent::default()
            }))
            .await
            .unwrap();

        // Act
        session
            .handle_command(ControlCommand::RequestLayer {
                kind: LayerKind::Spatial,
                value: 0,
            })
            .await;

        // Assert
        let controls = view.last_controls().unwrap();
        assert_eq!(controls.spatial.active(), Some(2));
        assert_eq!(
            controls.spatial.button(0).map(|b| b.style),
            Some(ButtonStyle::Pending)
        );
        assert_eq!(transport.sent().last(), Some(&PluginRequest::substream(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_layer_request_warns_without_sending() {
        let (mut session, transport, view) = started().await;

        session
            .handle_command(ControlCommand::RequestLayer {
                kind: LayerKind::Spatial,
                value: 7,
            })
            .await;

        assert_eq!(transport.sent().len(), 1);
        assert_eq!(view.notifications()[0].level, NoticeLevel::Warning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_media_toggles_need_a_remote_track() {
        // Arrange
        let (mut session, transport, _view) = started().await;

        // Act – before any remote track
        session.handle_command(ControlCommand::ToggleAudio).await;
        assert_eq!(transport.sent().len(), 1);

        session.handle_event(remote(TrackKind::Audio, "0", true)).await.unwrap();
        session.handle_command(ControlCommand::ToggleAudio).await;
        session.handle_command(ControlCommand::ToggleVideo).await;
        session
            .handle_command(ControlCommand::CapBitrate { kbps: 256 })
            .await;

        // Assert
        let sent = transport.sent();
        assert_eq!(
            &sent[1..],
            &[
                PluginRequest::audio_enabled(false),
                PluginRequest::video_enabled(false),
                PluginRequest::bitrate_cap(256),
            ]
        );
        let media = session.media_controls();
        assert!(!media.audio_on && !media.video_on);
        assert_eq!(media.bitrate_kbps, 256);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_destroys_transport_and_stops_loop() {
        let (mut session, transport, _view) = started().await;

        let flow = session.handle_command(ControlCommand::Stop).await;

        assert_eq!(flow, Flow::Stop);
        assert!(transport.is_destroyed());
        assert_eq!(
            session.compositor().map(Compositor::state),
            Some(LoopState::Terminated)
        );
    }

    // ── Run loop ──────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_run_paints_at_frame_rate_until_stopped() {
        // Arrange
        let (mut session, _transport, _view) = started().await;
        let (_events_tx, events) = mpsc::unbounded_channel();
        let (commands_tx, commands) = mpsc::channel(4);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let _ = commands_tx.send(ControlCommand::Stop).await;
        });

        // Act
        session.run(events, commands).await.unwrap();

        // Assert – one tick at start plus one per 66.6 ms
        let ticks = session.compositor().unwrap().ticks();
        assert!((15..=16).contains(&ticks), "ticks = {ticks}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_refreshes_stats_every_interval() {
        // Arrange
        let (mut session, transport, view) = started().await;
        transport.set_stats(Some(LinkStats {
            bitrate_bps: 400_000,
            resolution: SIZE,
        }));
        let (events_tx, events) = mpsc::unbounded_channel();
        events_tx.send(remote(TrackKind::Video, "1", true)).unwrap();
        let (commands_tx, commands) = mpsc::channel(4);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            let _ = commands_tx.send(ControlCommand::Stop).await;
        });

        // Act
        session.run(events, commands).await.unwrap();

        // Assert
        let refreshes = view
            .calls()
            .into_iter()
            .filter(|c| matches!(c, ViewCall::RenderStats(_)))
            .count();
        assert_eq!(refreshes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ends_when_transport_goes_away() {
        let (mut session, transport, _view) = started().await;
        let (events_tx, events) = mpsc::unbounded_channel::<TransportEvent>();
        let (_commands_tx, commands) = mpsc::channel(4);
        drop(events_tx);

        session.run(events, commands).await.unwrap();

        assert!(transport.is_destroyed());
    }
}
