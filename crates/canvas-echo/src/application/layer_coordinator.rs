//! LayerCoordinator: keeps the layer controls in line with what the remote
//! side says is in effect.
//!
//! Two inputs drive it:
//!
//! - **Requests** from the user (`request_layer`).  They update the local
//!   state, show the chosen button as pending and send a switch request.
//!   They never make a button active.
//! - **Confirmations** from the remote side (`on_layer_confirmed`), carried by
//!   plugin events that report `substream` and/or `temporal`.  They make
//!   exactly one button of each reported kind active.
//!
//! The first confirmation of a session builds the controls: spatial buttons
//! always, temporal buttons only when the negotiated video codec is VP8.
//! Requests that are never confirmed are not errors and are never retried.

use canvas_core::domain::controls::{LayerControlGroup, SPATIAL_LAYERS};
use canvas_core::{Confirmation, LayerControls, LayerKind, LayerSelection, PluginRequest};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::signaling::{Transport, TransportError};
use super::view::{Notification, SessionView};

/// Error type for layer switch requests.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("there is no {kind} {value} to switch to")]
    UnknownLayer { kind: LayerKind, value: u8 },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Layer state machine plus the controls that display it.
#[derive(Debug)]
pub struct LayerCoordinator {
    selection: LayerSelection,
    controls: Option<LayerControls>,
    temporal_layers: u8,
}

impl LayerCoordinator {
    /// `temporal_layers` is the number of temporal layers the VP8 encoder
    /// produces.
    pub fn new(temporal_layers: u8) -> Self {
        Self {
            selection: LayerSelection::new(),
            controls: None,
            temporal_layers: temporal_layers.max(1),
        }
    }

    pub fn selection(&self) -> &LayerSelection {
        &self.selection
    }

    pub fn controls(&self) -> Option<&LayerControls> {
        self.controls.as_ref()
    }

    fn layer_exists(&self, kind: LayerKind, value: u8) -> bool {
        match &self.controls {
            Some(controls) => controls
                .group(kind)
                .is_some_and(|group| group.button(value).is_some()),
            None => match kind {
                LayerKind::Spatial => value < SPATIAL_LAYERS,
                LayerKind::Temporal => value < self.temporal_layers,
            },
        }
    }

    fn quality_label(&self, kind: LayerKind, value: u8) -> &'static str {
        match self.controls.as_ref().and_then(|c| c.group(kind)) {
            Some(group) => group.quality_label(value),
            None => match kind {
                LayerKind::Spatial => LayerControlGroup::spatial().quality_label(value),
                LayerKind::Temporal => {
                    LayerControlGroup::temporal(self.temporal_layers).quality_label(value)
                }
            },
        }
    }

    /// Asks the remote side to switch `kind` to `value`.
    ///
    /// Allowed at any time, also while another request is pending; the last
    /// request wins locally.  The active control does not change here.
    pub async fn request_layer(
        &mut self,
        kind: LayerKind,
        value: u8,
        transport: &dyn Transport,
        view: &mut dyn SessionView,
    ) -> Result<(), LayerError> {
        if !self.layer_exists(kind, value) {
            return Err(LayerError::UnknownLayer { kind, value });
        }

        self.selection.request(kind, value);
        if let Some(controls) = self.controls.as_mut() {
            if let Some(group) = controls.group_mut(kind) {
                group.mark_pending(value);
            }
            view.render_layer_controls(controls);
        }

        let label = self.quality_label(kind, value);
        let (text, body) = match kind {
            LayerKind::Spatial => (
                format!("Switching simulcast substream, wait for it... ({label})"),
                PluginRequest::substream(value),
            ),
            LayerKind::Temporal => (
                format!("Capping simulcast temporal layer, wait for it... ({label})"),
                PluginRequest::temporal(value),
            ),
        };
        view.notify(Notification::info(text));
        info!("requesting {kind} {value}");
        transport.send(body).await?;
        Ok(())
    }

    /// Applies a confirmation reported by the remote side.
    ///
    /// Returns `None` when the event carried no layer value.
    pub fn on_layer_confirmed(
        &mut self,
        substream: Option<u8>,
        temporal: Option<u8>,
        videocodec: Option<&str>,
        view: &mut dyn SessionView,
    ) -> Option<Confirmation> {
        let confirmation = self.selection.apply_confirmation(substream, temporal)?;

        if confirmation.first {
            let vp8 = videocodec.is_some_and(|codec| codec.eq_ignore_ascii_case("vp8"));
            info!(
                "building layer controls (temporal layers {})",
                if vp8 { "on" } else { "off" }
            );
            self.controls = Some(LayerControls::new(vp8, self.temporal_layers));
        }
        let controls = self.controls.get_or_insert_with(|| LayerControls::new(false, 0));

        if let Some(value) = substream {
            if controls.spatial.mark_active(value) {
                let label = controls.spatial.quality_label(value);
                view.notify(Notification::success(format!(
                    "Switched simulcast substream! ({label})"
                )));
            } else {
                warn!("confirmed substream {value} has no control");
            }
        }

        if let Some(value) = temporal {
            match controls.group_mut(LayerKind::Temporal) {
                Some(group) => {
                    if group.mark_active(value) {
                        let label = group.quality_label(value);
                        view.notify(Notification::success(format!(
                            "Capped simulcast temporal layer! ({label})"
                        )));
                    } else {
                        warn!("confirmed temporal layer {value} has no control");
                    }
                }
                None => debug!("temporal layer {value} confirmed without temporal controls"),
            }
        }

        view.render_layer_controls(controls);
        Some(confirmation)
    }

    /// Forgets all layer state and removes the controls; the next
    /// confirmation builds them again.
    pub fn reset(&mut self, view: &mut dyn SessionView) {
        self.selection.reset();
        if self.controls.take().is_some() {
            view.remove_layer_controls();
        }
    }
}
