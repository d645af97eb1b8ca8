//! Spatial/temporal layer selection state machine.
//!
//! The remote side may send the echoed video in several *layers*: spatial
//! layers (simulcast substreams, i.e. resolutions) and temporal layers (frame
//! rate tiers).  The viewer asks for a layer; the remote side confirms the
//! switch later, in an unrelated message, or never.
//!
//! Each kind moves independently through:
//!
//! ```text
//!  Unselected ──request──▶ Pending(r) ──confirm(v)──▶ Confirmed(v)
//!                              ▲                          │
//!                              └──────── request ─────────┘
//! ```
//!
//! A confirmation is accepted whatever was requested last: a late
//! confirmation for a superseded request is indistinguishable from the
//! current one (last confirmation wins).  Nothing here times out.

use std::fmt;

/// The two independent layer dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Simulcast substream (resolution/quality).
    Spatial,
    /// Temporal layer (frame rate).
    Temporal,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Spatial => f.write_str("substream"),
            LayerKind::Temporal => f.write_str("temporal layer"),
        }
    }
}

/// Where one layer kind currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerPhase {
    #[default]
    Unselected,
    /// A switch was requested and no confirmation has arrived since.
    Pending { requested: u8 },
    /// The remote side reported this layer in effect.
    Confirmed { value: u8 },
}

/// Requested and confirmed layer for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerState {
    requested: Option<u8>,
    confirmed: Option<u8>,
    phase: LayerPhase,
}

impl LayerState {
    /// Records a local request.  The confirmed value is left alone.
    pub fn request(&mut self, value: u8) {
        self.requested = Some(value);
        self.phase = LayerPhase::Pending { requested: value };
    }

    /// Records an authoritative confirmation.
    pub fn confirm(&mut self, value: u8) {
        self.confirmed = Some(value);
        self.phase = LayerPhase::Confirmed { value };
    }

    pub fn requested(&self) -> Option<u8> {
        self.requested
    }

    /// The layer the UI shows as current.
    pub fn confirmed(&self) -> Option<u8> {
        self.confirmed
    }

    pub fn phase(&self) -> LayerPhase {
        self.phase
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// What a confirmation changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    /// `true` for the first confirmation of the session; the layer controls
    /// must be built now.
    pub first: bool,
    pub spatial: Option<u8>,
    pub temporal: Option<u8>,
}

/// Layer state of both kinds plus the one-time "controls built" gate.
#[derive(Debug, Clone, Default)]
pub struct LayerSelection {
    spatial: LayerState,
    temporal: LayerState,
    controls_built: bool,
}

impl LayerSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, kind: LayerKind) -> &LayerState {
        match kind {
            LayerKind::Spatial => &self.spatial,
            LayerKind::Temporal => &self.temporal,
        }
    }

    fn state_mut(&mut self, kind: LayerKind) -> &mut LayerState {
        match kind {
            LayerKind::Spatial => &mut self.spatial,
            LayerKind::Temporal => &mut self.temporal,
        }
    }

    /// Records a request for `kind`.  Allowed at any time; the last one wins.
    pub fn request(&mut self, kind: LayerKind, value: u8) {
        self.state_mut(kind).request(value);
    }

    /// Applies a confirmation event.
    ///
    /// Kinds without a value are untouched.  Returns `None` when the event
    /// carries no layer value at all.
    pub fn apply_confirmation(
        &mut self,
        substream: Option<u8>,
        temporal: Option<u8>,
    ) -> Option<Confirmation> {
        if substream.is_none() && temporal.is_none() {
            return None;
        }
        if let Some(value) = substream {
            self.spatial.confirm(value);
        }
        if let Some(value) = temporal {
            self.temporal.confirm(value);
        }
        let first = !self.controls_built;
        self.controls_built = true;
        Some(Confirmation {
            first,
            spatial: substream,
            temporal,
        })
    }

    pub fn controls_built(&self) -> bool {
        self.controls_built
    }

    /// Back to `Unselected` for both kinds; the next confirmation builds the
    /// controls again.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
