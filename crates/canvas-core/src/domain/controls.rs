//! Layer switch buttons.
//!
//! The controls are a bounded set of buttons per layer kind: `SL 2`, `SL 1`,
//! `SL 0` for substreams and `TL n-1` … `TL 0` for temporal layers.  A button
//! has three looks:
//!
//! - **Idle** – neither requested nor in effect.
//! - **Pending** – the viewer asked for it; no confirmation yet.
//! - **Active** – the remote side confirmed it is in effect.
//!
//! Only a confirmation makes a button active, and a confirmation leaves
//! exactly one button of its kind active.  A request never takes the active
//! look away from anything.

use super::layers::LayerKind;

/// Number of spatial layers (simulcast substreams) offered.
pub const SPATIAL_LAYERS: u8 = 3;

/// Visual state of one layer button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonStyle {
    #[default]
    Idle,
    Pending,
    Active,
}

/// One layer button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerButton {
    pub value: u8,
    pub label: String,
    pub style: ButtonStyle,
}

/// All buttons of one layer kind, highest layer first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerControlGroup {
    kind: LayerKind,
    buttons: Vec<LayerButton>,
}

impl LayerControlGroup {
    fn with_layers(kind: LayerKind, layers: u8) -> Self {
        let prefix = match kind {
            LayerKind::Spatial => "SL",
            LayerKind::Temporal => "TL",
        };
        let buttons = (0..layers)
            .rev()
            .map(|value| LayerButton {
                value,
                label: format!("{prefix} {value}"),
                style: ButtonStyle::Idle,
            })
            .collect();
        Self { kind, buttons }
    }

    /// `SL 2`, `SL 1`, `SL 0`.
    pub fn spatial() -> Self {
        Self::with_layers(LayerKind::Spatial, SPATIAL_LAYERS)
    }

    /// `TL layers-1` … `TL 0`.
    pub fn temporal(layers: u8) -> Self {
        Self::with_layers(LayerKind::Temporal, layers)
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn buttons(&self) -> &[LayerButton] {
        &self.buttons
    }

    pub fn button(&self, value: u8) -> Option<&LayerButton> {
        self.buttons.iter().find(|b| b.value == value)
    }

    fn contains(&self, value: u8) -> bool {
        self.button(value).is_some()
    }

    /// Shows `value` as requested.
    ///
    /// Any other pending button goes back to idle; active buttons keep their
    /// look, including `value` itself when it is already active.  Returns
    /// `false` and changes nothing when no button carries `value`.
    pub fn mark_pending(&mut self, value: u8) -> bool {
        if !self.contains(value) {
            return false;
        }
        for button in &mut self.buttons {
            match button.style {
                ButtonStyle::Active => {}
                _ if button.value == value => button.style = ButtonStyle::Pending,
                ButtonStyle::Pending => button.style = ButtonStyle::Idle,
                ButtonStyle::Idle => {}
            }
        }
        true
    }

    /// Shows `value` as the layer in effect.
    ///
    /// The previously active sibling goes idle.  A sibling that is still
    /// pending stays pending: its request is outstanding.  Returns `false`
    /// and changes nothing when no button carries `value`.
    pub fn mark_active(&mut self, value: u8) -> bool {
        if !self.contains(value) {
            return false;
        }
        for button in &mut self.buttons {
            if button.value == value {
                button.style = ButtonStyle::Active;
            } else if button.style == ButtonStyle::Active {
                button.style = ButtonStyle::Idle;
            }
        }
        true
    }

    pub fn active(&self) -> Option<u8> {
        self.buttons
            .iter()
            .find(|b| b.style == ButtonStyle::Active)
            .map(|b| b.value)
    }

    pub fn pending(&self) -> Option<u8> {
        self.buttons
            .iter()
            .find(|b| b.style == ButtonStyle::Pending)
            .map(|b| b.value)
    }

    /// Human description used in switch notifications.
    ///
    /// The lowest layer, the highest layer and everything in between get
    /// their own wording.
    pub fn quality_label(&self, value: u8) -> &'static str {
        let top = self.buttons.first().map(|b| b.value).unwrap_or(0);
        match (self.kind, value) {
            (LayerKind::Spatial, 0) => "lower quality",
            (LayerKind::Spatial, v) if v >= top => "higher quality",
            (LayerKind::Spatial, _) => "normal quality",
            (LayerKind::Temporal, 0) => "lowest FPS",
            (LayerKind::Temporal, v) if v >= top => "highest FPS",
            (LayerKind::Temporal, _) => "medium FPS",
        }
    }
}

/// The complete set of layer controls of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerControls {
    pub spatial: LayerControlGroup,
    /// Present only when the negotiated codec supports temporal layers.
    pub temporal: Option<LayerControlGroup>,
}

impl LayerControls {
    pub fn new(with_temporal: bool, temporal_layers: u8) -> Self {
        Self {
            spatial: LayerControlGroup::spatial(),
            temporal: with_temporal.then(|| LayerControlGroup::temporal(temporal_layers)),
        }
    }

    pub fn group(&self, kind: LayerKind) -> Option<&LayerControlGroup> {
        match kind {
            LayerKind::Spatial => Some(&self.spatial),
            LayerKind::Temporal => self.temporal.as_ref(),
        }
    }

    pub fn group_mut(&mut self, kind: LayerKind) -> Option<&mut LayerControlGroup> {
        match kind {
            LayerKind::Spatial => Some(&mut self.spatial),
            LayerKind::Temporal => self.temporal.as_mut(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_count(group: &LayerControlGroup) -> usize {
        group
            .buttons()
            .iter()
            .filter(|b| b.style == ButtonStyle::Active)
            .count()
    }

    #[test]
    fn test_spatial_group_lists_highest_first() {
        let group = LayerControlGroup::spatial();
        let labels: Vec<&str> = group.buttons().iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["SL 2", "SL 1", "SL 0"]);
    }

    #[test]
    fn test_temporal_group_follows_layer_count() {
        let group = LayerControlGroup::temporal(3);
        let values: Vec<u8> = group.buttons().iter().map(|b| b.value).collect();
        assert_eq!(values, [2, 1, 0]);
    }

    #[test]
    fn test_mark_pending_never_grants_or_removes_active() {
        // Arrange
        let mut group = LayerControlGroup::spatial();
        group.mark_active(1);

        // Act
        assert!(group.mark_pending(2));

        // Assert
        assert_eq!(group.active(), Some(1));
        assert_eq!(group.pending(), Some(2));
    }

    #[test]
    fn test_newer_request_replaces_pending_button() {
        let mut group = LayerControlGroup::spatial();
        group.mark_pending(2);
        group.mark_pending(0);
        assert_eq!(group.pending(), Some(0));
        assert_eq!(group.button(2).unwrap().style, ButtonStyle::Idle);
    }

    #[test]
    fn test_pending_on_active_button_keeps_it_active() {
        let mut group = LayerControlGroup::spatial();
        group.mark_active(2);
        group.mark_pending(2);
        assert_eq!(group.button(2).unwrap().style, ButtonStyle::Active);
        assert_eq!(group.pending(), None);
    }

    #[test]
    fn test_mark_active_leaves_exactly_one_active() {
        // Arrange
        let mut group = LayerControlGroup::spatial();
        group.mark_pending(0);

        // Act
        for value in [2, 1, 0, 2] {
            assert!(group.mark_active(value));

            // Assert
            assert_eq!(active_count(&group), 1);
            assert_eq!(group.active(), Some(value));
        }
        assert_eq!(group.pending(), None);
    }

    #[test]
    fn test_superseded_confirmation_keeps_newer_request_pending() {
        // Arrange – ask for 2, then change our mind and ask for 0
        let mut group = LayerControlGroup::spatial();
        group.mark_pending(2);
        group.mark_pending(0);

        // Act – the late confirmation for 2 lands
        group.mark_active(2);

        // Assert
        assert_eq!(group.active(), Some(2));
        assert_eq!(group.pending(), Some(0));
    }

    #[test]
    fn test_unknown_value_changes_nothing() {
        let mut group = LayerControlGroup::spatial();
        group.mark_active(1);
        let before = group.clone();

        assert!(!group.mark_active(7));
        assert!(!group.mark_pending(7));
        assert_eq!(group, before);
    }

    #[test]
    fn test_quality_labels() {
        let spatial = LayerControlGroup::spatial();
        assert_eq!(spatial.quality_label(0), "lower quality");
        assert_eq!(spatial.quality_label(1), "normal quality");
        assert_eq!(spatial.quality_label(2), "higher quality");

        let temporal = LayerControlGroup::temporal(3);
        assert_eq!(temporal.quality_label(0), "lowest FPS");
        assert_eq!(temporal.quality_label(1), "medium FPS");
        assert_eq!(temporal.quality_label(2), "highest FPS");
    }

    #[test]
    fn test_temporal_group_only_when_enabled() {
        assert!(LayerControls::new(false, 3).group(LayerKind::Temporal).is_none());
        assert!(LayerControls::new(true, 3).group(LayerKind::Temporal).is_some());
    }
}
