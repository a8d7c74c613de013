//! Floating overlays: panes drawn atop the tiled layout, sized and
//! positioned as percentages of the available area so resize stays
//! deterministic.
//!
//! Grounded on `mux_render.rs`'s `PaneRegion`/`PaneBorder`, which convert
//! grid-cell rectangles into pixel regions for the GUI; here the same
//! percent-of-area idea converts into grid cells instead of pixels, since
//! this renderer has no pixel layer.

use serde::{Deserialize, Serialize};

use crate::cellbuffer::ColorSpec;
use crate::layout::PaneId;
use crate::rect::Rect;

/// A floating overlay's geometry and toggle identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloatingOverlay {
    /// The pane this overlay draws.
    pub pane_id: PaneId,
    /// Width as a fraction of the available area (0.0–1.0).
    pub width_percent: f32,
    /// Height as a fraction of the available area (0.0–1.0).
    pub height_percent: f32,
    /// X position as a fraction of the available area (0.0–1.0).
    pub x_percent: f32,
    /// Y position as a fraction of the available area (0.0–1.0).
    pub y_percent: f32,
    /// Border colour.
    pub border_color: ColorSpec,
    /// Padding inside the border, in cells.
    pub padding: u16,
    /// Byte that toggles this overlay's visibility.
    pub trigger_key: u8,
    /// If set, this overlay only matches a toggle when the focused pane's
    /// cwd equals this value.
    pub sticky_cwd: Option<String>,
    /// Current visibility.
    pub visible: bool,
}

impl FloatingOverlay {
    /// Resolve this overlay's outer-frame rectangle against the available
    /// area, in grid cells.
    pub fn resolve_rect(&self, area: Rect) -> Rect {
        let x = area.x + (area.width as f32 * self.x_percent) as u16;
        let y = area.y + (area.height as f32 * self.y_percent) as u16;
        let width = (area.width as f32 * self.width_percent) as u16;
        let height = (area.height as f32 * self.height_percent) as u16;
        Rect::new(x, y, width.max(1), height.max(1))
    }

    /// The pane's drawable rectangle, inset by the border and padding.
    pub fn inner_rect(&self, area: Rect) -> Rect {
        let outer = self.resolve_rect(area);
        let inset = 1 + self.padding; // 1 cell for the border itself.
        let x = outer.x.saturating_add(inset);
        let y = outer.y.saturating_add(inset);
        let width = outer.width.saturating_sub(inset.saturating_mul(2));
        let height = outer.height.saturating_sub(inset.saturating_mul(2));
        Rect::new(x, y, width.max(1), height.max(1))
    }
}

/// Result of a sticky-float toggle lookup.
pub enum ToggleOutcome {
    /// An existing overlay's visibility was flipped.
    Toggled(PaneId),
    /// No overlay matched; the caller should create one.
    NotFound,
}

/// Toggle the overlay bound to `trigger_key`, optionally requiring its
/// sticky cwd to match `focused_cwd`. If `exclusive` is set and the toggled
/// overlay becomes visible, every other overlay sharing the same trigger key
/// is hidden.
pub fn toggle_sticky(
    overlays: &mut [FloatingOverlay],
    trigger_key: u8,
    focused_cwd: Option<&str>,
    exclusive: bool,
) -> ToggleOutcome {
    let idx = overlays.iter().position(|o| {
        o.trigger_key == trigger_key
            && match (&o.sticky_cwd, focused_cwd) {
                (Some(want), Some(have)) => want == have,
                (Some(_), None) => false,
                (None, _) => true,
            }
    });

    let Some(idx) = idx else { return ToggleOutcome::NotFound };

    overlays[idx].visible = !overlays[idx].visible;
    let pane_id = overlays[idx].pane_id;
    let became_visible = overlays[idx].visible;

    if became_visible && exclusive {
        for (i, other) in overlays.iter_mut().enumerate() {
            if i != idx && other.trigger_key == trigger_key {
                other.visible = false;
            }
        }
    }

    ToggleOutcome::Toggled(pane_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(pane: u32, key: u8, cwd: Option<&str>) -> FloatingOverlay {
        FloatingOverlay {
            pane_id: PaneId(pane),
            width_percent: 0.5,
            height_percent: 0.5,
            x_percent: 0.25,
            y_percent: 0.25,
            border_color: ColorSpec::None,
            padding: 0,
            trigger_key: key,
            sticky_cwd: cwd.map(String::from),
            visible: false,
        }
    }

    #[test]
    fn resolve_rect_scales_by_percent() {
        let area = Rect::new(0, 0, 100, 40);
        let o = overlay(0, b'f', None);
        let rect = o.resolve_rect(area);
        assert_eq!(rect.width, 50);
        assert_eq!(rect.height, 20);
        assert_eq!(rect.x, 25);
        assert_eq!(rect.y, 10);
    }

    #[test]
    fn toggle_flips_visibility() {
        let mut overlays = vec![overlay(0, b'f', None)];
        let outcome = toggle_sticky(&mut overlays, b'f', None, false);
        assert!(matches!(outcome, ToggleOutcome::Toggled(PaneId(0))));
        assert!(overlays[0].visible);

        toggle_sticky(&mut overlays, b'f', None, false);
        assert!(!overlays[0].visible);
    }

    #[test]
    fn toggle_requires_matching_sticky_cwd() {
        let mut overlays = vec![overlay(0, b'f', Some("/home/a"))];
        let outcome = toggle_sticky(&mut overlays, b'f', Some("/home/b"), false);
        assert!(matches!(outcome, ToggleOutcome::NotFound));

        let outcome = toggle_sticky(&mut overlays, b'f', Some("/home/a"), false);
        assert!(matches!(outcome, ToggleOutcome::Toggled(_)));
    }

    #[test]
    fn exclusive_toggle_hides_same_key_siblings() {
        let mut overlays = vec![overlay(0, b'f', Some("/a")), overlay(1, b'f', Some("/b"))];
        overlays[1].visible = true;

        toggle_sticky(&mut overlays, b'f', Some("/a"), true);
        assert!(overlays[0].visible);
        assert!(!overlays[1].visible);
    }
}
