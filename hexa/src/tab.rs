//! Tab-level layout operations: the tiled side of a session.
//!
//! Generalizes the teacher's `alacritty_multiplexer::window::MuxWindow` from
//! a GUI window holding live panes to a tab holding only layout metadata —
//! the panes themselves (VT instance, fds) live in the session's pane table,
//! keyed by the same `PaneId`. Pane id allocation moves up to the session
//! (see `session.rs`) so ids stay unique across every tab, not just within
//! one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{FrontendError, FrontendResult};
use crate::layout::{Direction, LayoutNode, PaneId};
use crate::rect::Rect;
use crate::split;

/// A tab: a name, a layout tree over its panes, and a focus pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tab {
    /// User-visible name.
    pub name: String,
    /// Binary layout tree. `None` until `create_first` installs a root.
    pub layout: Option<LayoutNode>,
    /// Currently focused pane, if any.
    pub focused: Option<PaneId>,
}

impl Tab {
    /// An empty tab with no panes yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), layout: None, focused: None }
    }

    /// Install `pane_id` as the tab's first pane, if the tree is empty.
    /// Returns the new pane id, or the existing root's id if one is already
    /// installed (`pane_id` is then unused by the caller).
    pub fn create_first(&mut self, pane_id: PaneId) -> PaneId {
        if let Some(layout) = &self.layout {
            return layout.pane_ids()[0];
        }

        self.layout = Some(LayoutNode::Leaf { pane_id });
        self.focused = Some(pane_id);
        pane_id
    }

    /// Split the focused pane in `direction`, installing `new_id` as the new
    /// leaf. Focus moves to the new pane.
    pub fn split_focused(&mut self, direction: Direction, new_id: PaneId) -> FrontendResult<PaneId> {
        let focused = self
            .focused
            .ok_or_else(|| FrontendError::Layout("no focused pane to split".into()))?;
        let layout = self
            .layout
            .take()
            .ok_or_else(|| FrontendError::Layout("tab has no layout tree".into()))?;

        let (new_layout, new_pane_id) = split::split_pane(layout, focused, direction, new_id)?;
        self.layout = Some(new_layout);
        self.focused = Some(new_pane_id);
        Ok(new_pane_id)
    }

    /// Ordered list of pane ids in ascending numeric order.
    pub fn pane_order(&self) -> Vec<PaneId> {
        let Some(layout) = &self.layout else { return Vec::new() };
        let mut ids = layout.pane_ids();
        ids.sort();
        ids
    }

    /// Whether this tab currently has any panes.
    pub fn is_empty(&self) -> bool {
        self.layout.is_none()
    }

    /// Focus the next pane in ascending numeric order, wrapping around.
    pub fn focus_next(&mut self) {
        let order = self.pane_order();
        if order.is_empty() {
            return;
        }
        self.focused = Some(cycle(&order, self.focused, 1));
    }

    /// Focus the previous pane in ascending numeric order, wrapping around.
    pub fn focus_prev(&mut self) {
        let order = self.pane_order();
        if order.is_empty() {
            return;
        }
        self.focused = Some(cycle(&order, self.focused, -1));
    }

    /// Close the focused pane. Refuses if it is the tab's only pane.
    /// Moves focus to the next pane first and returns the id that was
    /// closed.
    pub fn close_focused(&mut self) -> FrontendResult<PaneId> {
        let focused = self
            .focused
            .ok_or_else(|| FrontendError::Layout("no focused pane to close".into()))?;
        let layout = self
            .layout
            .take()
            .ok_or_else(|| FrontendError::Layout("tab has no layout tree".into()))?;

        if layout.pane_count() == 1 {
            self.layout = Some(layout);
            return Err(FrontendError::Layout("refusing to close the tab's only pane".into()));
        }

        self.focus_next_within(&layout);
        let remaining = split::close_pane(layout, focused)?;
        self.layout = remaining;
        Ok(focused)
    }

    fn focus_next_within(&mut self, layout: &LayoutNode) {
        let mut order = layout.pane_ids();
        order.sort();
        self.focused = Some(cycle(&order, self.focused, 1));
    }

    /// Adjust the split ratio of the split enclosing the focused pane in
    /// `direction`, by `delta`. Returns `true` if a matching split exists.
    pub fn resize_focused(&mut self, direction: Direction, delta: f32) -> bool {
        let Some(focused) = self.focused else { return false };
        let Some(layout) = &mut self.layout else { return false };
        layout.resize_split(focused, direction, delta)
    }

    /// Recompute every pane's screen rectangle for the given area.
    pub fn recalculate(&self, area: Rect) -> HashMap<PaneId, Rect> {
        match &self.layout {
            Some(layout) => layout.calculate_rects(area),
            None => HashMap::new(),
        }
    }
}

fn cycle(order: &[PaneId], current: Option<PaneId>, delta: i64) -> PaneId {
    let len = order.len() as i64;
    let pos = current
        .and_then(|id| order.iter().position(|&o| o == id))
        .map(|p| p as i64)
        .unwrap_or(0);
    let next = ((pos + delta) % len + len) % len;
    order[next as usize]
}
