//! The frontend's session: an ordered list of tabs, the pane table backing
//! them, and the floating overlay list.
//!
//! Generalizes the teacher's `alacritty_multiplexer::session::Session`
//! (`windows: Vec<MuxWindow>`, `active_window: usize`) to this system's
//! tab/floating-overlay model; pane storage moves here from each tab so ids
//! stay unique session-wide.

use std::collections::HashMap;

use hexa_protocol::HexId;

use crate::error::{FrontendError, FrontendResult};
use crate::layout::{Direction, PaneId};
use crate::overlay::FloatingOverlay;
use crate::pane::Pane;
use crate::tab::Tab;

/// The frontend's view of one multiplexer session.
pub struct Session {
    /// Session display name, synced to the daemon on register.
    pub name: String,
    /// The session id this frontend declares to the daemon.
    pub session_id: HexId,
    /// Ordered tabs.
    pub tabs: Vec<Tab>,
    /// Index of the active tab.
    pub active_tab: usize,
    /// All panes, tiled or floating, keyed by local id.
    pub panes: HashMap<PaneId, Pane>,
    /// Floating overlays, independent of any one tab.
    pub floating: Vec<FloatingOverlay>,
    /// Index of the active overlay, if any is focused.
    pub active_floating: Option<usize>,
    next_pane_id: u32,
}

impl Session {
    /// A fresh session with one empty tab.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            session_id: HexId::new(),
            tabs: vec![Tab::new("main")],
            active_tab: 0,
            panes: HashMap::new(),
            floating: Vec::new(),
            active_floating: None,
            next_pane_id: 0,
        }
    }

    /// Allocate the next session-wide unique pane id.
    pub fn allocate_pane_id(&mut self) -> PaneId {
        let id = PaneId(self.next_pane_id);
        self.next_pane_id += 1;
        id
    }

    /// The currently active tab.
    pub fn active_tab(&self) -> &Tab {
        &self.tabs[self.active_tab]
    }

    /// Mutable access to the currently active tab.
    pub fn active_tab_mut(&mut self) -> &mut Tab {
        &mut self.tabs[self.active_tab]
    }

    /// Register `pane` under its id and, if its tab has no root yet, make it
    /// the tab's first pane.
    pub fn install_pane(&mut self, pane: Pane) {
        let id = pane.id;
        self.panes.insert(id, pane);
        if self.active_tab().is_empty() {
            self.active_tab_mut().create_first(id);
        }
    }

    /// Split the focused pane of the active tab, registering `pane` as the
    /// new leaf.
    pub fn split_focused(&mut self, direction: Direction, pane: Pane) -> FrontendResult<PaneId> {
        let id = pane.id;
        self.active_tab_mut().split_focused(direction, id)?;
        self.panes.insert(id, pane);
        Ok(id)
    }

    /// Close the active tab's focused pane, dropping its pane-table entry.
    /// Returns the closed pane's id.
    pub fn close_focused(&mut self) -> FrontendResult<PaneId> {
        let closed = self.active_tab_mut().close_focused()?;
        self.panes.remove(&closed);
        Ok(closed)
    }

    /// Add a new named tab and switch to it.
    pub fn new_tab(&mut self, name: impl Into<String>) {
        self.tabs.push(Tab::new(name));
        self.active_tab = self.tabs.len() - 1;
    }

    /// Close the active tab. Refuses if it is the only tab.
    pub fn close_active_tab(&mut self) -> FrontendResult<()> {
        if self.tabs.len() == 1 {
            return Err(FrontendError::Layout("refusing to close the last tab".into()));
        }
        let removed = self.tabs.remove(self.active_tab);
        for pane_id in removed.pane_order() {
            self.panes.remove(&pane_id);
        }
        if self.active_tab >= self.tabs.len() {
            self.active_tab = self.tabs.len() - 1;
        }
        Ok(())
    }

    /// Switch to the next tab, wrapping around.
    pub fn next_tab(&mut self) {
        self.active_tab = (self.active_tab + 1) % self.tabs.len();
    }

    /// Switch to the previous tab, wrapping around.
    pub fn prev_tab(&mut self) {
        self.active_tab = (self.active_tab + self.tabs.len() - 1) % self.tabs.len();
    }

    /// The focused pane in the active tab, if any.
    pub fn focused_pane(&self) -> Option<&Pane> {
        self.active_tab().focused.and_then(|id| self.panes.get(&id))
    }

    /// Mutable access to the focused pane in the active tab, if any.
    pub fn focused_pane_mut(&mut self) -> Option<&mut Pane> {
        let id = self.active_tab().focused?;
        self.panes.get_mut(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pane::Pane;

    fn dummy_pane(id: PaneId) -> Pane {
        Pane::new_daemon(id, HexId::new(), -1, 0, 80, 24)
    }

    #[test]
    fn install_first_pane_becomes_tab_root() {
        let mut s = Session::new("work");
        let id = s.allocate_pane_id();
        s.install_pane(dummy_pane(id));
        assert_eq!(s.active_tab().focused, Some(id));
    }

    #[test]
    fn split_focused_adds_pane_to_table() {
        let mut s = Session::new("work");
        let id0 = s.allocate_pane_id();
        s.install_pane(dummy_pane(id0));

        let id1 = s.allocate_pane_id();
        let new_id = s.split_focused(Direction::Vertical, dummy_pane(id1)).unwrap();
        assert_eq!(new_id, id1);
        assert_eq!(s.panes.len(), 2);
    }

    #[test]
    fn close_active_tab_refuses_last() {
        let mut s = Session::new("work");
        assert!(s.close_active_tab().is_err());
    }

    #[test]
    fn new_tab_switches_active_index() {
        let mut s = Session::new("work");
        s.new_tab("logs");
        assert_eq!(s.active_tab, 1);
        s.prev_tab();
        assert_eq!(s.active_tab, 0);
        s.next_tab();
        assert_eq!(s.active_tab, 1);
    }
}
