//! Frontend pane: identity, VT instance, and PTY liveness.
//!
//! Grounded on the teacher's `alacritty_multiplexer::pane::Pane` (id +
//! metadata only) combined with the PTY-fd bookkeeping the teacher's real
//! `mux_state::PaneState` keeps, minus the GUI `Term`/`FairMutex` plumbing —
//! here the VT lives directly on the pane since this process is
//! single-threaded.

use std::os::unix::io::RawFd;

use hexa_protocol::HexId;
use serde::{Deserialize, Serialize};

use crate::layout::PaneId;
use crate::rect::Rect;
use crate::vt::Vt;

/// Where this pane's master fd came from: tiled panes always go through the
/// daemon; floating overlays may spawn a local PTY directly in degraded
/// (daemon-unreachable) mode, per the frontend's error-handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaneOrigin {
    /// Owned by the daemon; `daemon_uuid` is meaningful.
    Daemon,
    /// Spawned locally by this frontend process; no daemon involvement.
    Local,
}

/// A single pane: identity, VT emulator, and liveness tracking.
pub struct Pane {
    /// Frontend-local numeric id, used as the layout tree's leaf key.
    pub id: PaneId,
    /// The daemon's identifier for this pane, when daemon-owned.
    pub daemon_uuid: Option<HexId>,
    /// Where the underlying PTY came from.
    pub origin: PaneOrigin,
    /// VT emulator instance for this pane.
    pub vt: Vt,
    /// PTY master file descriptor.
    pub master_fd: RawFd,
    /// Child process id, for liveness display only (the daemon reaps it).
    pub pid: i32,
    /// Current screen rectangle, set by the owning tab's `recalculate`.
    pub rect: Rect,
    /// Whether this pane is a floating overlay rather than a tiled pane.
    pub is_floating: bool,
    /// Whether this pane currently has keyboard focus.
    pub is_focused: bool,
    /// Whether the master fd has seen HUP and is awaiting cleanup.
    pub dead: bool,
}

impl Pane {
    /// Construct a daemon-owned pane.
    pub fn new_daemon(
        id: PaneId,
        daemon_uuid: HexId,
        master_fd: RawFd,
        pid: i32,
        cols: u16,
        rows: u16,
    ) -> Self {
        Self {
            id,
            daemon_uuid: Some(daemon_uuid),
            origin: PaneOrigin::Daemon,
            vt: Vt::new(cols, rows),
            master_fd,
            pid,
            rect: Rect::new(0, 0, cols, rows),
            is_floating: false,
            is_focused: false,
            dead: false,
        }
    }

    /// Resize this pane's VT to match a new rectangle.
    pub fn apply_rect(&mut self, rect: Rect) {
        if rect.width != self.rect.width || rect.height != self.rect.height {
            self.vt.resize(rect.width, rect.height);
        }
        self.rect = rect;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_rect_resizes_vt_on_dimension_change() {
        let mut pane = Pane::new_daemon(PaneId(0), HexId::new(), 3, 123, 80, 24);
        pane.apply_rect(Rect::new(0, 0, 40, 24));
        assert_eq!(pane.rect.width, 40);
    }
}
