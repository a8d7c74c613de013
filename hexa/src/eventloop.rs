//! The frontend's single-threaded event loop: one `poll` call multiplexing
//! stdin, every visible pane's master fd, and the daemon connection.
//!
//! Grounded on `alacritty/src/mux_server.rs`'s accept/process-client loop
//! structure and `alacritty/src/mux_actions.rs`'s `execute_command` dispatch
//! shape, generalized from a GUI-driven render trigger to the raw `poll`
//! loop of spec §4.7; the `libc::pollfd` vector idiom matches
//! `hexa_daemon::server::Server::run`.

use std::collections::HashMap;
use std::os::fd::{IntoRawFd, RawFd};
use std::time::{Duration, Instant};

use hexa_protocol::Response;

use crate::cellbuffer::{Cell, CellBuffer, ColorSpec};
use crate::command::MuxCommand;
use crate::config::MuxConfig;
use crate::error::{FrontendError, FrontendResult};
use crate::ipc_client::IpcClient;
use crate::input::{MuxAction, MuxInputState, process_input};
use crate::layout::{Direction, PaneId};
use crate::notify::{Notification, NotifyPosition, NotifyQueue, NotifyStyle};
use crate::overlay::{ToggleOutcome, toggle_sticky};
use crate::pane::Pane;
use crate::rect::Rect;
use crate::renderer::Renderer;
use crate::session::Session;
use crate::statusbar::{build_status, render_status_line};

const MAX_POLL_FDS: usize = 256;
const PANE_READ_CHUNK: usize = 32 * 1024;
const STDIN_FD: RawFd = 0;

/// Everything the event loop owns for the lifetime of one run.
pub struct EventLoop {
    session: Session,
    config: MuxConfig,
    client: IpcClient,
    buffer: CellBuffer,
    renderer: Renderer,
    notify: NotifyQueue,
    input_state: MuxInputState,
    bindings: HashMap<String, MuxCommand>,
    last_paint: Instant,
    terminal_cols: u16,
    terminal_rows: u16,
    running: bool,
}

impl EventLoop {
    /// Build a fresh event loop around an already-registered IPC client and
    /// a session with at least its first pane installed.
    pub fn new(session: Session, config: MuxConfig, client: IpcClient, cols: u16, rows: u16) -> Self {
        let bindings = config.keybindings.to_bindings_map();
        Self {
            session,
            config,
            client,
            buffer: CellBuffer::new(cols as usize, rows as usize),
            renderer: Renderer::new(),
            notify: NotifyQueue::new(),
            input_state: MuxInputState::Normal,
            bindings,
            last_paint: Instant::now(),
            terminal_cols: cols,
            terminal_rows: rows,
            running: true,
        }
    }

    /// Run until `quit` is dispatched or stdin/the daemon connection dies.
    pub fn run(&mut self) -> FrontendResult<()> {
        while self.running {
            self.tick()?;
        }
        Ok(())
    }

    fn tick(&mut self) -> FrontendResult<()> {
        // Step 1: resize detection.
        if let Some((cols, rows)) = poll_terminal_size(self.terminal_cols, self.terminal_rows) {
            self.handle_resize(cols, rows);
        }

        // Step 2: sweep dead floating overlays.
        self.sweep_dead_overlays();

        // Step 3: sweep dead tiled panes in the focused tab.
        self.sweep_dead_tiled_panes()?;

        // Step 4: build the poll set.
        let watch_fds = self.visible_pane_fds();
        let mut pollfds = Vec::with_capacity(watch_fds.len() + 2);
        pollfds.push(libc::pollfd { fd: STDIN_FD, events: libc::POLLIN, revents: 0 });
        pollfds.push(libc::pollfd { fd: self.client.fd(), events: libc::POLLIN, revents: 0 });
        for fd in &watch_fds {
            if pollfds.len() >= MAX_POLL_FDS {
                log::warn!("pane fd watch list exceeds {MAX_POLL_FDS}, dropping excess");
                break;
            }
            pollfds.push(libc::pollfd { fd: *fd, events: libc::POLLIN, revents: 0 });
        }

        // Step 5: poll with a frame-budget timeout.
        let timeout_ms = self.poll_timeout_ms();
        // SAFETY: `pollfds` is a live, correctly sized buffer for the
        // duration of this call.
        let rc = unsafe {
            libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout_ms as libc::c_int)
        };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(FrontendError::Io(err));
        }

        let mut needs_render = false;

        // Step 6: stdin readiness.
        if pollfds[0].revents & libc::POLLIN != 0 {
            needs_render |= self.handle_stdin()?;
        }

        if pollfds[1].revents & libc::POLLIN != 0 {
            needs_render |= self.handle_daemon_readable();
        }

        // Steps 7-8: pane fd readiness / HUP.
        for pfd in &pollfds[2..] {
            if pfd.revents & libc::POLLIN != 0 {
                needs_render |= self.handle_pane_readable(pfd.fd);
            }
            if pfd.revents & (libc::POLLHUP | libc::POLLERR) != 0 {
                self.mark_dead(pfd.fd);
            }
        }

        needs_render |= self.notify.update(now_ms());

        // Step 9: render if due.
        if needs_render && self.last_paint.elapsed() >= Duration::from_millis(self.config.frame_interval_ms())
        {
            self.render()?;
        }

        Ok(())
    }

    fn poll_timeout_ms(&self) -> u64 {
        let elapsed = self.last_paint.elapsed().as_millis() as u64;
        let interval = self.config.frame_interval_ms();
        if elapsed >= interval { 0 } else { (interval - elapsed).min(100) }
    }

    fn visible_pane_fds(&self) -> Vec<RawFd> {
        let mut fds: Vec<RawFd> = self
            .session
            .active_tab()
            .pane_order()
            .into_iter()
            .filter_map(|id| self.session.panes.get(&id))
            .filter(|p| !p.dead)
            .map(|p| p.master_fd)
            .collect();

        for overlay in self.session.floating.iter().filter(|o| o.visible) {
            if let Some(pane) = self.session.panes.get(&overlay.pane_id) {
                if !pane.dead {
                    fds.push(pane.master_fd);
                }
            }
        }
        fds
    }

    fn handle_resize(&mut self, cols: u16, rows: u16) {
        self.terminal_cols = cols;
        self.terminal_rows = rows;
        self.buffer.resize(cols as usize, rows as usize);
        // Pane rects and their PTYs' kernel-side winsize are brought in sync
        // with the new layout on the next `render` call.
    }

    fn drawable_area(&self) -> Rect {
        let status_rows = if self.config.status_bar { 1 } else { 0 };
        Rect::new(0, 0, self.terminal_cols, self.terminal_rows.saturating_sub(status_rows))
    }

    fn sweep_dead_overlays(&mut self) {
        let dead: Vec<PaneId> = self
            .session
            .floating
            .iter()
            .filter(|o| self.session.panes.get(&o.pane_id).is_none_or(|p| p.dead))
            .map(|o| o.pane_id)
            .collect();

        if dead.is_empty() {
            return;
        }

        if let Some(active) = self.session.active_floating {
            if let Some(overlay) = self.session.floating.get(active) {
                if dead.contains(&overlay.pane_id) {
                    self.session.active_floating = None;
                }
            }
        }

        self.session.floating.retain(|o| !dead.contains(&o.pane_id));
        for id in dead {
            self.session.panes.remove(&id);
        }
    }

    fn sweep_dead_tiled_panes(&mut self) -> FrontendResult<()> {
        loop {
            let dead_in_focused = self
                .session
                .active_tab()
                .pane_order()
                .into_iter()
                .find(|id| self.session.panes.get(id).is_some_and(|p| p.dead));

            let Some(dead_id) = dead_in_focused else { return Ok(()) };

            if self.session.active_tab().pane_order().len() > 1 {
                self.session.active_tab_mut().close_focused().ok();
                self.session.panes.remove(&dead_id);
                self.buffer.mark_force_full();
                continue;
            }

            if self.session.tabs.len() > 1 {
                self.session.close_active_tab()?;
                self.buffer.mark_force_full();
                continue;
            }

            self.session.panes.remove(&dead_id);
            self.running = false;
            return Ok(());
        }
    }

    fn mark_dead(&mut self, fd: RawFd) {
        for pane in self.session.panes.values_mut() {
            if pane.master_fd == fd {
                pane.dead = true;
            }
        }
    }

    fn handle_stdin(&mut self) -> FrontendResult<bool> {
        let mut buf = [0u8; 4096];
        // SAFETY: `buf` is large enough for any single `read` return and
        // stays valid for the call's duration.
        let n = unsafe { libc::read(STDIN_FD, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n <= 0 {
            self.running = false;
            return Ok(false);
        }

        let pane_is_scrolled =
            self.session.focused_pane().map(|p| p.vt.is_scrolled()).unwrap_or(false);
        let actions = process_input(
            &mut self.input_state,
            &buf[..n as usize],
            &self.config.leader,
            &self.bindings,
            pane_is_scrolled,
        );

        let mut needs_render = false;
        for action in actions {
            needs_render |= self.apply_action(action)?;
        }
        Ok(needs_render)
    }

    fn apply_action(&mut self, action: MuxAction) -> FrontendResult<bool> {
        match action {
            MuxAction::Command(cmd) => {
                self.execute_command(cmd)?;
                Ok(true)
            },
            MuxAction::Forward(bytes) => {
                self.write_to_focused(&bytes);
                Ok(false)
            },
            MuxAction::Scroll(delta) => {
                if let Some(pane) = self.session.focused_pane_mut() {
                    if delta == i64::MIN {
                        pane.vt.scroll_to_top();
                    } else if delta == i64::MAX {
                        pane.vt.scroll_to_bottom();
                    } else if delta < 0 {
                        pane.vt.scroll_up(delta.unsigned_abs() as usize);
                    } else {
                        pane.vt.scroll_down(delta as usize);
                    }
                }
                Ok(true)
            },
            MuxAction::ScrollToBottomThenForward(bytes) => {
                if let Some(pane) = self.session.focused_pane_mut() {
                    pane.vt.scroll_to_bottom();
                }
                self.write_to_focused(&bytes);
                Ok(true)
            },
        }
    }

    fn write_to_focused(&mut self, bytes: &[u8]) {
        let Some(pane) = self.session.focused_pane() else { return };
        let fd = pane.master_fd;
        // SAFETY: `bytes` stays valid for the call's duration; a write
        // error (e.g. the pane just HUP'd) is harmless to ignore here, the
        // next poll iteration's HUP check will clean the pane up.
        unsafe {
            libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len());
        }
    }

    fn execute_command(&mut self, cmd: MuxCommand) -> FrontendResult<()> {
        match cmd {
            MuxCommand::SplitHorizontal => self.split(Direction::Horizontal)?,
            MuxCommand::SplitVertical => self.split(Direction::Vertical)?,
            MuxCommand::ClosePane => self.close_focused()?,
            MuxCommand::NextPane => self.session.active_tab_mut().focus_next(),
            MuxCommand::PrevPane => self.session.active_tab_mut().focus_prev(),
            MuxCommand::NewTab => {
                let name = format!("tab{}", self.session.tabs.len());
                self.session.new_tab(name);
                self.split_into_new_tab()?;
            },
            MuxCommand::CloseTab => self.session.close_active_tab()?,
            MuxCommand::NextTab => self.session.next_tab(),
            MuxCommand::PrevTab => self.session.prev_tab(),
            MuxCommand::SwitchToTab(n) => {
                if (n as usize) < self.session.tabs.len() {
                    self.session.active_tab = n as usize;
                }
            },
            MuxCommand::RenameTab(name) => self.session.active_tab_mut().name = name,
            MuxCommand::DetachSession => self.detach()?,
            MuxCommand::ToggleStickyFloat(key) => self.toggle_float(key)?,
            MuxCommand::ResizePane(direction, delta) => {
                self.session.active_tab_mut().resize_focused(direction, delta as f32 / 100.0);
            },
            MuxCommand::ScrollbackMode => {
                if let Some(pane) = self.session.focused_pane_mut() {
                    pane.vt.scroll_up(self.terminal_rows.max(1) as usize);
                }
            },
            MuxCommand::Quit => self.running = false,
        }
        self.buffer.mark_force_full();
        Ok(())
    }

    fn split(&mut self, direction: Direction) -> FrontendResult<()> {
        let (uuid, fd) = self.client.create_pane(None, None, None, None)?;
        let pane_id = self.session.allocate_pane_id();
        let pane = Pane::new_daemon(
            pane_id,
            uuid,
            fd.into_raw_fd(),
            0,
            self.terminal_cols.max(1),
            self.terminal_rows.max(1),
        );
        self.session.split_focused(direction, pane)?;
        Ok(())
    }

    fn split_into_new_tab(&mut self) -> FrontendResult<()> {
        let (uuid, fd) = self.client.create_pane(None, None, None, None)?;
        let pane_id = self.session.allocate_pane_id();
        let pane = Pane::new_daemon(
            pane_id,
            uuid,
            fd.into_raw_fd(),
            0,
            self.terminal_cols.max(1),
            self.terminal_rows.max(1),
        );
        self.session.install_pane(pane);
        Ok(())
    }

    fn close_focused(&mut self) -> FrontendResult<()> {
        if self.session.active_tab().pane_order().len() == 1 {
            return Ok(());
        }
        self.session.close_focused()?;
        Ok(())
    }

    fn toggle_float(&mut self, key: u8) -> FrontendResult<()> {
        let focused_cwd = self.session.focused_pane().and_then(|p| p.vt.cwd().map(String::from));
        match toggle_sticky(&mut self.session.floating, key, focused_cwd.as_deref(), true) {
            ToggleOutcome::Toggled(_) => Ok(()),
            ToggleOutcome::NotFound => {
                let (uuid, fd) = self.client.create_pane(None, None, None, None)?;
                let pane_id = self.session.allocate_pane_id();
                let pane = Pane::new_daemon(
                    pane_id,
                    uuid,
                    fd.into_raw_fd(),
                    0,
                    self.terminal_cols.max(1),
                    self.terminal_rows.max(1),
                );
                self.session.panes.insert(pane_id, pane);
                self.session.floating.push(crate::overlay::FloatingOverlay {
                    pane_id,
                    width_percent: 0.6,
                    height_percent: 0.6,
                    x_percent: 0.2,
                    y_percent: 0.2,
                    border_color: ColorSpec::None,
                    padding: 0,
                    trigger_key: key,
                    sticky_cwd: focused_cwd,
                    visible: true,
                });
                Ok(())
            },
        }
    }

    fn detach(&mut self) -> FrontendResult<()> {
        self.client.detach_session(self.session.session_id, "{}")?;
        self.running = false;
        Ok(())
    }

    /// Drain push frames (`notification`/`pane_notification`/
    /// `tab_notification`) waiting on the daemon connection and enqueue
    /// them for display. Returns `true` if anything was enqueued.
    fn handle_daemon_readable(&mut self) -> bool {
        let mut queued = false;
        loop {
            match self.client.try_recv_push() {
                Ok(Some(resp)) => {
                    if let Some(note) = notification_from_response(resp) {
                        self.notify.push(note);
                        queued = true;
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    log::warn!("error reading daemon push frame: {e}");
                    break;
                },
            }
        }
        queued
    }

    fn handle_pane_readable(&mut self, fd: RawFd) -> bool {
        let mut buf = [0u8; PANE_READ_CHUNK];
        // SAFETY: `buf` is sized for the call and stays valid for its
        // duration.
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n <= 0 {
            self.mark_dead(fd);
            return n == 0;
        }

        let mut force_full = false;
        for pane in self.session.panes.values_mut() {
            if pane.master_fd == fd {
                pane.vt.feed(&buf[..n as usize]);
                if pane.vt.take_full_clear() {
                    force_full = true;
                }
            }
        }
        if force_full {
            self.buffer.mark_force_full();
        }
        true
    }

    fn render(&mut self) -> FrontendResult<()> {
        self.buffer.begin_frame();
        let area = self.drawable_area();

        let rects = self.session.active_tab().recalculate(area);
        for (id, rect) in &rects {
            if let Some(pane) = self.session.panes.get_mut(id) {
                pane.apply_rect(*rect);
                let _ = sync_pty_winsize(pane);
            }
        }
        for (id, rect) in &rects {
            if let Some(pane) = self.session.panes.get(id) {
                compose_pane(&mut self.buffer, pane, *rect);
            }
        }

        for overlay in &self.session.floating {
            if let Some(pane) = self.session.panes.get_mut(&overlay.pane_id) {
                let inner = overlay.inner_rect(area);
                pane.apply_rect(inner);
                let _ = sync_pty_winsize(pane);
            }
        }
        for overlay in self.session.floating.iter().filter(|o| o.visible) {
            if let Some(pane) = self.session.panes.get(&overlay.pane_id) {
                let inner = overlay.inner_rect(area);
                compose_pane(&mut self.buffer, pane, inner);
            }
        }

        if self.config.status_bar {
            let content = build_status(&self.session);
            let line = render_status_line(&content, self.terminal_cols as usize);
            for (x, ch) in line.chars().enumerate() {
                self.buffer.set_cell(x, area.height as usize, Cell { ch, ..Cell::default() });
            }
        }

        if let Some(note) = self.notify.active() {
            compose_notification(&mut self.buffer, note, area);
        }

        let (cursor, shape, visible) = self
            .session
            .focused_pane()
            .map(|p| {
                let (col, row) = p.vt.cursor_position();
                ((p.rect.x + col, p.rect.y + row), p.vt.cursor_shape(), p.vt.cursor_visible())
            })
            .unwrap_or(((0, 0), 0, true));

        let mut stdout = std::io::stdout();
        self.renderer.render_frame(&mut stdout, &mut self.buffer, cursor, shape, visible)?;
        self.last_paint = Instant::now();
        Ok(())
    }
}

fn compose_pane(buf: &mut CellBuffer, pane: &Pane, rect: Rect) {
    let screen = pane.vt.screen();
    for row in 0..rect.height {
        for col in 0..rect.width {
            let Some(vt_cell) = screen.cell(row, col) else { continue };
            let ch = vt_cell.contents().chars().next().unwrap_or(' ');
            let cell = Cell {
                ch,
                fg: color_spec(vt_cell.fgcolor()),
                bg: color_spec(vt_cell.bgcolor()),
                bold: vt_cell.bold(),
                faint: false,
                italic: vt_cell.italic(),
                underline: vt_cell.underline(),
                blink: false,
                inverse: vt_cell.inverse(),
                invisible: false,
                strikethrough: false,
            };
            buf.set_cell((rect.x + col) as usize, (rect.y + row) as usize, cell);
        }
    }
}

fn color_spec(color: vt100::Color) -> ColorSpec {
    match color {
        vt100::Color::Default => ColorSpec::None,
        vt100::Color::Idx(n) => ColorSpec::Indexed(n),
        vt100::Color::Rgb(r, g, b) => ColorSpec::Rgb(r, g, b),
    }
}

/// Map a daemon push frame to a displayable notification, or `None` for
/// anything that isn't one (an RPC reply arriving out of band, which
/// shouldn't happen given the synchronous call/response pairing but is
/// safe to drop rather than panic on).
fn notification_from_response(resp: Response) -> Option<Notification> {
    let (text, position) = match resp {
        Response::Notification { message } => (message, NotifyPosition::Top),
        Response::TabNotification { message } => (message, NotifyPosition::Top),
        Response::PaneNotification { uuid, message } => {
            (format!("[{uuid}] {message}"), NotifyPosition::Pane)
        },
        _ => return None,
    };
    Some(Notification {
        text,
        expires_at_ms: now_ms() + crate::notify::DEFAULT_DURATION_MS,
        position,
        style: NotifyStyle::Info,
    })
}

fn compose_notification(buf: &mut CellBuffer, note: &Notification, area: Rect) {
    let (x, y) = match note.position {
        NotifyPosition::Top => (0u16, 0u16),
        NotifyPosition::Pane => (0u16, area.height.saturating_sub(2)),
    };
    let fg = match note.style {
        NotifyStyle::Info => ColorSpec::Indexed(15),
        NotifyStyle::Warning => ColorSpec::Indexed(11),
        NotifyStyle::Error => ColorSpec::Indexed(9),
    };
    for (i, ch) in note.text.chars().enumerate() {
        if i as u16 >= area.width {
            break;
        }
        buf.set_cell(
            (x + i as u16) as usize,
            y as usize,
            Cell { ch, fg, bg: ColorSpec::Indexed(0), bold: true, ..Cell::default() },
        );
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Read the current terminal size via `TIOCGWINSZ` on stdin; returns
/// `Some((cols, rows))` only when it differs from the previously known size.
fn poll_terminal_size(known_cols: u16, known_rows: u16) -> Option<(u16, u16)> {
    let mut size: libc::winsize = unsafe { std::mem::zeroed() };
    // SAFETY: `size` is zero-initialized and fully sized for the ioctl.
    let rc = unsafe { libc::ioctl(STDIN_FD, libc::TIOCGWINSZ, &mut size) };
    if rc != 0 {
        return None;
    }
    if size.ws_col == known_cols && size.ws_row == known_rows {
        return None;
    }
    Some((size.ws_col, size.ws_row))
}

/// Propagate a pane's new rectangle to the daemon-owned PTY's kernel-side
/// window size, so the child process's own `TIOCGWINSZ` reads match.
fn sync_pty_winsize(pane: &Pane) -> std::io::Result<()> {
    let ws = libc::winsize {
        ws_row: pane.rect.height,
        ws_col: pane.rect.width,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    // SAFETY: `pane.master_fd` is a live PTY master and `ws` is fully
    // initialized.
    let rc = unsafe { libc::ioctl(pane.master_fd, libc::TIOCSWINSZ, &ws) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_spec_maps_all_variants() {
        assert_eq!(color_spec(vt100::Color::Default), ColorSpec::None);
        assert_eq!(color_spec(vt100::Color::Idx(4)), ColorSpec::Indexed(4));
        assert_eq!(color_spec(vt100::Color::Rgb(1, 2, 3)), ColorSpec::Rgb(1, 2, 3));
    }

    #[test]
    fn notification_from_response_maps_pushed_variants() {
        let broadcast = notification_from_response(Response::Notification { message: "hi".into() });
        assert_eq!(broadcast.unwrap().position, NotifyPosition::Top);

        let tab = notification_from_response(Response::TabNotification { message: "hi".into() });
        assert_eq!(tab.unwrap().position, NotifyPosition::Top);

        let uuid = hexa_protocol::HexId::new();
        let pane = notification_from_response(Response::PaneNotification { uuid, message: "hi".into() });
        let pane = pane.unwrap();
        assert_eq!(pane.position, NotifyPosition::Pane);
        assert!(pane.text.contains("hi"));
    }

    #[test]
    fn notification_from_response_ignores_non_push_frames() {
        assert!(notification_from_response(Response::Pong).is_none());
    }
}
