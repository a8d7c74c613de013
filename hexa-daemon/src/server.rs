//! Daemon IPC server: accepts local connections, dispatches requests
//! against [`SessionState`], and multiplexes every connection through a
//! single `poll` call.
//!
//! Grounded on `alacritty_multiplexer::server::ServerState::handle_message`
//! for the dispatch shape and `alacritty/src/mux_server.rs`'s
//! nonblocking-listener `accept`/`process_client` split, generalized from
//! in-process panes and length-prefixed framing to real `SCM_RIGHTS`
//! fd-passing over newline-delimited JSON.

use std::collections::HashMap;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use hexa_protocol::{
    ClientSummary, DaemonStatus, HexId, PaneInfo, ProtocolError, PromptAnswer, Request, Response,
    SessionSummary,
};
use hexa_protocol::fdpass::{recv_frame_with_fd, send_frame_with_fd};
use hexa_protocol::framing::{FrameReader, write_frame};

use crate::config::HexaConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::pty;
use crate::session::{ClientId, NotifyTarget, PaneState, SessionState};

/// Per-pane sticky tags declared at `create_pane` time, kept outside
/// [`SessionState`] since the daemon only needs them at client-drop time.
type StickyTags = HashMap<HexId, (String, String)>;

struct Connection {
    stream: UnixStream,
    reader: FrameReader,
    client_id: ClientId,
}

/// Removes the control socket file on drop, so a crashed daemon doesn't
/// leave a stale bind target behind for the next run to trip over.
struct SocketGuard {
    path: PathBuf,
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// The running daemon: listener, session state, and the bookkeeping the
/// event loop needs between iterations.
pub struct Server {
    listener: UnixListener,
    _guard: SocketGuard,
    config: HexaConfig,
    state: SessionState,
    sticky_tags: StickyTags,
    connections: HashMap<RawFd, Connection>,
    last_sweep: std::time::Instant,
}

impl Server {
    /// Bind the control socket at `socket_path`, removing any stale file.
    pub fn bind(socket_path: &Path, config: HexaConfig) -> DaemonResult<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }
        let listener = UnixListener::bind(socket_path)?;
        listener.set_nonblocking(true)?;
        log::info!("listening on {}", socket_path.display());
        Ok(Self {
            listener,
            _guard: SocketGuard { path: socket_path.to_path_buf() },
            config,
            state: SessionState::new(),
            sticky_tags: HashMap::new(),
            connections: HashMap::new(),
            last_sweep: std::time::Instant::now(),
        })
    }

    /// Run the daemon's event loop until the process is killed.
    ///
    /// Each iteration: accept any pending connections, poll every connected
    /// fd plus the listener, service whichever are readable, and sweep
    /// expired orphan/sticky panes once per second.
    pub fn run(&mut self) -> DaemonResult<()> {
        loop {
            self.accept_pending()?;

            let mut pollfds: Vec<libc::pollfd> =
                self.connections.keys().map(|&fd| libc::pollfd { fd, events: libc::POLLIN, revents: 0 }).collect();
            pollfds.push(libc::pollfd {
                fd: self.listener.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            });

            // SAFETY: `pollfds` stays alive and correctly sized for the
            // duration of the call.
            let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as _, 1000) };
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(DaemonError::Io(err));
            }

            let readable: Vec<RawFd> = pollfds
                .iter()
                .filter(|p| p.fd != self.listener.as_raw_fd() && p.revents & libc::POLLIN != 0)
                .map(|p| p.fd)
                .collect();
            for fd in readable {
                self.service(fd);
            }

            if self.last_sweep.elapsed().as_secs() >= 1 {
                self.state.sweep_expired(self.config.orphan_timeout_secs);
                self.last_sweep = std::time::Instant::now();
            }
        }
    }

    fn accept_pending(&mut self) -> DaemonResult<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    stream.set_nonblocking(true)?;
                    let client_id = self.state.add_client();
                    let fd = stream.as_raw_fd();
                    self.connections.insert(fd, Connection { stream, reader: FrameReader::new(), client_id });
                    log::info!("client {client_id} connected");
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(DaemonError::Io(e)),
            }
        }
    }

    fn service(&mut self, fd: RawFd) {
        let Some(conn) = self.connections.get_mut(&fd) else { return };
        let client_id = conn.client_id;

        let mut stream_clone = match conn.stream.try_clone() {
            Ok(s) => s,
            Err(_) => return,
        };

        match conn.reader.read_frame::<Request, _>(&mut stream_clone) {
            Ok(Some(req)) => {
                for (resp, fd_to_send) in self.handle_request(client_id, req) {
                    self.reply(fd, resp, fd_to_send);
                }
            },
            Ok(None) => {},
            Err(ProtocolError::ConnectionClosed) => self.drop_connection(fd, client_id),
            Err(e) => {
                log::warn!("client {client_id}: {e}");
                self.reply(fd, Response::Error { message: e.to_string() }, None);
            },
        }
    }

    fn reply(&mut self, fd: RawFd, resp: Response, fd_to_send: Option<RawFd>) {
        let Some(conn) = self.connections.get(&fd) else { return };
        let result = match fd_to_send {
            Some(pty_fd) => send_frame_with_fd(&conn.stream, &resp, pty_fd),
            None => {
                let mut w = &conn.stream;
                write_frame(&mut w, &resp)
            },
        };
        if let Err(e) = result {
            log::warn!("write to client failed: {e}");
        }
    }

    fn drop_connection(&mut self, fd: RawFd, client_id: ClientId) {
        log::info!("client {client_id} disconnected");
        self.state.drop_client(client_id, &self.sticky_tags);
        self.connections.remove(&fd);
    }

    /// Dispatch one request, returning the ordered frames to send back to
    /// the caller. Almost every request produces exactly one reply frame;
    /// `reconnect` is the documented exception (§4.1): its primary reply
    /// lists which uuids were reconnected, followed by one fd-bearing frame
    /// per successfully reconnected pane.
    fn handle_request(&mut self, client_id: ClientId, req: Request) -> Vec<(Response, Option<RawFd>)> {
        if let Request::Reconnect { pane_uuids } = req {
            let mut reconnected = Vec::new();
            for uuid in pane_uuids {
                if self.state.adopt_pane(uuid, client_id).is_ok() {
                    reconnected.push(uuid);
                }
            }
            let mut frames = vec![(Response::Reconnected { uuids: reconnected.clone() }, None)];
            for uuid in reconnected {
                let fd = self.state.panes[&uuid].master_fd;
                frames.push((Response::PaneFound { uuid }, Some(fd)));
            }
            return frames;
        }
        vec![self.dispatch_single(client_id, req)]
    }

    fn dispatch_single(&mut self, client_id: ClientId, req: Request) -> (Response, Option<RawFd>) {
        match req {
            Request::Ping => (Response::Pong, None),
            Request::Status { full } => (self.build_status(full), None),
            Request::Register { session_id, session_name, keepalive } => {
                if let Some(c) = self.state.clients.get_mut(&client_id) {
                    c.session_id = Some(session_id);
                    c.session_name = Some(session_name);
                    c.keepalive = keepalive;
                }
                (Response::Registered, None)
            },
            Request::SyncState { mux_state } => {
                if let Some(c) = self.state.clients.get_mut(&client_id) {
                    c.mux_state = Some(mux_state);
                }
                (Response::StateSynced, None)
            },
            Request::CreatePane { shell, cwd, sticky_pwd, sticky_key } => {
                self.create_pane(client_id, shell, cwd, sticky_pwd, sticky_key)
            },
            Request::FindSticky { pwd, key } => match self.state.find_sticky(client_id, &pwd, &key) {
                Some(uuid) => {
                    let fd = self.state.panes[&uuid].master_fd;
                    (Response::PaneFound { uuid }, Some(fd))
                },
                None => (Response::PaneNotFound { uuid: HexId::new() }, None),
            },
            Request::Reconnect { .. } => {
                unreachable!("handle_request intercepts Reconnect before dispatch_single")
            },
            Request::Disconnect => {
                self.state.disconnect_client(client_id);
                (Response::Ok, None)
            },
            Request::OrphanPane { uuid } => match self.state.orphan_pane(uuid) {
                Ok(()) => (Response::Ok, None),
                Err(e) => (Response::Error { message: e.to_string() }, None),
            },
            Request::ListOrphaned => (Response::OrphanedPanes { uuids: self.state.list_orphaned() }, None),
            Request::AdoptPane { uuid } => match self.state.adopt_pane(uuid, client_id) {
                Ok(()) => {
                    let fd = self.state.panes[&uuid].master_fd;
                    (Response::PaneFound { uuid }, Some(fd))
                },
                Err(e) => (Response::Error { message: e.to_string() }, None),
            },
            Request::KillPane { uuid } => match self.state.kill_pane(uuid) {
                Ok(()) => (Response::Ok, None),
                Err(e) => (Response::Error { message: e.to_string() }, None),
            },
            Request::DetachSession { session_id, mux_state } => {
                let name =
                    self.state.clients.get(&client_id).and_then(|c| c.session_name.clone()).unwrap_or_default();
                self.state.detach_session(client_id, session_id, name, mux_state);
                (Response::SessionDetached { session_id }, None)
            },
            Request::Reattach { session_id } => match self.state.reattach(&session_id) {
                Ok(snapshot) => (
                    Response::SessionReattached {
                        session_id: snapshot.session_id,
                        mux_state: snapshot.mux_state,
                        pane_uuids: snapshot.pane_uuids,
                    },
                    None,
                ),
                Err(e) => (Response::Error { message: e.to_string() }, None),
            },
            Request::ListSessions => {
                let sessions = self
                    .state
                    .list_sessions()
                    .map(|s| SessionSummary {
                        session_id: s.session_id,
                        session_name: s.session_name.clone(),
                        pane_uuids: s.pane_uuids.clone(),
                        detached_at_ms: s.detached_at,
                    })
                    .collect();
                (Response::Sessions { sessions }, None)
            },
            Request::PaneInfo { uuid } => match self.state.panes.get(&uuid) {
                Some(pane) => (
                    Response::PaneInfo {
                        info: PaneInfo {
                            uuid,
                            state: state_label(&pane.state).to_string(),
                            pid: Some(pane.pid as u32),
                            created_at_ms: pane.created_at,
                        },
                    },
                    None,
                ),
                None => (Response::PaneNotFound { uuid }, None),
            },
            Request::UpdatePaneAux { uuid, is_float, is_focused, pane_type, created_from, focused_from } => {
                if let Some(pane) = self.state.panes.get_mut(&uuid) {
                    if let Some(v) = is_float {
                        pane.is_floating = v;
                    }
                    if let Some(v) = is_focused {
                        pane.is_focused = v;
                    }
                    if let Some(v) = pane_type {
                        pane.pane_type = Some(v);
                    }
                    if let Some(v) = created_from {
                        pane.created_from = Some(v);
                    }
                    if let Some(v) = focused_from {
                        pane.focused_from = Some(v);
                    }
                }
                (Response::Ok, None)
            },
            Request::BroadcastNotify { message } => {
                self.broadcast(Response::Notification { message });
                (Response::Ok, None)
            },
            Request::TargetedNotify { uuid, message } => {
                self.deliver_notify(&uuid, &message);
                (Response::Ok, None)
            },
            Request::PopConfirm { uuid, message } | Request::PopChoose { uuid, message, .. } => {
                self.forward_prompt(client_id, &uuid, message);
                (Response::Ok, None)
            },
            Request::PopResponse { answer } => {
                self.forward_response(client_id, answer);
                (Response::Ok, None)
            },
        }
    }

    fn build_status(&self, full: bool) -> Response {
        let clients = self
            .state
            .clients
            .iter()
            .map(|(&id, c)| ClientSummary {
                client_id: id,
                session_id: c.session_id,
                session_name: c.session_name.clone(),
                panes: if full { c.panes.clone() } else { Vec::new() },
            })
            .collect();
        Response::Status {
            status: DaemonStatus {
                clients,
                pane_count: self.state.panes.len(),
                detached_session_count: self.state.detached_sessions.len(),
            },
        }
    }

    fn create_pane(
        &mut self,
        client_id: ClientId,
        shell: Option<String>,
        cwd: Option<String>,
        sticky_pwd: Option<String>,
        sticky_key: Option<String>,
    ) -> (Response, Option<RawFd>) {
        let shell = shell.unwrap_or_else(|| self.config.default_shell.clone());
        match pty::spawn(&shell, cwd.as_deref()) {
            Ok(spawned) => {
                let uuid = self.state.register_pane(client_id, spawned.master_fd, spawned.pid);
                if let (Some(pwd), Some(key)) = (sticky_pwd, sticky_key) {
                    self.sticky_tags.insert(uuid, (pwd, key));
                }
                (Response::PaneCreated { uuid }, Some(spawned.master_fd))
            },
            Err(e) => (Response::Error { message: e.to_string() }, None),
        }
    }

    fn broadcast(&mut self, resp: Response) {
        let fds: Vec<RawFd> = self.connections.keys().copied().collect();
        for fd in fds {
            self.reply(fd, resp.clone(), None);
        }
    }

    fn deliver_notify(&mut self, uuid_or_prefix: &str, message: &str) {
        match self.state.resolve_notify_target(uuid_or_prefix) {
            NotifyTarget::Session(client) => {
                if let Some(fd) = self.fd_for_client(client) {
                    self.reply(fd, Response::Notification { message: message.to_string() }, None);
                }
            },
            NotifyTarget::Pane(client) => {
                let uuid = self
                    .state
                    .clients
                    .get(&client)
                    .and_then(|c| c.panes.iter().find(|p| p.has_prefix(uuid_or_prefix)))
                    .copied();
                if let (Some(fd), Some(uuid)) = (self.fd_for_client(client), uuid) {
                    self.reply(fd, Response::PaneNotification { uuid, message: message.to_string() }, None);
                }
            },
            NotifyTarget::Broadcast => {
                self.broadcast(Response::TabNotification { message: message.to_string() });
            },
            NotifyTarget::None => {
                log::debug!("no target resolved for notify prefix {uuid_or_prefix}");
            },
        }
    }

    fn forward_prompt(&mut self, helper: ClientId, uuid_or_prefix: &str, message: String) {
        let target = match self.state.resolve_notify_target(uuid_or_prefix) {
            NotifyTarget::Session(c) | NotifyTarget::Pane(c) => Some(c),
            _ => None,
        };
        let Some(target) = target else {
            return;
        };
        self.state.pending_prompts.insert(target, helper);
        if let Some(fd) = self.fd_for_client(target) {
            self.reply(fd, Response::Notification { message }, None);
        }
    }

    fn forward_response(&mut self, from: ClientId, answer: PromptAnswer) {
        if let Some(&helper) = self.state.pending_prompts.get(&from) {
            if let Some(fd) = self.fd_for_client(helper) {
                let message = match answer {
                    PromptAnswer::Confirmed(v) => format!("confirmed:{v}"),
                    PromptAnswer::Selected(i) => format!("selected:{i}"),
                    PromptAnswer::Cancelled => "cancelled".to_string(),
                };
                self.reply(fd, Response::Notification { message }, None);
            }
            self.state.pending_prompts.remove(&from);
        }
    }

    fn fd_for_client(&self, client_id: ClientId) -> Option<RawFd> {
        self.connections.iter().find(|(_, c)| c.client_id == client_id).map(|(&fd, _)| fd)
    }
}

fn state_label(state: &PaneState) -> &'static str {
    match state {
        PaneState::Attached { .. } => "attached",
        PaneState::Detached { .. } => "detached",
        PaneState::Sticky { .. } => "sticky",
        PaneState::Orphaned { .. } => "orphaned",
    }
}

/// Connect to a running daemon and issue a single request/response
/// round-trip, for `--list`/`--notify`.
pub fn quick_request(socket_path: &Path, req: &Request) -> DaemonResult<Response> {
    let stream = UnixStream::connect(socket_path)?;
    let mut writer = &stream;
    write_frame(&mut writer, req)?;
    let mut reader = FrameReader::new();
    let mut reader_stream = stream.try_clone()?;
    loop {
        if let Some(resp) = reader.read_frame(&mut reader_stream)? {
            return Ok(resp);
        }
    }
}

#[allow(dead_code)]
fn recv_any_fd_reply(stream: &UnixStream) -> DaemonResult<(Response, RawFd)> {
    let (resp, fd): (Response, _) = recv_frame_with_fd(stream)?;
    use std::os::fd::IntoRawFd;
    Ok((resp, fd.into_raw_fd()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn status_reflects_pane_and_client_counts() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("ses.sock");
        let mut server = Server::bind(&sock, HexaConfig::default()).unwrap();
        let client = server.state.add_client();
        server.state.register_pane(client, 3, 1);
        match server.build_status(true) {
            Response::Status { status } => {
                assert_eq!(status.pane_count, 1);
                assert_eq!(status.clients.len(), 1);
            },
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn status_full_includes_panes_non_full_omits_them() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("ses.sock");
        let mut server = Server::bind(&sock, HexaConfig::default()).unwrap();
        let client = server.state.add_client();
        server.state.register_pane(client, 3, 1);

        match server.build_status(true) {
            Response::Status { status } => assert_eq!(status.clients[0].panes.len(), 1),
            _ => panic!("wrong variant"),
        }
        match server.build_status(false) {
            Response::Status { status } => assert!(status.clients[0].panes.is_empty()),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn dropped_client_goes_through_drop_client_path() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("ses.sock");
        let mut server = Server::bind(&sock, HexaConfig::default()).unwrap();
        let client = server.state.add_client();
        let id = server.state.register_pane(client, 3, 1);
        server.state.drop_client(client, &HashMap::new());
        assert!(matches!(server.state.panes[&id].state, PaneState::Orphaned { .. }));
    }

    #[test]
    fn reconnect_emits_one_fd_bearing_frame_per_pane() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("ses.sock");
        let mut server = Server::bind(&sock, HexaConfig::default()).unwrap();
        let owner = server.state.add_client();
        let p1 = server.state.register_pane(owner, 3, 100);
        let p2 = server.state.register_pane(owner, 4, 101);
        server.state.drop_client(owner, &HashMap::new());

        let new_client = server.state.add_client();
        let frames = server.handle_request(
            new_client,
            Request::Reconnect { pane_uuids: vec![p1, p2] },
        );

        assert_eq!(frames.len(), 3);
        match &frames[0].0 {
            Response::Reconnected { uuids } => {
                assert_eq!(uuids.len(), 2);
            },
            other => panic!("unexpected first frame: {other:?}"),
        }
        for (resp, fd) in &frames[1..] {
            assert!(matches!(resp, Response::PaneFound { .. }));
            assert!(fd.is_some());
        }
    }

    #[test]
    fn reconnect_skips_non_orphaned_panes() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("ses.sock");
        let mut server = Server::bind(&sock, HexaConfig::default()).unwrap();
        let owner = server.state.add_client();
        let attached_pane = server.state.register_pane(owner, 3, 100);

        let other_client = server.state.add_client();
        let frames = server.handle_request(
            other_client,
            Request::Reconnect { pane_uuids: vec![attached_pane] },
        );

        assert_eq!(frames.len(), 1);
        match &frames[0].0 {
            Response::Reconnected { uuids } => assert!(uuids.is_empty()),
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
