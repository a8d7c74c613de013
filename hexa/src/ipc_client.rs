//! The frontend half of the daemon IPC protocol: connect (spawning the
//! daemon if it isn't running), request/response framing, and fd receipt.
//!
//! Grounded on `alacritty/src/mux_client.rs`'s `MuxClient` (connect/
//! attach/detach/send_command shape) and
//! `other_examples/beb19097_vimo-ai-ETerm__rio-sugarloaf-ffi-src-app-daemon_client.rs.rs`'s
//! `DaemonClient` (spawn-daemon-if-absent, `recv_fd` companion to a plain
//! frame read). Per the transport contract (`hexa_protocol::fdpass`), a
//! response documented to carry a file descriptor must be read with
//! `recv_frame_with_fd` directly off the stream, never through the buffered
//! [`FrameReader`] used for plain responses — mixing the two would desync
//! the fd from its announcing payload.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use hexa_protocol::fdpass::recv_frame_with_fd;
use hexa_protocol::framing::{FrameReader, write_frame};
use hexa_protocol::{HexId, Request, Response};

use crate::error::{FrontendError, FrontendResult};

/// A connection to the session daemon's control socket.
pub struct IpcClient {
    stream: UnixStream,
    reader: FrameReader,
}

impl IpcClient {
    /// Connect to the daemon at `socket_path`, spawning `hexa-daemon -d` and
    /// retrying briefly if nothing is listening yet.
    pub fn connect_or_spawn(socket_path: &Path) -> FrontendResult<Self> {
        if let Ok(stream) = UnixStream::connect(socket_path) {
            return Ok(Self::from_stream(stream));
        }

        log::info!("no daemon at {}, spawning one", socket_path.display());
        spawn_daemon()?;

        let mut last_err = None;
        for _ in 0..50 {
            match UnixStream::connect(socket_path) {
                Ok(stream) => return Ok(Self::from_stream(stream)),
                Err(e) => last_err = Some(e),
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        Err(FrontendError::DaemonUnreachable(
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "timed out".into()),
        ))
    }

    fn from_stream(stream: UnixStream) -> Self {
        Self { stream, reader: FrameReader::new() }
    }

    /// The underlying socket's fd, for the event loop's poll set.
    pub fn fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    fn send(&self, req: &Request) -> FrontendResult<()> {
        write_frame(&mut &self.stream, req)?;
        Ok(())
    }

    /// Read one response that carries no file descriptor.
    fn recv(&mut self) -> FrontendResult<Response> {
        loop {
            if let Some(resp) = self.reader.read_frame(&mut &self.stream)? {
                return Ok(resp);
            }
        }
    }

    /// Non-blocking poll for a server-pushed frame (`notification`,
    /// `pane_notification`, `tab_notification`) that can arrive on this
    /// connection without a matching request, e.g. when the event loop's
    /// poll set reports the daemon fd readable outside of an RPC call.
    /// Toggles the socket to non-blocking only for the duration of this
    /// call, so every other RPC method here keeps its blocking semantics.
    pub fn try_recv_push(&mut self) -> FrontendResult<Option<Response>> {
        self.stream.set_nonblocking(true).map_err(FrontendError::Io)?;
        let result = self.reader.read_frame(&mut &self.stream);
        let _ = self.stream.set_nonblocking(false);
        Ok(result?)
    }

    /// Read one response documented to carry a file descriptor.
    fn recv_with_fd(&self) -> FrontendResult<(Response, OwnedFd)> {
        Ok(recv_frame_with_fd(&self.stream)?)
    }

    /// Register this frontend under `session_id`/`session_name`.
    pub fn register(&mut self, session_id: HexId, session_name: &str) -> FrontendResult<()> {
        self.send(&Request::Register {
            session_id,
            session_name: session_name.to_string(),
            keepalive: true,
        })?;
        match self.recv()? {
            Response::Registered => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Create a new pane, receiving its daemon uuid and master fd.
    pub fn create_pane(
        &self,
        shell: Option<&str>,
        cwd: Option<&str>,
        sticky_pwd: Option<&str>,
        sticky_key: Option<&str>,
    ) -> FrontendResult<(HexId, OwnedFd)> {
        self.send(&Request::CreatePane {
            shell: shell.map(String::from),
            cwd: cwd.map(String::from),
            sticky_pwd: sticky_pwd.map(String::from),
            sticky_key: sticky_key.map(String::from),
        })?;
        let (resp, fd) = self.recv_with_fd()?;
        match resp {
            Response::PaneCreated { uuid } => Ok((uuid, fd)),
            Response::Error { message } => Err(FrontendError::UnexpectedResponse(message)),
            other => Err(unexpected(other)),
        }
    }

    /// Look up a sticky pane by working directory and trigger key.
    pub fn find_sticky(&self, pwd: &str, key: &str) -> FrontendResult<Option<(HexId, OwnedFd)>> {
        self.send(&Request::FindSticky { pwd: pwd.to_string(), key: key.to_string() })?;
        // `pane_found` is the only reply to this request that carries a fd;
        // `pane_not_found` doesn't, so `recv_frame_with_fd`'s "no SCM_RIGHTS
        // in this recvmsg" case is exactly the not-found outcome here.
        match self.recv_with_fd() {
            Ok((Response::PaneFound { uuid }, fd)) => Ok(Some((uuid, fd))),
            Ok((other, _)) => Err(unexpected(other)),
            Err(FrontendError::Protocol(hexa_protocol::ProtocolError::NoFdReceived)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Re-adopt a batch of previously-owned panes. The daemon replies with a
    /// `Reconnected` listing summary followed by one fd-bearing
    /// `PaneFound` frame per successfully reconnected pane, in order.
    pub fn reconnect(&mut self, pane_uuids: Vec<HexId>) -> FrontendResult<Vec<(HexId, OwnedFd)>> {
        self.send(&Request::Reconnect { pane_uuids })?;
        let reconnected = match self.recv()? {
            Response::Reconnected { uuids } => uuids,
            other => return Err(unexpected(other)),
        };
        let mut panes = Vec::with_capacity(reconnected.len());
        for expected_uuid in reconnected {
            let (resp, fd) = self.recv_with_fd()?;
            match resp {
                Response::PaneFound { uuid } => panes.push((uuid, fd)),
                other => return Err(unexpected(other)),
            }
            debug_assert_eq!(panes.last().unwrap().0, expected_uuid);
        }
        Ok(panes)
    }

    /// Suspend a pane, making it adoptable by any client.
    pub fn orphan_pane(&mut self, uuid: HexId) -> FrontendResult<()> {
        self.send(&Request::OrphanPane { uuid })?;
        match self.recv()? {
            Response::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Adopt an orphaned pane, receiving its master fd.
    pub fn adopt_pane(&self, uuid: HexId) -> FrontendResult<OwnedFd> {
        self.send(&Request::AdoptPane { uuid })?;
        let (resp, fd) = self.recv_with_fd()?;
        match resp {
            Response::PaneFound { uuid: got } if got == uuid => Ok(fd),
            other => Err(unexpected(other)),
        }
    }

    /// Close a pane's master fd on the daemon side.
    pub fn kill_pane(&mut self, uuid: HexId) -> FrontendResult<()> {
        self.send(&Request::KillPane { uuid })?;
        match self.recv()? {
            Response::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Freeze the current session as a detached snapshot.
    pub fn detach_session(&mut self, session_id: HexId, mux_state: &str) -> FrontendResult<()> {
        self.send(&Request::DetachSession { session_id, mux_state: mux_state.to_string() })?;
        match self.recv()? {
            Response::SessionDetached { .. } => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Reclaim a detached session by id prefix or name.
    pub fn reattach(&mut self, session_id: &str) -> FrontendResult<(HexId, String, Vec<HexId>)> {
        self.send(&Request::Reattach { session_id: session_id.to_string() })?;
        match self.recv()? {
            Response::SessionReattached { session_id, mux_state, pane_uuids } => {
                Ok((session_id, mux_state, pane_uuids))
            },
            other => Err(unexpected(other)),
        }
    }

    /// Sync the opaque frontend state blob the daemon stores alongside this
    /// connection (used so a later `detach_session` has something to hand
    /// back on reattach even if the frontend never calls it explicitly).
    pub fn sync_state(&mut self, mux_state: &str) -> FrontendResult<()> {
        self.send(&Request::SyncState { mux_state: mux_state.to_string() })?;
        match self.recv()? {
            Response::StateSynced => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Graceful disconnect: the frontend has already killed everything it
    /// owns, so the daemon should remove this client without orphaning.
    pub fn disconnect(&mut self) -> FrontendResult<()> {
        self.send(&Request::Disconnect)
    }
}

fn unexpected(resp: Response) -> FrontendError {
    FrontendError::UnexpectedResponse(format!("{resp:?}"))
}

/// Spawn a detached `hexa-daemon -d` using the binary found on `$PATH`
/// (falling back to the build directory of this binary, for dev runs where
/// the daemon binary sits alongside this one but isn't installed yet).
fn spawn_daemon() -> FrontendResult<()> {
    let exe = std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join("hexa-daemon")));
    let mut command = match exe {
        Some(path) if path.exists() => std::process::Command::new(path),
        _ => std::process::Command::new("hexa-daemon"),
    };
    command
        .arg("--daemon")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(FrontendError::Io)?;
    Ok(())
}
