//! The `hexa` binary: the multiplexer frontend. Loads config, puts the
//! controlling terminal into raw mode, bootstraps a session against the
//! daemon, and runs the event loop until the user detaches or quits.
//!
//! Grounded on `other_examples/542a7790_yusukeshib-box__src-mux.rs.rs`'s
//! `RawModeGuard`/`get_term_size`/tty-fallback shape, adapted from its
//! `anyhow`-based error handling to this crate's own `FrontendError`, and on
//! `hexa_daemon`'s `main()` for the env_logger/eprintln exit-code convention.

mod cellbuffer;
mod command;
mod config;
mod error;
mod eventloop;
mod input;
mod ipc_client;
mod layout;
mod notify;
mod overlay;
mod pane;
mod rect;
mod renderer;
mod session;
mod split;
mod statusbar;
mod tab;
mod vt;

use std::io::Write;
use std::os::fd::{AsRawFd, IntoRawFd};

use hexa_protocol::control_socket_path;

use crate::config::MuxConfig;
use crate::error::{FrontendError, FrontendResult};
use crate::eventloop::EventLoop;
use crate::ipc_client::IpcClient;
use crate::session::Session;

const ALT_SCREEN_ENTER: &[u8] = b"\x1b[?1049h";
const ALT_SCREEN_LEAVE: &[u8] = b"\x1b[?1049l";
const MOUSE_REPORTING_ENABLE: &[u8] = b"\x1b[?1000h\x1b[?1006h";
const MOUSE_REPORTING_DISABLE: &[u8] = b"\x1b[?1006l\x1b[?1000l";

fn main() {
    env_logger::init();

    let config = match MuxConfig::load(&MuxConfig::default_path()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("hexa: {e}");
            std::process::exit(1);
        },
    };

    if let Err(e) = run(config) {
        eprintln!("hexa: {e}");
        std::process::exit(1);
    }
}

fn run(config: MuxConfig) -> FrontendResult<()> {
    // Try /dev/tty first; if there is no controlling terminal (CI, a pipe),
    // there is nothing for a multiplexer frontend to attach to.
    let mut tty = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/tty")
        .map_err(FrontendError::Io)?;
    let tty_fd = tty.as_raw_fd();

    let (cols, rows) = get_term_size(tty_fd)?;
    if cols == 0 || rows == 0 {
        return Err(FrontendError::Layout("terminal reported zero size".into()));
    }

    let _raw_mode = RawModeGuard::activate(&mut tty)?;
    tty.write_all(MOUSE_REPORTING_ENABLE).map_err(FrontendError::Io)?;
    tty.flush().map_err(FrontendError::Io)?;

    let result = bootstrap_and_run(config, cols, rows);

    let _ = tty.write_all(MOUSE_REPORTING_DISABLE);
    let _ = tty.flush();
    // `_raw_mode`'s Drop restores cooked mode and leaves the alt screen.

    result
}

fn bootstrap_and_run(config: MuxConfig, cols: u16, rows: u16) -> FrontendResult<()> {
    let mut client = IpcClient::connect_or_spawn(&control_socket_path())?;

    let mut session = Session::new("main");
    client.register(session.session_id, &session.name)?;

    let (uuid, fd) = client.create_pane(None, None, None, None)?;
    let pane = crate::pane::Pane::new_daemon(
        session.allocate_pane_id(),
        uuid,
        fd.into_raw_fd(),
        0,
        cols,
        rows,
    );
    session.install_pane(pane);

    let mut event_loop = EventLoop::new(session, config, client, cols, rows);
    event_loop.run()
}

/// Query the current terminal size via `TIOCGWINSZ` on `fd`.
fn get_term_size(fd: i32) -> FrontendResult<(u16, u16)> {
    let mut size: libc::winsize = unsafe { std::mem::zeroed() };
    // SAFETY: `size` is zero-initialized and correctly sized for the ioctl.
    let rc = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut size) };
    if rc != 0 {
        return Err(FrontendError::Io(std::io::Error::last_os_error()));
    }
    Ok((size.ws_col, size.ws_row))
}

/// Puts the controlling terminal into raw mode and enters the alternate
/// screen on construction; restores both on drop.
struct RawModeGuard {
    tty_fd: i32,
    orig_termios: libc::termios,
}

impl RawModeGuard {
    fn activate(tty: &mut std::fs::File) -> FrontendResult<Self> {
        let tty_fd = tty.as_raw_fd();
        let mut orig_termios: libc::termios = unsafe { std::mem::zeroed() };
        // SAFETY: `orig_termios` is zero-initialized and `tty_fd` is a live,
        // just-opened tty fd.
        if unsafe { libc::tcgetattr(tty_fd, &mut orig_termios) } != 0 {
            return Err(FrontendError::Io(std::io::Error::last_os_error()));
        }

        let mut raw = orig_termios;
        // SAFETY: `raw` is a valid termios struct.
        unsafe { libc::cfmakeraw(&mut raw) };
        // SAFETY: `tty_fd` is the same fd `tcgetattr` just succeeded on.
        if unsafe { libc::tcsetattr(tty_fd, libc::TCSANOW, &raw) } != 0 {
            return Err(FrontendError::Io(std::io::Error::last_os_error()));
        }

        tty.write_all(ALT_SCREEN_ENTER).map_err(FrontendError::Io)?;
        tty.write_all(b"\x1b[?25l").map_err(FrontendError::Io)?;
        tty.flush().map_err(FrontendError::Io)?;

        Ok(Self { tty_fd, orig_termios })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Ok(mut tty) = std::fs::OpenOptions::new().read(true).write(true).open("/dev/tty") {
            let _ = tty.write_all(b"\x1b[?25h");
            let _ = tty.write_all(ALT_SCREEN_LEAVE);
            let _ = tty.write_all(b"\x1b[0m");
            let _ = tty.flush();
        }
        // SAFETY: `self.tty_fd` is the fd `activate` captured attributes
        // from and has not been closed since.
        unsafe {
            libc::tcsetattr(self.tty_fd, libc::TCSANOW, &self.orig_termios);
        }
    }
}
