//! The `hexa-daemon` binary: parses the CLI surface, loads config, and runs
//! (or daemonizes) the session server.
//!
//! Grounded on `alacritty_multiplexer::cli`/`server`'s entry-point shape and
//! on the `--daemon` double-fork idiom used by PTY-owning background
//! services across the pack (see DESIGN.md); `env_logger` install and
//! `RUST_LOG` gating match the teacher's own `main()` convention.

mod cli;
mod config;
mod error;
mod pty;
mod server;
mod session;

use std::ffi::CString;
use std::path::Path;

use clap::Parser;
use hexa_protocol::{Request, control_socket_path, socket_dir};

use crate::cli::Cli;
use crate::config::HexaConfig;
use crate::error::DaemonResult;
use crate::server::{Server, quick_request};

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Some(message) = &cli.notify {
        if let Err(e) = notify(message) {
            eprintln!("hexa-daemon: notify failed: {e}");
            std::process::exit(1);
        }
        return;
    }

    if cli.list {
        if let Err(e) = list_status() {
            eprintln!("hexa-daemon: list failed: {e}");
            std::process::exit(1);
        }
        return;
    }

    let config_path = cli.config.clone().unwrap_or_else(HexaConfig::default_path);
    let config = match HexaConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("hexa-daemon: {e}");
            std::process::exit(1);
        },
    };

    if cli.daemon {
        daemonize();
    }

    if let Err(e) = run(config) {
        log::error!("fatal: {e}");
        std::process::exit(1);
    }
}

fn run(config: HexaConfig) -> DaemonResult<()> {
    let socket_path = config.socket_dir.clone().map(|d| d.join("ses.sock")).unwrap_or_else(control_socket_path);
    std::fs::create_dir_all(socket_path.parent().unwrap_or(Path::new("/tmp")))?;

    log::info!("binding control socket at {}", socket_path.display());
    let mut server = Server::bind(&socket_path, config)?;
    server.run()
}

fn list_status() -> DaemonResult<()> {
    let socket_path = control_socket_path();
    let response = quick_request(&socket_path, &Request::Status { full: true })?;
    println!("{response:#?}");
    Ok(())
}

fn notify(message: &str) -> DaemonResult<()> {
    let socket_path = control_socket_path();
    let response = quick_request(&socket_path, &Request::BroadcastNotify { message: message.into() })?;
    log::debug!("broadcast notify replied {response:?}");
    Ok(())
}

/// Double-fork daemonize: detach from the controlling terminal, start a new
/// session, chdir to `/`, and redirect stdio to `/dev/null`.
fn daemonize() {
    // SAFETY: the two forks and the session/stdio setup that follow use only
    // async-signal-safe calls, matching the sequence `pty::spawn` already
    // uses for its own fork/exec child.
    unsafe {
        match libc::fork() {
            n if n < 0 => {
                eprintln!("hexa-daemon: first fork failed");
                std::process::exit(1);
            },
            0 => {},
            _ => std::process::exit(0),
        }

        libc::setsid();

        match libc::fork() {
            n if n < 0 => {
                eprintln!("hexa-daemon: second fork failed");
                std::process::exit(1);
            },
            0 => {},
            _ => std::process::exit(0),
        }

        let root = CString::new("/").unwrap();
        libc::chdir(root.as_ptr());

        let devnull = CString::new("/dev/null").unwrap();
        let null_fd = libc::open(devnull.as_ptr(), libc::O_RDWR);
        if null_fd >= 0 {
            libc::dup2(null_fd, 0);
            libc::dup2(null_fd, 1);
            libc::dup2(null_fd, 2);
            if null_fd > 2 {
                libc::close(null_fd);
            }
        }
    }

    // Ensure the runtime socket directory exists before the parent exits,
    // since the caller has no further opportunity to report a failure here.
    let _ = std::fs::create_dir_all(socket_dir());
}
