//! PTY manager: spawns shells in fresh pseudo-terminals, sizes them, and
//! reaps their children.
//!
//! Grounded on the fork/setsid/`TIOCSCTTY`/dup2/execvp sequence used by
//! PTY-owning daemons across the ecosystem (see DESIGN.md), translated to
//! `libc` throughout rather than a higher-level PTY crate: the daemon needs
//! the raw master fd to hand off via `SCM_RIGHTS`, which a crate that owns
//! the fd's lifetime for you would fight.

use std::ffi::{CStr, CString};
use std::os::fd::RawFd;

use crate::error::{DaemonError, DaemonResult};

/// A spawned shell: the daemon's master fd plus the reaped child's pid.
#[derive(Debug)]
pub struct SpawnedPty {
    pub master_fd: RawFd,
    pub pid: libc::pid_t,
}

/// Open a fresh PTY master/slave pair via the POSIX `/dev/ptmx` +
/// `grantpt`/`unlockpt`/`ptsname_r` sequence.
fn open_pty_pair() -> DaemonResult<(RawFd, RawFd)> {
    // SAFETY: `/dev/ptmx` is a well-known POSIX device; O_NOCTTY avoids
    // accidentally acquiring it as our own controlling terminal.
    let master = unsafe { libc::open(c"/dev/ptmx".as_ptr(), libc::O_RDWR | libc::O_NOCTTY) };
    if master < 0 {
        return Err(DaemonError::Pty(std::io::Error::last_os_error().to_string()));
    }

    // SAFETY: `master` was just opened above and is a valid ptmx fd.
    unsafe {
        if libc::grantpt(master) != 0 || libc::unlockpt(master) != 0 {
            let err = DaemonError::Pty(std::io::Error::last_os_error().to_string());
            libc::close(master);
            return Err(err);
        }
    }

    let mut name_buf = [0u8; 64];
    // SAFETY: `name_buf` outlives the call and is sized well beyond any
    // real pty device path.
    let rc = unsafe {
        libc::ptsname_r(master, name_buf.as_mut_ptr() as *mut libc::c_char, name_buf.len())
    };
    if rc != 0 {
        let err = DaemonError::Pty(std::io::Error::last_os_error().to_string());
        unsafe { libc::close(master) };
        return Err(err);
    }
    // SAFETY: `ptsname_r` null-terminates on success.
    let slave_path = unsafe { CStr::from_ptr(name_buf.as_ptr() as *const libc::c_char) };

    // SAFETY: `slave_path` is the path `ptsname_r` just reported.
    let slave = unsafe { libc::open(slave_path.as_ptr(), libc::O_RDWR | libc::O_NOCTTY) };
    if slave < 0 {
        let err = DaemonError::Pty(std::io::Error::last_os_error().to_string());
        unsafe { libc::close(master) };
        return Err(err);
    }

    Ok((master, slave))
}

/// Spawn `shell` in a new PTY, optionally changing to `cwd` first.
///
/// Opens a master/slave pair; forks; in the child, starts a new session,
/// makes the slave its controlling terminal, redirects stdio to it, closes
/// both original fds, changes directory if requested, and `exec`s `shell`
/// with the inherited environment plus `TERM=xterm-256color`; in the
/// parent, closes the slave and returns the master fd and child pid.
pub fn spawn(shell: &str, cwd: Option<&str>) -> DaemonResult<SpawnedPty> {
    let (master, slave) = open_pty_pair()?;

    let c_shell = CString::new(shell).map_err(|e| DaemonError::Pty(e.to_string()))?;
    let c_cwd = cwd.map(CString::new).transpose().map_err(|e| DaemonError::Pty(e.to_string()))?;

    // SAFETY: between `fork` and `execvp`, the child only calls
    // async-signal-safe functions (setsid, ioctl, dup2, close, chdir,
    // setenv, execvp) as POSIX requires.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        let err = DaemonError::ForkFailed(std::io::Error::last_os_error().to_string());
        unsafe {
            libc::close(master);
            libc::close(slave);
        }
        return Err(err);
    }

    if pid == 0 {
        // Child.
        unsafe {
            libc::close(master);
            libc::setsid();
            libc::ioctl(slave, libc::TIOCSCTTY as _, 0);
            libc::dup2(slave, 0);
            libc::dup2(slave, 1);
            libc::dup2(slave, 2);
            if slave > 2 {
                libc::close(slave);
            }

            if let Some(dir) = &c_cwd {
                libc::chdir(dir.as_ptr());
            }

            let term = CString::new("TERM=xterm-256color").unwrap();
            libc::putenv(term.into_raw());

            let args = [c_shell.as_ptr(), std::ptr::null()];
            libc::execvp(c_shell.as_ptr(), args.as_ptr());

            // Only reached if exec failed.
            libc::_exit(127);
        }
    }

    // Parent.
    // SAFETY: `slave` is no longer needed once the child has it as stdio.
    unsafe {
        libc::close(slave);
    }
    Ok(SpawnedPty { master_fd: master, pid })
}

/// Issue the terminal-window-size ioctl on `master_fd`.
pub fn set_size(master_fd: RawFd, cols: u16, rows: u16) -> DaemonResult<()> {
    let ws = libc::winsize { ws_row: rows, ws_col: cols, ws_xpixel: 0, ws_ypixel: 0 };
    // SAFETY: `master_fd` is a live PTY master and `ws` is fully initialized.
    let rc = unsafe { libc::ioctl(master_fd, libc::TIOCSWINSZ, &ws) };
    if rc != 0 {
        return Err(DaemonError::Pty(std::io::Error::last_os_error().to_string()));
    }
    Ok(())
}

/// Non-blocking reap of `pid`. Returns `Some(exit_code)` once the child has
/// been reaped, `None` if it is still running.
pub fn poll_status(pid: libc::pid_t) -> DaemonResult<Option<i32>> {
    let mut status: libc::c_int = 0;
    // SAFETY: `pid` identifies a child forked by `spawn` above; `WNOHANG`
    // makes this non-blocking.
    let rc = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
    if rc == 0 {
        return Ok(None);
    }
    if rc < 0 {
        return Err(DaemonError::Pty(std::io::Error::last_os_error().to_string()));
    }
    let code = if libc::WIFEXITED(status) {
        libc::WEXITSTATUS(status)
    } else {
        128 + libc::WTERMSIG(status)
    };
    Ok(Some(code))
}

/// Close a PTY master fd. Per the fd-exclusivity invariant, this is the
/// sole action that should ever end the child (via kernel-delivered SIGHUP).
pub fn close_master(master_fd: RawFd) {
    // SAFETY: the caller is relinquishing its last reference to this fd.
    unsafe {
        libc::close(master_fd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::os::fd::FromRawFd;

    #[test]
    fn spawn_true_and_reap_exit_code() {
        let spawned = spawn("/bin/true", None).unwrap();
        let mut status = None;
        for _ in 0..200 {
            if let Some(code) = poll_status(spawned.pid).unwrap() {
                status = Some(code);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        close_master(spawned.master_fd);
        assert_eq!(status, Some(0));
    }

    #[test]
    fn spawned_shell_produces_output() {
        let spawned = spawn("/bin/echo", None).unwrap();
        // SAFETY: we own `master_fd` exclusively until this point.
        let mut file = unsafe { std::fs::File::from_raw_fd(spawned.master_fd) };
        let mut buf = [0u8; 64];
        let mut total = Vec::new();
        for _ in 0..50 {
            match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => total.extend_from_slice(&buf[..n]),
                Err(_) => break,
            }
            if !total.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(!total.is_empty());
    }

    #[test]
    fn set_size_on_live_master_succeeds() {
        let spawned = spawn("/bin/cat", None).unwrap();
        assert!(set_size(spawned.master_fd, 100, 40).is_ok());
        close_master(spawned.master_fd);
        // Draining the exit status isn't required for the test's assertion,
        // but avoids leaving a zombie in the surrounding test process.
        for _ in 0..50 {
            if poll_status(spawned.pid).unwrap().is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
    }
}
