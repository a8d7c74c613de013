//! Wire protocol shared between the hexa session daemon and its frontends.
//!
//! Covers request/response framing (newline-terminated JSON, see
//! [`framing`]), the documented message set (see [`message`]), fd passing
//! over the control socket (see [`fdpass`]), and the identifiers
//! (see [`ids`]) that appear throughout both.

pub mod error;
pub mod fdpass;
pub mod framing;
pub mod ids;
pub mod message;

pub use error::{ProtocolError, ProtocolResult};
pub use ids::HexId;
pub use message::{
    ClientSummary, DaemonStatus, PaneInfo, PromptAnswer, Request, Response, SessionSummary,
};

/// Default socket directory name under `$XDG_RUNTIME_DIR` (or the `/tmp`
/// fallback), and the control socket's file name within it.
pub const SOCKET_DIR_NAME: &str = "hexa";
pub const CONTROL_SOCKET_NAME: &str = "ses.sock";

/// Resolve the directory that holds the control socket and any per-frontend
/// auxiliary sockets: `$XDG_RUNTIME_DIR/hexa`, falling back to `/tmp/hexa`
/// when `XDG_RUNTIME_DIR` is unset.
pub fn socket_dir() -> std::path::PathBuf {
    let base = std::env::var_os("XDG_RUNTIME_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from("/tmp"));
    base.join(SOCKET_DIR_NAME)
}

/// Full path to the daemon's control socket.
pub fn control_socket_path() -> std::path::PathBuf {
    socket_dir().join(CONTROL_SOCKET_NAME)
}

/// Path to a per-frontend auxiliary socket, named after its session id.
pub fn aux_socket_path(session_id: &HexId) -> std::path::PathBuf {
    socket_dir().join(format!("mux-{}.sock", session_id.as_hex32()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_dir_falls_back_to_tmp() {
        // SAFETY: tests run single-threaded (--test-threads=1) for env var
        // mutation; no other thread reads XDG_RUNTIME_DIR concurrently.
        unsafe {
            std::env::remove_var("XDG_RUNTIME_DIR");
        }
        assert_eq!(socket_dir(), std::path::PathBuf::from("/tmp/hexa"));
    }

    #[test]
    fn control_socket_path_is_under_socket_dir() {
        let path = control_socket_path();
        assert_eq!(path.file_name().unwrap(), "ses.sock");
        assert_eq!(path.parent().unwrap(), socket_dir());
    }

    #[test]
    fn aux_socket_path_embeds_session_id() {
        let id = HexId::new();
        let path = aux_socket_path(&id);
        assert!(path.to_string_lossy().contains(&id.as_hex32()));
    }
}
