//! Error types for the session daemon.

use std::io;

use hexa_protocol::ProtocolError;

/// Errors that can occur in the daemon.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Opening or sizing a PTY failed.
    #[error("pty error: {0}")]
    Pty(String),

    /// `fork` failed; no child was started and no pane was created.
    #[error("fork failed: {0}")]
    ForkFailed(String),

    /// A session-state invariant was violated by the requested operation.
    #[error("session error: {0}")]
    Session(String),

    /// The requested pane does not exist (or not in the expected state).
    #[error("pane not found: {0}")]
    PaneNotFound(String),

    /// The requested detached session does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The configuration file was present but malformed.
    #[error("config error: {0}")]
    Config(String),

    /// A protocol-layer error (framing, fd passing, parsing).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias for daemon-layer results.
pub type DaemonResult<T> = Result<T, DaemonError>;
