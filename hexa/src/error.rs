//! Error types for the multiplexer frontend.

use std::io;

use hexa_protocol::ProtocolError;

/// Errors that can occur in the frontend.
#[derive(Debug, thiserror::Error)]
pub enum FrontendError {
    /// A layout operation failed (e.g. closing the last pane).
    #[error("layout error: {0}")]
    Layout(String),

    /// The requested pane was not found in the current tab.
    #[error("pane not found: {0}")]
    PaneNotFound(String),

    /// Talking to the daemon failed at the protocol layer.
    #[error("daemon protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The daemon replied with an unexpected response variant.
    #[error("unexpected daemon response: {0}")]
    UnexpectedResponse(String),

    /// The daemon could not be reached and could not be spawned either.
    #[error("daemon unreachable: {0}")]
    DaemonUnreachable(String),

    /// The configuration file was present but malformed.
    #[error("config error: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias for frontend-layer results.
pub type FrontendResult<T> = Result<T, FrontendError>;
